use std::path::PathBuf;
use which::which;

use crate::compose::Composer;
use crate::error::{Result, WineportError};
use crate::toggles::{RunnerSelection, ToggleSet};

/// An external program wineport hands work to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub program: String,
    pub purpose: &'static str,
}

impl Dependency {
    fn new(program: &str, purpose: &'static str) -> Self {
        Self {
            program: program.to_string(),
            purpose,
        }
    }

    /// Resolved path, if the program is on PATH (or is an existing path)
    pub fn locate(&self) -> Option<PathBuf> {
        which(&self.program).ok()
    }
}

/// Every program any launch may need
pub fn all_dependencies(composer: &Composer) -> Vec<Dependency> {
    let mut deps = Vec::new();
    if let Some(runner) = composer.system_runner.first() {
        deps.push(Dependency::new(runner, "system runner"));
    }
    deps.push(Dependency::new(&composer.winetricks, "audio setup"));
    deps.push(Dependency::new(&composer.input_mapper, "input mapper"));
    deps
}

/// Programs a launch with `toggles` needs
pub fn dependencies_for(composer: &Composer, toggles: &ToggleSet, controls: bool) -> Vec<Dependency> {
    let mut deps = Vec::new();
    // An installed runner is handed to winetricks through WINE
    if toggles.runner == RunnerSelection::Default
        && let Some(runner) = composer.system_runner.first()
    {
        deps.push(Dependency::new(runner, "system runner"));
    }
    if toggles.audio.pulse_latency_ms().is_some() {
        deps.push(Dependency::new(&composer.winetricks, "audio setup"));
    }
    if controls {
        deps.push(Dependency::new(&composer.input_mapper, "input mapper"));
    }
    deps
}

/// Fail with the first dependency that cannot be found
pub fn check_dependencies(deps: &[Dependency]) -> Result<()> {
    match deps.iter().find(|dep| dep.locate().is_none()) {
        Some(missing) => Err(WineportError::MissingDependency(missing.program.clone())),
        None => Ok(()),
    }
}
