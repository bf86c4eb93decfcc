use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, WineportError};
use crate::install::executable::is_executable;
use crate::models::InstalledRuntime;
use crate::toggles::{RunnerSelection, ToggleSet};

/// Fixed environment of the tuning profile, in emission order
const TUNING_BLOCK: [(&str, &str); 5] = [
    ("STAGING_SHARED_MEMORY", "1"),
    ("STAGING_WRITECOPY", "1"),
    ("WINE_LARGE_ADDRESS_AWARE", "1"),
    ("__GL_SHADER_DISK_CACHE", "1"),
    ("mesa_glthread", "true"),
];

/// Sits next to the runtime executable in every Wine build
const WINESERVER: &str = "wineserver";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Ordered environment with unique names.
///
/// A second write of the same name is an error, never an overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvBlock {
    vars: Vec<EnvVar>,
}

impl EnvBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if self.get(name).is_some() {
            return Err(WineportError::DuplicateVariable(name.to_string()));
        }
        self.vars.push(EnvVar {
            name: name.to_string(),
            value: value.into(),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.vars.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// A helper process run before the title
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuxCommand {
    pub argv: Vec<String>,
    /// Keep running alongside the title instead of completing first
    pub background: bool,
}

/// Everything a launcher needs to start one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchDescriptor {
    pub target: PathBuf,
    pub env: EnvBlock,
    pub runner: Vec<String>,
    pub pre_launch: Vec<AuxCommand>,
    pub working_dir: PathBuf,
}

/// What is being launched and where its per-title state lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    pub prefix: PathBuf,
    /// Controller mapping for the input mapper, if any
    pub controls: Option<PathBuf>,
}

/// Turns a [`ToggleSet`] and an optional installed runtime into a
/// [`LaunchDescriptor`]
#[derive(Debug, Clone)]
pub struct Composer {
    pub runtime_executable: PathBuf,
    pub system_runner: Vec<String>,
    pub winetricks: String,
    pub input_mapper: String,
}

impl Composer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            runtime_executable: config.runtime_executable.clone(),
            system_runner: config.system_runner.clone(),
            winetricks: config.winetricks.clone(),
            input_mapper: config.input_mapper.clone(),
        }
    }

    /// Compose the launch descriptor.
    ///
    /// `runtime` must be the installed runtime named by the runner toggle,
    /// if it names one. The same inputs always give the same descriptor.
    pub fn compose(
        &self,
        runtime: Option<&InstalledRuntime>,
        toggles: &ToggleSet,
        target: &LaunchTarget,
    ) -> Result<LaunchDescriptor> {
        let runtime_executable = self.check_runner(runtime, &toggles.runner)?;
        let runner = match &runtime_executable {
            Some(executable) => vec![path_string(executable)],
            None => self.system_runner.clone(),
        };

        let mut env = EnvBlock::new();
        env.push("WINEPREFIX", path_string(&target.prefix))?;
        env.push("WINEDEBUG", "-all")?;
        // winetricks and other helpers pick the runtime up from these
        if let Some(executable) = &runtime_executable {
            env.push("WINE", path_string(executable))?;
            env.push(
                "WINESERVER",
                path_string(&executable.with_file_name(WINESERVER)),
            )?;
        }

        if let Some(overrides) = toggles.graphics.dll_overrides() {
            env.push("WINEDLLOVERRIDES", overrides)?;
            if toggles.hud {
                env.push("DXVK_HUD", "fps")?;
            }
            if toggles.async_compile {
                env.push("DXVK_ASYNC", "1")?;
            }
        }

        env.push("WINEESYNC", flag(toggles.esync))?;
        env.push("WINEFSYNC", flag(toggles.fsync))?;

        let mut pre_launch = Vec::new();
        if let Some(latency) = toggles.audio.pulse_latency_ms() {
            env.push("PULSE_LATENCY_MSEC", latency.to_string())?;
            pre_launch.push(AuxCommand {
                argv: vec![
                    self.winetricks.clone(),
                    "-q".to_string(),
                    "sound=pulse".to_string(),
                ],
                background: false,
            });
        }

        if toggles.tuning {
            for (name, value) in TUNING_BLOCK {
                env.push(name, value)?;
            }
        }

        if let Some(controls) = &target.controls {
            pre_launch.push(AuxCommand {
                argv: vec![
                    self.input_mapper.clone(),
                    "-c".to_string(),
                    path_string(controls),
                ],
                background: true,
            });
        }

        debug!(
            "Composed {} variables, {} pre-launch commands for {}",
            env.len(),
            pre_launch.len(),
            target.executable.display()
        );

        Ok(LaunchDescriptor {
            target: target.executable.clone(),
            env,
            runner,
            pre_launch,
            working_dir: target.working_dir.clone(),
        })
    }

    /// Executable of the installed runtime `selection` names, `None` for the
    /// system runner. Fails with `RunnerUnavailable` if it cannot be run.
    pub fn check_runner(
        &self,
        runtime: Option<&InstalledRuntime>,
        selection: &RunnerSelection,
    ) -> Result<Option<PathBuf>> {
        let identity = match selection {
            RunnerSelection::Default => return Ok(None),
            RunnerSelection::Installed(identity) => identity,
        };

        let Some(runtime) = runtime.filter(|r| &r.identity == identity) else {
            return Err(WineportError::RunnerUnavailable {
                runner: identity.to_string(),
                path: PathBuf::from(identity.dir_name()).join(&self.runtime_executable),
            });
        };

        let executable = runtime.executable(&self.runtime_executable);
        if !is_executable(&executable).unwrap_or(false) {
            return Err(WineportError::RunnerUnavailable {
                runner: identity.to_string(),
                path: executable,
            });
        }

        Ok(Some(executable))
    }
}

fn flag(on: bool) -> &'static str {
    if on { "1" } else { "0" }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
