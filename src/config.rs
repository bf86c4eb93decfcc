use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::matcher::MatchCriteria;

/// Where a runtime flavor is published and how its asset is recognized
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Repository in "owner/repo" format
    pub repo: String,
    /// Architecture token the asset name must contain
    pub arch: String,
    /// Variant token the asset name must contain, if any
    pub variant: Option<String>,
    /// Required file name suffix
    pub suffix: String,
    /// Variant label of the installed runtime identity
    pub label: String,
}

impl SourceConfig {
    pub fn criteria(&self) -> MatchCriteria {
        MatchCriteria {
            arch: self.arch.clone(),
            variant: self.variant.clone(),
            suffix: self.suffix.clone(),
        }
    }

    /// Ad-hoc source for a repository not named in the config
    fn for_repo(repo: &str) -> Self {
        let label: String = repo
            .rsplit('/')
            .next()
            .unwrap_or(repo)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '+') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        SourceConfig {
            repo: repo.to_string(),
            arch: "amd64".to_string(),
            variant: None,
            suffix: ".tar.xz".to_string(),
            label,
        }
    }
}

/// Timeout and bounded retry policy for every network call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// wineport configuration, read from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per installed runtime
    pub install_root: PathBuf,
    /// Base URL of the GitHub-compatible release API
    pub api_base: String,
    /// Releases requested per catalog page
    pub page_size: usize,
    pub timeout_secs: u64,
    /// Attempts per network call before giving up
    pub retries: u32,
    pub backoff_ms: u64,
    /// Runtime executable, relative to an installed runtime root
    pub runtime_executable: PathBuf,
    /// Invocation prefix used when no installed runtime is selected
    pub system_runner: Vec<String>,
    pub winetricks: String,
    pub input_mapper: String,
    /// Named runtime sources; merged over the built-in ones
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let install_root = dirs::data_dir()
            .map(|d| d.join("wineport").join("runtimes"))
            .unwrap_or_else(|| PathBuf::from(".wineport").join("runtimes"));

        Self {
            install_root,
            api_base: "https://api.github.com".to_string(),
            page_size: 30,
            timeout_secs: 30,
            retries: 3,
            backoff_ms: 500,
            runtime_executable: PathBuf::from("bin").join("wine"),
            system_runner: vec!["wine".to_string()],
            winetricks: "winetricks".to_string(),
            input_mapper: "gptokeyb".to_string(),
            sources: builtin_sources(),
        }
    }
}

fn builtin_sources() -> BTreeMap<String, SourceConfig> {
    let kron4ek = |variant: Option<&str>, label: &str| SourceConfig {
        repo: "Kron4ek/Wine-Builds".to_string(),
        arch: "amd64".to_string(),
        variant: variant.map(str::to_string),
        // "-amd64-wow64.tar.xz" builds share every other token
        suffix: "-amd64.tar.xz".to_string(),
        label: label.to_string(),
    };

    BTreeMap::from([
        ("vanilla".to_string(), kron4ek(None, "vanilla")),
        ("staging".to_string(), kron4ek(Some("staging"), "staging")),
        ("tkg".to_string(), kron4ek(Some("staging-tkg"), "tkg")),
    ])
}

impl Config {
    /// Load the config from `path`, or from the default location if it exists.
    ///
    /// An explicitly given path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        for (name, source) in builtin_sources() {
            config.sources.entry(name).or_insert(source);
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries.max(1),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    /// Resolve a source by config name, or treat "owner/repo" as an ad-hoc source
    pub fn resolve_source(&self, name: &str) -> Result<SourceConfig> {
        if let Some(source) = self.sources.get(name) {
            return Ok(source.clone());
        }
        if name.contains('/') {
            return Ok(SourceConfig::for_repo(name));
        }
        let known: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        Err(anyhow::anyhow!(
            "Unknown source '{name}' (known: {})",
            known.join(", ")
        ))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wineport").join("config.toml"))
}
