use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy shared by the catalog client, installer and composer.
///
/// Catalog and install errors are terminal for one item only; validation and
/// compose errors abort the whole operation.
#[derive(Debug, Error)]
pub enum WineportError {
    // ── Catalog ─────────────────────────────────────────
    #[error("Release catalog unavailable for {repo}: {reason}")]
    CatalogUnavailable { repo: String, reason: String },

    // ── Install ─────────────────────────────────────────
    #[error("Download failed for {asset}: {reason}")]
    DownloadFailed { asset: String, reason: String },

    #[error("Extraction failed for {asset}: {reason}")]
    ExtractionFailed { asset: String, reason: String },

    #[error("Cannot normalize layout of {asset}: {reason}")]
    NormalizationAmbiguous { asset: String, reason: String },

    #[error("Runtime {0} is not installed")]
    NotInstalled(String),

    // ── Toggles / compose ───────────────────────────────
    #[error("Invalid value for toggle '{toggle}': {reason}")]
    Validation { toggle: String, reason: String },

    #[error("Runner {runner} unavailable: {path:?} is missing or not executable")]
    RunnerUnavailable { runner: String, path: PathBuf },

    #[error("Environment variable {0} would be set twice")]
    DuplicateVariable(String),

    // ── Collaborators ───────────────────────────────────
    #[error("Required executable '{0}' not found in PATH")]
    MissingDependency(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WineportError>;

impl WineportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WineportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn validation(toggle: &str, reason: impl Into<String>) -> Self {
        WineportError::Validation {
            toggle: toggle.to_string(),
            reason: reason.into(),
        }
    }
}
