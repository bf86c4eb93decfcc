// Public modules
pub mod archive;
pub mod cancel;
pub mod catalog;
pub mod cli;
pub mod compose;
pub mod config;
pub mod crypto;
pub mod deps;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod install;
pub mod mapping;
pub mod matcher;
pub mod models;
pub mod scaffold;
pub mod toggles;

// Re-export commonly used types
pub use error::{Result, WineportError};
pub use models::{AssetRecord, InstalledRuntime, ReleaseRecord, RuntimeIdentity};
