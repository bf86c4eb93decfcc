use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Command line arguments
#[derive(Parser)]
#[command(author, version = env!("WINEPORT_BUILD_VERSION"), about, long_about = None)]
pub struct Args {
    /// Config file (defaults to ~/.config/wineport/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the runtime install root
    #[arg(long, global = true)]
    pub install_root: Option<PathBuf>,
    /// Log debug output (overridden by WINEPORT_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// List releases of a runtime source and the asset each one would install
    Releases {
        /// Source name from the config (e.g. "staging") or a repository in "owner/repo" format
        source: String,
        /// Number of releases to show
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Install one or more releases of a runtime source
    Install {
        /// Source name from the config (e.g. "staging") or a repository in "owner/repo" format
        source: String,
        /// Release tags to install (can specify multiple)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Install the N most recent releases when no tag is given
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Override the architecture token used to pick the asset
        #[arg(long)]
        arch: Option<String>,
        /// Override the variant token used to pick the asset
        #[arg(long)]
        variant: Option<String>,
    },
    /// List installed runtimes, optionally filtered by a glob on "variant:version"
    List {
        pattern: Option<String>,
    },
    /// Remove installed runtimes matching a glob on "variant:version"
    Remove {
        pattern: String,
    },
    /// Compose the launch file for a title directory
    Compose {
        /// Title directory (created if missing)
        title_dir: PathBuf,
        /// Windows executable, relative to the title directory
        #[arg(short = 'e', long = "exe")]
        executable: PathBuf,
        /// Toggle selection (format: key=value), can be specified multiple times
        #[arg(long = "set", value_name = "KEY=VALUE")]
        selections: Vec<String>,
        /// Output format of the launch file
        #[arg(long, value_enum, default_value_t = OutputFormat::Sh)]
        format: OutputFormat,
        /// Controller mapping file to start the input mapper with
        #[arg(long)]
        controls: Option<PathBuf>,
    },
    /// Write a complete controller mapping template, or check an existing one
    Controls {
        file: PathBuf,
        /// Validate the file instead of writing a template
        #[arg(long)]
        check: bool,
    },
    /// Check that the external programs wineport relies on are available
    Doctor,
}

/// Serialization target of a launch descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Sh,
    Json,
}

/// GitHub release information
#[derive(Debug, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub name: Option<String>,
    pub assets: Vec<GitHubAsset>,
}

/// GitHub release asset information
#[derive(Debug, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    pub size: Option<u64>,
    /// Published as "sha256:<hex>" on newer releases
    pub digest: Option<String>,
}

/// A single downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub name: String,
    pub url: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

/// A tagged release of a runtime source, assets in catalog order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag: String,
    pub name: String,
    pub assets: Vec<AssetRecord>,
}

impl From<GitHubAsset> for AssetRecord {
    fn from(asset: GitHubAsset) -> Self {
        AssetRecord {
            name: asset.name,
            url: asset.browser_download_url,
            size: asset.size,
            digest: asset.digest,
        }
    }
}

impl From<GitHubRelease> for ReleaseRecord {
    fn from(release: GitHubRelease) -> Self {
        ReleaseRecord {
            name: release.name.unwrap_or_else(|| release.tag_name.clone()),
            tag: release.tag_name,
            assets: release.assets.into_iter().map(AssetRecord::from).collect(),
        }
    }
}

/// The (version, variant) pair naming an installed runtime.
///
/// Variants may not contain '-' or ':' so that both the "variant:version"
/// text form and the directory name stay unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuntimeIdentity {
    pub variant: String,
    pub version: String,
}

const DIR_PREFIX: &str = "wine-";

impl RuntimeIdentity {
    pub fn new(variant: &str, version: &str) -> Result<Self, String> {
        let variant_ok = !variant.is_empty()
            && variant
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+'));
        if !variant_ok {
            return Err(format!(
                "variant '{variant}' must be non-empty and use only letters, digits, '.', '_' or '+'"
            ));
        }

        let version_ok = !version.is_empty()
            && !version.starts_with('.')
            && version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'));
        if !version_ok {
            return Err(format!(
                "version '{version}' must be non-empty and use only letters, digits, '.', '_', '+' or '-'"
            ));
        }

        Ok(Self {
            variant: variant.to_string(),
            version: version.to_string(),
        })
    }

    /// Identity for a release tag of a source, unsafe tag characters become '_'
    pub fn from_release(variant: &str, tag: &str) -> Result<Self, String> {
        let mut version: String = tag
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if version.starts_with('.') {
            version.replace_range(..1, "_");
        }
        Self::new(variant, &version)
    }

    /// Directory name under the install root, e.g. "wine-staging-9.0"
    pub fn dir_name(&self) -> String {
        format!("{DIR_PREFIX}{}-{}", self.variant, self.version)
    }

    /// Inverse of [`RuntimeIdentity::dir_name`]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(DIR_PREFIX)?;
        let (variant, version) = rest.split_once('-')?;
        Self::new(variant, version).ok()
    }
}

impl fmt::Display for RuntimeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.variant, self.version)
    }
}

impl FromStr for RuntimeIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (variant, version) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'variant:version', got '{s}'"))?;
        Self::new(variant, version)
    }
}

/// A runtime materialized on disk by the installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRuntime {
    pub identity: RuntimeIdentity,
    pub root: PathBuf,
}

impl InstalledRuntime {
    /// Path of the runtime executable given its path relative to the root
    pub fn executable(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}
