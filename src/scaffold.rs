use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::compose::LaunchTarget;
use crate::models::OutputFormat;

const PREFIX_DIR: &str = "prefix";
const CONTROLS_FILE: &str = "controls.gptk";

/// Per-title directory tree.
///
/// ```text
/// <title>/prefix          wine prefix
/// <title>/launch.sh       or launch.json
/// <title>/controls.gptk   controller mapping
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleLayout {
    root: PathBuf,
}

impl TitleLayout {
    /// Create the title tree under `root` (idempotent), with an absolute root
    pub fn scaffold(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(PREFIX_DIR))
            .with_context(|| format!("Failed to create title directory: {}", root.display()))?;
        let root = fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve title directory: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix_dir(&self) -> PathBuf {
        self.root.join(PREFIX_DIR)
    }

    pub fn controls_file(&self) -> PathBuf {
        self.root.join(CONTROLS_FILE)
    }

    pub fn launch_file(&self, format: OutputFormat) -> PathBuf {
        match format {
            OutputFormat::Sh => self.root.join("launch.sh"),
            OutputFormat::Json => self.root.join("launch.json"),
        }
    }

    /// Launch target for `executable`, a path relative to the title root
    pub fn target(&self, executable: &Path, controls: Option<PathBuf>) -> Result<LaunchTarget> {
        check_executable_path(executable)?;

        let executable = self.root.join(executable);
        let working_dir = executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        Ok(LaunchTarget {
            executable,
            working_dir,
            prefix: self.prefix_dir(),
            controls,
        })
    }

    /// Write the rendered launch file, marking shell scripts executable
    pub fn write_launch_file(&self, format: OutputFormat, contents: &str) -> Result<PathBuf> {
        let path = self.launch_file(format);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write launch file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if format == OutputFormat::Sh {
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                    .with_context(|| format!("Failed to set permissions: {}", path.display()))?;
            }
        }

        Ok(path)
    }
}

/// Fail unless `executable` names a file inside the title directory
pub fn check_executable_path(executable: &Path) -> Result<()> {
    let mut named = false;
    for component in executable.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => anyhow::bail!(
                "Executable must be a path inside the title directory: {}",
                executable.display()
            ),
        }
    }
    if !named {
        anyhow::bail!("Executable path is empty: {}", executable.display());
    }
    Ok(())
}
