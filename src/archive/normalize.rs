//! Top-level layout normalization of extracted runtime archives.
//!
//! Upstream archives put the runtime either at the archive root, inside one
//! redundant top directory, inside a `files` directory, or inside a `files`
//! directory under a top directory (Proton-style). Exactly one of those
//! candidates may contain the runtime executable; the installer then keeps
//! only that directory so every installed runtime shares one layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILES_DIR: &str = "files";

/// Recognized shape of an extracted archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Payload at the extraction root
    Bare,
    /// Payload inside a single top directory
    Wrapped(String),
    /// Payload inside a `files` directory
    Files,
    /// Payload inside `<top>/files`
    WrappedFiles(String),
}

impl Layout {
    /// Directory holding the payload, given the extraction root
    pub fn payload_dir(&self, root: &Path) -> PathBuf {
        match self {
            Layout::Bare => root.to_path_buf(),
            Layout::Wrapped(top) => root.join(top),
            Layout::Files => root.join(FILES_DIR),
            Layout::WrappedFiles(top) => root.join(top).join(FILES_DIR),
        }
    }
}

/// Why a tree could not be normalized
#[derive(Debug)]
pub enum LayoutError {
    /// No candidate holds the runtime executable
    Unrecognized(Vec<String>),
    /// More than one candidate holds it
    Ambiguous(Vec<PathBuf>),
    Io(io::Error),
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::Unrecognized(top) => write!(
                f,
                "unrecognized layout, runtime executable not found (top-level entries: {})",
                top.join(", ")
            ),
            LayoutError::Ambiguous(hits) => {
                let hits: Vec<String> = hits.iter().map(|p| p.display().to_string()).collect();
                write!(f, "ambiguous layout, runtime executable found in: {}", hits.join(", "))
            }
            LayoutError::Io(e) => write!(f, "failed to inspect extracted tree: {e}"),
        }
    }
}

impl From<io::Error> for LayoutError {
    fn from(e: io::Error) -> Self {
        LayoutError::Io(e)
    }
}

/// Single top-level directory of `dir`, if it holds nothing else
fn single_top_directory(dir: &Path) -> io::Result<Option<String>> {
    let entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;

    if entries.len() == 1 {
        let entry = &entries[0];
        if entry.file_type()?.is_dir()
            && let Some(name) = entry.file_name().to_str()
        {
            return Ok(Some(name.to_string()));
        }
    }

    Ok(None)
}

fn top_level_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<Result<_, _>>()?;
    names.sort();
    Ok(names)
}

/// Work out which layout `root` has, looking for `marker` (the runtime
/// executable, relative to the payload directory)
pub fn detect_layout(root: &Path, marker: &Path) -> Result<Layout, LayoutError> {
    let mut candidates = vec![Layout::Bare, Layout::Files];
    if let Some(top) = single_top_directory(root)? {
        if top != FILES_DIR {
            candidates.push(Layout::Wrapped(top.clone()));
        }
        candidates.push(Layout::WrappedFiles(top));
    }

    let mut hits: Vec<Layout> = candidates
        .into_iter()
        .filter(|layout| layout.payload_dir(root).join(marker).is_file())
        .collect();

    match hits.len() {
        0 => Err(LayoutError::Unrecognized(top_level_names(root)?)),
        1 => Ok(hits.remove(0)),
        _ => Err(LayoutError::Ambiguous(
            hits.iter()
                .map(|layout| layout.payload_dir(root).join(marker))
                .collect(),
        )),
    }
}
