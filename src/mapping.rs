//! Controller mapping file for the input mapper.
//!
//! The file has one `name = "value"` line per logical button, in a fixed
//! order. An empty value leaves the button unmapped. Only the set of names is
//! validated; values are passed to the mapper as written.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Every logical button name, in file order
pub const LOGICAL_BUTTONS: [&str; 21] = [
    "back",
    "start",
    "guide",
    "a",
    "b",
    "x",
    "y",
    "l1",
    "l2",
    "l3",
    "r1",
    "r2",
    "r3",
    "up",
    "down",
    "left",
    "right",
    "left_analog_up",
    "left_analog_down",
    "left_analog_left",
    "left_analog_right",
];

/// Logical button -> key name, over [`LOGICAL_BUTTONS`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMapping {
    values: Vec<(String, String)>,
}

impl Default for ControlMapping {
    /// Every button present and unmapped
    fn default() -> Self {
        Self {
            values: LOGICAL_BUTTONS
                .iter()
                .map(|name| (name.to_string(), String::new()))
                .collect(),
        }
    }
}

impl ControlMapping {
    /// Template with the usual keyboard defaults of a desktop title
    pub fn template() -> Self {
        let mut mapping = Self::default();
        for (name, key) in [
            ("back", "esc"),
            ("start", "enter"),
            ("a", "space"),
            ("b", "esc"),
            ("x", "e"),
            ("y", "q"),
            ("l1", "tab"),
            ("r1", "shift"),
            ("up", "up"),
            ("down", "down"),
            ("left", "left"),
            ("right", "right"),
            ("left_analog_up", "w"),
            ("left_analog_down", "s"),
            ("left_analog_left", "a"),
            ("left_analog_right", "d"),
        ] {
            mapping.set(name, key);
        }
        mapping
    }

    /// Parse and validate file contents
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries: Vec<(String, String)> = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, value) = line
                .split_once('=')
                .with_context(|| format!("line {}: expected 'name = \"value\"'", index + 1))?;
            let name = name.trim();
            let value = unquote(value.trim())
                .with_context(|| format!("line {}: value of '{name}' must be quoted", index + 1))?;

            if entries.iter().any(|(n, _)| n == name) {
                anyhow::bail!("line {}: '{name}' is mapped twice", index + 1);
            }
            entries.push((name.to_string(), value.to_string()));
        }

        Self::validate(&entries)?;

        let mut mapping = Self::default();
        for (name, value) in &entries {
            mapping.set(name, value);
        }
        Ok(mapping)
    }

    /// Check that exactly the logical button names are present
    fn validate(entries: &[(String, String)]) -> Result<()> {
        let unknown: Vec<&str> = entries
            .iter()
            .map(|(n, _)| n.as_str())
            .filter(|n| !LOGICAL_BUTTONS.contains(n))
            .collect();
        if !unknown.is_empty() {
            anyhow::bail!("unknown button names: {}", unknown.join(", "));
        }

        let missing: Vec<&str> = LOGICAL_BUTTONS
            .iter()
            .copied()
            .filter(|b| !entries.iter().any(|(n, _)| n == b))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("missing button names: {}", missing.join(", "));
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Map `name`; names outside [`LOGICAL_BUTTONS`] are ignored
    pub fn set(&mut self, name: &str, key: &str) {
        if let Some(entry) = self.values.iter_mut().find(|(n, _)| n == name) {
            entry.1 = key.to_string();
        }
    }

    /// Buttons with a non-empty value
    pub fn mapped_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| !v.is_empty()).count()
    }

    pub fn to_file_string(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{name} = \"{value}\"\n"))
            .collect()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read controls file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid controls file: {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, self.to_file_string())
            .with_context(|| format!("Failed to write controls file: {}", path.display()))
    }
}

fn unquote(value: &str) -> Option<&str> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
}
