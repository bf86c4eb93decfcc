//! Validated launch options.
//!
//! Raw `key=value` selections come from the CLI (`--set`) or any other
//! front-end and are validated as a whole into a [`ToggleSet`]. Validation
//! only reads its inputs.

use std::fmt;

use crate::error::{Result, WineportError};
use crate::models::RuntimeIdentity;

pub const KEY_GRAPHICS: &str = "graphics";
pub const KEY_HUD: &str = "hud";
pub const KEY_ASYNC: &str = "async";
pub const KEY_ESYNC: &str = "esync";
pub const KEY_FSYNC: &str = "fsync";
pub const KEY_AUDIO: &str = "audio";
pub const KEY_RUNNER: &str = "runner";
pub const KEY_TUNING: &str = "tuning";

/// Every toggle name, in display order
pub const TOGGLE_KEYS: [&str; 8] = [
    KEY_GRAPHICS,
    KEY_HUD,
    KEY_ASYNC,
    KEY_ESYNC,
    KEY_FSYNC,
    KEY_AUDIO,
    KEY_RUNNER,
    KEY_TUNING,
];

/// Translation layer for Direct3D
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphicsLayer {
    #[default]
    Dxvk,
    Vkd3d,
    DxvkLegacy,
    None,
}

impl GraphicsLayer {
    pub const ALL: [GraphicsLayer; 4] = [
        GraphicsLayer::Dxvk,
        GraphicsLayer::Vkd3d,
        GraphicsLayer::DxvkLegacy,
        GraphicsLayer::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphicsLayer::Dxvk => "dxvk",
            GraphicsLayer::Vkd3d => "vkd3d",
            GraphicsLayer::DxvkLegacy => "dxvk-legacy",
            GraphicsLayer::None => "none",
        }
    }

    /// `WINEDLLOVERRIDES` value loading the layer's DLLs native-first
    pub fn dll_overrides(&self) -> Option<&'static str> {
        match self {
            GraphicsLayer::Dxvk => Some("d3d9,d3d10core,d3d11,dxgi=n,b"),
            GraphicsLayer::Vkd3d => Some("d3d12,d3d12core=n,b"),
            GraphicsLayer::DxvkLegacy => Some("d3d10,d3d10_1,d3d10core,d3d11,dxgi=n,b"),
            GraphicsLayer::None => None,
        }
    }
}

/// Audio routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioBackend {
    #[default]
    Default,
    Pulse60,
    Pulse90,
}

impl AudioBackend {
    pub const ALL: [AudioBackend; 3] = [
        AudioBackend::Default,
        AudioBackend::Pulse60,
        AudioBackend::Pulse90,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioBackend::Default => "default",
            AudioBackend::Pulse60 => "pulse-60",
            AudioBackend::Pulse90 => "pulse-90",
        }
    }

    /// PulseAudio latency in milliseconds, `None` for the default backend
    pub fn pulse_latency_ms(&self) -> Option<u32> {
        match self {
            AudioBackend::Default => None,
            AudioBackend::Pulse60 => Some(60),
            AudioBackend::Pulse90 => Some(90),
        }
    }
}

/// Which wine binary runs the title
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunnerSelection {
    /// The configured system runner
    #[default]
    Default,
    Installed(RuntimeIdentity),
}

impl fmt::Display for RunnerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerSelection::Default => f.write_str("default"),
            RunnerSelection::Installed(id) => write!(f, "{id}"),
        }
    }
}

/// `key=value` selections in the order they were given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSelections {
    entries: Vec<(String, String)>,
}

impl RawSelections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` strings, e.g. from repeated `--set` flags
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let mut raw = Self::new();
        for item in items {
            let (key, value) = parse_key_value(item.as_ref())?;
            raw.insert(&key, &value);
        }
        Ok(raw)
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a key=value string
fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s.split_once('=').ok_or_else(|| {
        WineportError::validation(s.trim(), format!("expected format 'key=value', got: {s}"))
    })?;
    Ok((key.trim().to_lowercase(), value.trim().to_string()))
}

/// A complete, validated set of launch options
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToggleSet {
    pub graphics: GraphicsLayer,
    pub hud: bool,
    pub async_compile: bool,
    pub esync: bool,
    pub fsync: bool,
    pub audio: AudioBackend,
    pub runner: RunnerSelection,
    pub tuning: bool,
}

impl ToggleSet {
    /// Validate `raw` against the toggle schema.
    ///
    /// Unset toggles keep their defaults. Unknown keys, illegal values, a
    /// toggle given twice, or a runner that is not in `known_runners` are
    /// rejected with an error naming the toggle.
    pub fn validate(raw: &RawSelections, known_runners: &[RuntimeIdentity]) -> Result<Self> {
        let mut set = ToggleSet::default();
        let mut seen: Vec<&str> = Vec::new();

        for (key, value) in raw.iter() {
            if seen.contains(&key) {
                return Err(WineportError::validation(key, "given more than once"));
            }
            seen.push(key);

            match key {
                KEY_GRAPHICS => set.graphics = parse_graphics(value)?,
                KEY_HUD => set.hud = parse_bool(key, value)?,
                KEY_ASYNC => set.async_compile = parse_bool(key, value)?,
                KEY_ESYNC => set.esync = parse_bool(key, value)?,
                KEY_FSYNC => set.fsync = parse_bool(key, value)?,
                KEY_AUDIO => set.audio = parse_audio(value)?,
                KEY_RUNNER => set.runner = parse_runner(value, known_runners)?,
                KEY_TUNING => set.tuning = parse_bool(key, value)?,
                _ => {
                    return Err(WineportError::validation(
                        key,
                        format!("unknown toggle (known: {})", TOGGLE_KEYS.join(", ")),
                    ));
                }
            }
        }

        Ok(set)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(WineportError::validation(
            key,
            format!("'{value}' is not a boolean (use on/off, true/false, yes/no or 1/0)"),
        )),
    }
}

fn parse_graphics(value: &str) -> Result<GraphicsLayer> {
    GraphicsLayer::ALL
        .into_iter()
        .find(|layer| layer.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let names: Vec<&str> = GraphicsLayer::ALL.iter().map(|l| l.as_str()).collect();
            WineportError::validation(
                KEY_GRAPHICS,
                format!("'{value}' is not one of {}", names.join(", ")),
            )
        })
}

fn parse_audio(value: &str) -> Result<AudioBackend> {
    AudioBackend::ALL
        .into_iter()
        .find(|audio| audio.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let names: Vec<&str> = AudioBackend::ALL.iter().map(|a| a.as_str()).collect();
            WineportError::validation(
                KEY_AUDIO,
                format!("'{value}' is not one of {}", names.join(", ")),
            )
        })
}

fn parse_runner(value: &str, known_runners: &[RuntimeIdentity]) -> Result<RunnerSelection> {
    // Installed identities name directories and keep their case
    if value.eq_ignore_ascii_case("default") {
        return Ok(RunnerSelection::Default);
    }

    let identity: RuntimeIdentity = value
        .parse()
        .map_err(|e: String| WineportError::validation(KEY_RUNNER, e))?;

    if !known_runners.contains(&identity) {
        let known: Vec<String> = known_runners.iter().map(|r| r.to_string()).collect();
        let known = if known.is_empty() {
            "none installed".to_string()
        } else {
            known.join(", ")
        };
        return Err(WineportError::validation(
            KEY_RUNNER,
            format!("'{value}' is not an installed runtime (installed: {known})"),
        ));
    }

    Ok(RunnerSelection::Installed(identity))
}
