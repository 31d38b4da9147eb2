use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::harmony::{DEFAULT_OCTAVE, JitterProfile};

pub const CONFIG_FILE_NAME: &str = "songsync.config.toml";
pub const CONFIG_PATH_ENV: &str = "SONGSYNC_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub harmony: HarmonyConfig,
    pub cues: CueConfig,
    pub session: SessionConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyConfig {
    pub octave: i32,
    pub jitter: JitterProfile,
    /// Fixed seed for reproducible velocities; entropy when unset.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub placeholder_track_name: String,
    pub end_marker_name: String,
    pub tolerance_beats: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub apply_tempo: bool,
    pub apply_signature: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
}

impl Default for HarmonyConfig {
    fn default() -> Self {
        Self {
            octave: DEFAULT_OCTAVE,
            jitter: JitterProfile::default(),
            seed: None,
        }
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            placeholder_track_name: "Song Structure".to_string(),
            end_marker_name: "End".to_string(),
            tolerance_beats: 1e-3,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            apply_tempo: true,
            apply_signature: true,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: "info,songsync_core=trace".to_string(),
            trace_file_prefix: "songsync".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the discovered config file; fails when none exists.
    pub fn load() -> Result<Self> {
        let config_path = discover_config_path().with_context(|| {
            format!("failed to locate {CONFIG_FILE_NAME}; looked in cwd and parent directory")
        })?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config TOML from {}", path.display()))?;

        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// An explicit path must exist; otherwise a missing file means defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match discover_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(error) => {
                debug!(%error, "no config file found; using defaults");
                Ok(Self::default())
            }
        }
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let candidates = [
        cwd.join(CONFIG_FILE_NAME),
        cwd.join("..").join(CONFIG_FILE_NAME),
    ];

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow::anyhow!("{CONFIG_FILE_NAME} not found"))
}
