//! # Duskfall Configuration Module
//!
//! Preference loading for Duskfall:
//! - YAML configuration file with embedded defaults
//! - `DUSKFALL_CONFIG` environment variable to override the config folder
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use duskconfig::get_config;
//!
//! let config = get_config();
//! let sharing = config.sharing_enabled();
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result, anyhow};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// Built-in default configuration.
const DEFAULT_CONFIG: &str = include_str!("duskfall.yaml");

const ENV_CONFIG_DIR: &str = "DUSKFALL_CONFIG";
const CONFIG_FILE: &str = "duskfall.yaml";

const DEFAULT_QUOTE_INTERVAL_SECS: u64 = 10;
const DEFAULT_SIMULATED_DISPLAYS: usize = 2;
const DEFAULT_ITEM_SECS: u64 = 15;

lazy_static! {
    static ref CONFIG: Arc<DuskConfig> = Arc::new(DuskConfig::load().unwrap_or_else(|err| {
        warn!(error = %err, "configuration unreadable, using built-in defaults");
        DuskConfig::built_in()
    }));
}

/// The global configuration.
pub fn get_config() -> Arc<DuskConfig> {
    Arc::clone(&CONFIG)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuskConfig {
    pub playback: PlaybackSettings,
    pub videos: VideoSettings,
    pub quotes: QuoteSettings,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Every display runs its own videos instead of mirroring one session.
    pub different_videos_on_each_display: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Folders scanned recursively for video files.
    pub sources: Vec<PathBuf>,
    pub extensions: Vec<String>,
    /// Explicit entries served when no folder is configured.
    pub entries: Vec<VideoEntry>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            extensions: ["mov", "mp4", "m4v", "webm", "mkv"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEntry {
    pub uri: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteSettings {
    pub interval_secs: u64,
    /// Empty means the built-in quote set.
    pub lines: Vec<String>,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_QUOTE_INTERVAL_SECS,
            lines: Vec::new(),
        }
    }
}

/// Knobs for the demo host simulation run by the `Duskfall` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub displays: usize,
    pub attach_preview: bool,
    pub item_secs: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            displays: DEFAULT_SIMULATED_DISPLAYS,
            attach_preview: true,
            item_secs: DEFAULT_ITEM_SECS,
        }
    }
}

impl DuskConfig {
    /// Load from the config file when present, the embedded defaults
    /// otherwise.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::built_in());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config = Self::from_yaml(&text)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid configuration")
    }

    pub fn built_in() -> Self {
        serde_yaml::from_str(DEFAULT_CONFIG).expect("built-in configuration must parse")
    }

    /// `$DUSKFALL_CONFIG/duskfall.yaml`, or the platform config folder.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(dir) = env::var(ENV_CONFIG_DIR) {
            return Ok(PathBuf::from(dir).join(CONFIG_FILE));
        }
        let base = dirs::config_dir().ok_or_else(|| anyhow!("no configuration directory"))?;
        Ok(base.join("duskfall").join(CONFIG_FILE))
    }

    pub fn sharing_enabled(&self) -> bool {
        !self.playback.different_videos_on_each_display
    }

    pub fn quote_interval(&self) -> Duration {
        Duration::from_secs(self.quotes.interval_secs.max(1))
    }

    pub fn item_duration(&self) -> Duration {
        Duration::from_secs(self.simulation.item_secs.max(1))
    }
}
