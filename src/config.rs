use std::{fs, path::Path, path::PathBuf};

use log::{info, warn};
use serde::Deserialize;

use crate::error::Result;

/// User-tunable settings read from `config.toml` in the platform config directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Program name or full path of the yt-dlp executable
    pub ytdlp_path: String,
    /// Directory holding ffmpeg; `None` means look next to the executable, then let yt-dlp search
    pub ffmpeg_dir: Option<PathBuf>,
    pub retries: u32,
    pub socket_timeout_secs: u64,
    pub geo_bypass: bool,
    pub verbose: bool,
    /// Pre-filled destination folder
    pub default_download_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_dir: None,
            retries: 10,
            socket_timeout_secs: 20,
            geo_bypass: true,
            verbose: false,
            default_download_dir: dirs::download_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }
}

impl Settings {
    /// Loads settings from the default location, falling back to defaults on any problem.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Reads `path` if it exists. An empty or missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings = toml::from_str::<Settings>(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}

/// `<config dir>/YouDownload/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("YouDownload").join("config.toml"))
}
