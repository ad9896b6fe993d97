//! Runtime configuration, loaded from a JSON file.
//!
//! Everything except the server coordinates has a sensible default, so a
//! minimal config is just `{"plex": {"base_url": "...", "token": "..."}}`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::matcher::MatchConfig;

#[derive(Debug, Deserialize)]
pub struct PlexConfig {
    /// e.g. "http://192.168.1.10:32400"
    pub base_url: String,
    pub token: String,
    /// Request timeout in seconds for each API call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Directory scanned for `*.csv` job files.
    pub directory: String,
    pub title_column: String,
    pub artist_column: String,
    pub album_column: Option<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            title_column: "title".to_string(),
            artist_column: "artist".to_string(),
            album_column: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub plex: PlexConfig,
    #[serde(default)]
    pub csv: CsvConfig,
    /// Worker threads for playlist jobs. 0 means one per CPU core.
    #[serde(default)]
    pub concurrency: usize,
    #[serde(default)]
    pub matching: MatchConfig,
    /// How long an ambiguous-match prompt waits before declining.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_confirm_timeout_secs() -> u64 {
    120
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}
