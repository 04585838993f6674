//! Configuration: defaults, then `bidboard.toml` if present, then
//! `BIDBOARD_*` environment overrides.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "bidboard.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub admin_password: String,
    /// Snapshot file; `None` keeps everything in process memory, so
    /// state dies with the process.
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval_secs: u64,
    pub image_fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_owned(),
            admin_password: "change-me".to_owned(),
            snapshot_path: None,
            snapshot_interval_secs: 10,
            image_fetch_timeout_secs: 5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match fs::read_to_string(CONFIG_FILE) {
            Ok(text) => toml::from_str(&text).with_context(|| format!("parsing {CONFIG_FILE}"))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err).with_context(|| format!("reading {CONFIG_FILE}")),
        };

        if let Ok(value) = env::var("BIDBOARD_LISTEN_ADDR") {
            config.listen_addr = value;
        }
        if let Ok(value) = env::var("BIDBOARD_ADMIN_PASSWORD") {
            config.admin_password = value;
        }
        if let Ok(value) = env::var("BIDBOARD_SNAPSHOT_PATH") {
            config.snapshot_path = Some(PathBuf::from(value));
        }
        if let Ok(value) = env::var("BIDBOARD_SNAPSHOT_INTERVAL_SECS") {
            config.snapshot_interval_secs =
                value.parse().context("BIDBOARD_SNAPSHOT_INTERVAL_SECS")?;
        }
        if let Ok(value) = env::var("BIDBOARD_IMAGE_TIMEOUT_SECS") {
            config.image_fetch_timeout_secs =
                value.parse().context("BIDBOARD_IMAGE_TIMEOUT_SECS")?;
        }

        Ok(config)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn image_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.image_fetch_timeout_secs)
    }
}
