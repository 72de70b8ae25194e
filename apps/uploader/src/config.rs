//! Uploader configuration.
//!
//! TOML at `$XDG_CONFIG_HOME/chunkferry/uploader.toml` (`%APPDATA%` on
//! Windows). A missing file is created with defaults on first run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chunkferry_protocol::StorageType;
use chunkferry_queue::QueueConfig;
use chunkferry_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_HASH_WINDOW};
use chunkferry_transport::TransportConfig;
use chunkferry_upload::UploadConfig;
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = "chunkferry";
const CONFIG_FILE: &str = "uploader.toml";
const CONFIG_FILE_TEMP: &str = "uploader.toml~";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Sent verbatim as `Authorization`; empty sends nothing.
    #[serde(default)]
    pub password: String,

    #[serde(default = "default_storage_type")]
    pub storage_type: StorageType,

    /// Part size in bytes for new upload sessions.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Read window in bytes while fingerprinting.
    #[serde(default = "default_hash_window")]
    pub hash_window: usize,

    /// Parts in flight at once, across all files of one invocation.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries per part after a network failure.
    #[serde(default = "default_retry")]
    pub retry: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_storage_type() -> StorageType {
    StorageType::Local
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_hash_window() -> usize {
    DEFAULT_HASH_WINDOW
}

fn default_concurrency() -> usize {
    5
}

fn default_retry() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            password: String::new(),
            storage_type: default_storage_type(),
            chunk_size: default_chunk_size(),
            hash_window: default_hash_window(),
            concurrency: default_concurrency(),
            retry: default_retry(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads the config from the platform location, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_file_path()?;
        if !path.exists() {
            let config = Config::default();
            if let Err(e) = config.save_to(&path) {
                tracing::warn!(path = %path.display(), error = %e, "could not write default config");
            } else {
                tracing::info!(path = %path.display(), "wrote default config");
            }
            return Ok(config);
        }
        Self::load_from(&path)
    }

    /// Loads from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Writes through a temp file and renames it into place.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let dir = path.parent().context("config path has no parent directory")?;
        std::fs::create_dir_all(dir).context("creating config dir")?;

        let content = toml::to_string_pretty(self).context("serializing config")?;
        let temp_path = dir.join(CONFIG_FILE_TEMP);
        std::fs::write(&temp_path, content).context("writing temp config")?;
        set_permissions_0600(&temp_path);
        std::fs::rename(&temp_path, path).context("replacing config")?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.server_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportConfig::default()
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            concurrency: self.concurrency,
            retry_limit: self.retry,
            ..QueueConfig::default()
        }
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            chunk_size: self.chunk_size,
            hash_window: self.hash_window,
            ..UploadConfig::default()
        }
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

pub fn config_file_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(dir) = std::env::var("XDG_CONFIG_HOME")
            && !dir.is_empty()
        {
            return Ok(PathBuf::from(dir));
        }
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config"))
    }
}
