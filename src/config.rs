//! Settings loaded from an optional TOML file and merged over defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::controller::ControllerOptions;

pub const DEFAULT_CONFIG_PATH: &str = "endpoint-scan.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding the persistent `<key>.json` files.
    pub data_dir: PathBuf,
    pub bind: String,
    /// Static UI served as the API fallback.
    pub ui_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub port_timeout_ms: u64,
    pub pause_poll_ms: u64,
    pub stop_settle_ms: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bind: "127.0.0.1:8080".to_string(),
            ui_dir: PathBuf::from("ui"),
            http_timeout_secs: 10,
            port_timeout_ms: 2_500,
            pause_poll_ms: 100,
            stop_settle_ms: 500,
            user_agent: format!("endpoint-scan-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms.max(1))
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            poll_interval: Duration::from_millis(self.pause_poll_ms.max(1)),
            stop_settle: Duration::from_millis(self.stop_settle_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    storage: Option<StorageSection>,
    server: Option<ServerSection>,
    scan: Option<ScanSection>,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    bind: Option<String>,
    ui_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ScanSection {
    http_timeout_secs: Option<u64>,
    port_timeout_ms: Option<u64>,
    pause_poll_ms: Option<u64>,
    stop_settle_ms: Option<u64>,
    user_agent: Option<String>,
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    let file: FileConfig = toml::from_str(content).context("invalid settings file")?;
    let mut settings = Settings::default();

    if let Some(storage) = file.storage {
        if let Some(dir) = storage.data_dir {
            settings.data_dir = dir;
        }
    }
    if let Some(server) = file.server {
        if let Some(bind) = server.bind {
            settings.bind = bind;
        }
        if let Some(dir) = server.ui_dir {
            settings.ui_dir = dir;
        }
    }
    if let Some(scan) = file.scan {
        if let Some(v) = scan.http_timeout_secs {
            settings.http_timeout_secs = v;
        }
        if let Some(v) = scan.port_timeout_ms {
            settings.port_timeout_ms = v;
        }
        if let Some(v) = scan.pause_poll_ms {
            settings.pause_poll_ms = v;
        }
        if let Some(v) = scan.stop_settle_ms {
            settings.stop_settle_ms = v;
        }
        if let Some(ua) = scan.user_agent {
            settings.user_agent = ua;
        }
    }
    Ok(settings)
}

/// Load settings from `path`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file: {}", path.display()))?;
    parse_settings(&content)
}

/// Explicit path must exist; otherwise the default path is used when present.
pub fn load_or_default(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(p) => load_settings(p),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_settings(default_path)
            } else {
                Ok(Settings::default())
            }
        }
    }
}
