use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::archive_path::DEFAULT_ARCHIVE_ROOT;
use crate::fetch::HttpOptions;
use crate::release::Release;

/// Transfer settings (optional `[http]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Upper bound on one whole transfer, in seconds.
    pub timeout_secs: u64,
    /// Verify the server's TLS certificate and host name.
    pub verify_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 600,
            verify_tls: true,
        }
    }
}

impl HttpConfig {
    /// Request options without credentials; those are added per release.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            verify_tls: self.verify_tls,
            credentials: None,
        }
    }
}

/// Global configuration loaded from `~/.config/desi-retriever/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Base URL of the archive, or an absolute directory holding a local mirror.
    pub archive_root: String,
    /// Release used when none is given on the command line.
    pub release: Release,
    /// `user:password` file; defaults to `~/.desi_http_user`.
    pub credentials_path: Option<PathBuf>,
    /// When set, remote files are kept here under their archive path.
    pub cache_dir: Option<PathBuf>,
    /// URL or directory holding the Gaia index files, instead of the
    /// release's own index location.
    pub gaia_index_root: Option<String>,
    pub http: HttpConfig,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            archive_root: DEFAULT_ARCHIVE_ROOT.to_string(),
            release: Release::default(),
            credentials_path: None,
            cache_dir: None,
            gaia_index_root: None,
            http: HttpConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("desi-retriever")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RetrieverConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RetrieverConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RetrieverConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}
