use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::errors::ApiError;

/// Command-line flags. Each flag also reads its `ESHOP_*` environment variable,
/// so flags beat environment and both beat the config file.
#[derive(Parser, Debug, Default)]
#[command(
    name = "eshop-api",
    version,
    about = "Holiday programs and orders HTTP API",
    long_about = None
)]
pub struct Cli {
    #[arg(long, env = "ESHOP_CONFIG", help = "Path to a config file (.toml or .properties)")]
    pub config: Option<PathBuf>,
    #[arg(long, env = "ESHOP_HOST", help = "Address to bind")]
    pub host: Option<String>,
    #[arg(long, env = "ESHOP_PORT", help = "Port to listen on (default 3000)")]
    pub port: Option<u16>,
    #[arg(
        long = "store-uri",
        env = "ESHOP_STORE_URI",
        help = "mongodb://, mongodb+srv:// or memory:// URI"
    )]
    pub store_uri: Option<String>,
    #[arg(long, env = "ESHOP_DATABASE", help = "Database name")]
    pub database: Option<String>,
    #[arg(
        long = "assets-dir",
        env = "ESHOP_ASSETS_DIR",
        help = "Directory served under the assets prefix"
    )]
    pub assets_dir: Option<PathBuf>,
    #[arg(
        long = "cors-origin",
        env = "ESHOP_CORS_ORIGINS",
        value_delimiter = ',',
        help = "Allowed CORS origin (repeatable)"
    )]
    pub cors_origins: Vec<String>,
    #[arg(long = "log-level", env = "ESHOP_LOG_LEVEL", help = "error|warn|info|debug|trace")]
    pub log_level: Option<String>,
    #[arg(long = "log-dir", env = "ESHOP_LOG_DIR", help = "Directory for rolling log files")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Overlay flags onto a loaded config.
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(h) = &self.host {
            cfg.server.host.clone_from(h);
        }
        if let Some(p) = self.port {
            cfg.server.port = p;
        }
        if !self.cors_origins.is_empty() {
            cfg.server.cors_origins.clone_from(&self.cors_origins);
        }
        if let Some(u) = &self.store_uri {
            cfg.store.uri = Some(u.clone());
        }
        if let Some(d) = &self.database {
            cfg.store.database.clone_from(d);
        }
        if let Some(d) = &self.assets_dir {
            cfg.assets.dir = Some(d.clone());
        }
        if let Some(l) = &self.log_level {
            cfg.log.level = Some(l.clone());
        }
        if let Some(d) = &self.log_dir {
            cfg.log.dir = Some(d.clone());
        }
    }

    /// Config file (explicit or default) with flags applied on top.
    ///
    /// # Errors
    /// Propagates file read and parse failures.
    pub fn load_config(&self) -> Result<AppConfig, ApiError> {
        let mut cfg = AppConfig::load(self.config.as_deref())?;
        self.apply(&mut cfg);
        Ok(cfg)
    }
}
