//! Service configuration.
//!
//! Precedence: CLI flags > environment > config file > defaults. CLI flags and
//! their environment variables are merged by clap (see [`crate::cli::Cli`]);
//! this module owns the file layer and the defaults.
//!
//! The file is TOML unless its name ends in `.properties`, in which case the
//! flat `section.key = value` format is read with the same key names
//! (`server.port`, `mongodb.uri`, ...).

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::ApiError;

/// Files probed in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["eshop.toml", "config.properties"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(alias = "mongodb")]
    pub store: StoreConfig,
    pub assets: AssetsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3000, cors_origins: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Full connection string. Takes precedence over the component fields.
    pub uri: Option<String>,
    pub prefix: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub params: Option<String>,
    pub database: String,
    pub programs_collection: String,
    pub orders_collection: String,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
    /// Consecutive store failures that shut the service down. 0 never shuts down.
    pub max_consecutive_failures: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            prefix: None,
            username: None,
            password: None,
            host: None,
            params: None,
            database: "Xkool-eShop".to_string(),
            programs_collection: "Programs".to_string(),
            orders_collection: "Orders".to_string(),
            connect_attempts: 1,
            connect_backoff_ms: 1000,
            max_consecutive_failures: 1,
        }
    }
}

impl StoreConfig {
    /// The configured URI, or one assembled as `prefix + user:pass@ + host + params`.
    ///
    /// # Errors
    /// Returns `Config` when neither a URI nor a host is configured.
    pub fn connection_uri(&self) -> Result<String, ApiError> {
        if let Some(uri) = self.uri.as_deref().filter(|u| !u.is_empty()) {
            return Ok(uri.to_string());
        }
        let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) else {
            return Err(ApiError::Config(
                "no store connection configured: set store.uri or store.host".into(),
            ));
        };
        let prefix = self.prefix.as_deref().unwrap_or("mongodb://");
        let credentials = match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() => format!(
                "{}:{}@",
                utf8_percent_encode(u, NON_ALPHANUMERIC),
                utf8_percent_encode(p, NON_ALPHANUMERIC)
            ),
            (Some(u), None) if !u.is_empty() => {
                format!("{}@", utf8_percent_encode(u, NON_ALPHANUMERIC))
            }
            _ => String::new(),
        };
        let params = self.params.as_deref().unwrap_or("");
        Ok(format!("{prefix}{credentials}{host}{params}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory served as static files. No mount when unset.
    pub dir: Option<PathBuf>,
    pub prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self { dir: None, prefix: "/images".to_string() }
    }
}

impl AssetsConfig {
    /// The prefix must be an absolute path below the root, without a trailing
    /// slash or route parameters, e.g. `/images`.
    ///
    /// # Errors
    /// Returns `Config` for any other prefix.
    pub fn validate(&self) -> Result<(), ApiError> {
        let p = self.prefix.as_str();
        let mountable = p.len() > 1 && p.starts_with('/') && !p.ends_with('/');
        if !mountable || p.contains(['{', '}', '*']) {
            return Err(ApiError::Config(format!(
                "assets.prefix must look like \"/images\", got {p:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
}

impl AppConfig {
    /// Reject values the server cannot start with.
    ///
    /// # Errors
    /// Returns `Config` naming the offending key.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.assets.dir.is_some() {
            self.assets.validate()?;
        }
        Ok(())
    }

    /// Load a config file, picking the format from the extension.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read and `Config` if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let text = std::fs::read_to_string(path)?;
        let is_properties = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("properties"));
        if is_properties {
            Self::from_properties(&text)
        } else {
            toml::from_str(&text)
                .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))
        }
    }

    /// Load from an explicit path, or from the first default file present, or defaults.
    ///
    /// # Errors
    /// See [`AppConfig::from_file`]. A missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        if let Some(p) = path {
            return Self::from_file(p);
        }
        for name in DEFAULT_CONFIG_FILES {
            let p = Path::new(name);
            if p.exists() {
                log::debug!("loading config from {}", p.display());
                return Self::from_file(p);
            }
        }
        Ok(Self::default())
    }

    /// Parse Java-style properties: `key=value`, `key: value` or `key value`,
    /// `#`/`!` comments. Keys are the TOML field names under `section.`, with
    /// `mongodb.` for the store section.
    ///
    /// # Errors
    /// Returns `Config` for values that do not parse as their field type.
    pub fn from_properties(text: &str) -> Result<Self, ApiError> {
        let props = parse_properties(text);
        let mut cfg = Self::default();
        let get = |k: &str| props.get(k).map(String::as_str).filter(|v| !v.is_empty());
        let owned = |k: &str| get(k).map(str::to_string);

        if let Some(v) = get("server.host") {
            cfg.server.host = v.to_string();
        }
        if let Some(v) = get("server.port") {
            cfg.server.port = parse_field("server.port", v)?;
        }
        if let Some(v) = get("server.cors_origins") {
            cfg.server.cors_origins =
                v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        cfg.store.uri = owned("mongodb.uri");
        cfg.store.prefix = owned("mongodb.prefix");
        cfg.store.username = owned("mongodb.username");
        cfg.store.password = owned("mongodb.password");
        cfg.store.host = owned("mongodb.host");
        cfg.store.params = owned("mongodb.params");
        if let Some(v) = get("mongodb.database") {
            cfg.store.database = v.to_string();
        }
        if let Some(v) = get("mongodb.programs_collection") {
            cfg.store.programs_collection = v.to_string();
        }
        if let Some(v) = get("mongodb.orders_collection") {
            cfg.store.orders_collection = v.to_string();
        }
        if let Some(v) = get("mongodb.connect_attempts") {
            cfg.store.connect_attempts = parse_field("mongodb.connect_attempts", v)?;
        }
        if let Some(v) = get("mongodb.connect_backoff_ms") {
            cfg.store.connect_backoff_ms = parse_field("mongodb.connect_backoff_ms", v)?;
        }
        if let Some(v) = get("mongodb.max_consecutive_failures") {
            cfg.store.max_consecutive_failures =
                parse_field("mongodb.max_consecutive_failures", v)?;
        }
        cfg.assets.dir = get("assets.dir").map(PathBuf::from);
        if let Some(v) = get("assets.prefix") {
            cfg.assets.prefix = v.to_string();
        }
        cfg.log.dir = get("log.dir").map(PathBuf::from);
        cfg.log.level = owned("log.level");
        if let Some(v) = get("log.retention") {
            cfg.log.retention = Some(parse_field("log.retention", v)?);
        }
        Ok(cfg)
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, v: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    v.parse::<T>().map_err(|e| ApiError::Config(format!("{key}: {e}")))
}

fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(idx) = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) else {
            out.insert(line.to_string(), String::new());
            continue;
        };
        let (k, rest) = line.split_at(idx);
        let rest = rest.trim_start();
        let v = rest.strip_prefix(['=', ':']).unwrap_or(rest);
        out.insert(k.to_string(), v.trim().to_string());
    }
    out
}
