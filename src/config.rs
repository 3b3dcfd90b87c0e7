//! Application configuration.
//!
//! Configuration is assembled once at startup, in this order:
//! 1. Built-in defaults
//! 2. A TOML file at `$MAILBRIDGE_CONFIG`, or
//!    `~/.config/mailbridge/config.toml` (Linux/macOS),
//!    `%APPDATA%\mailbridge\config.toml` (Windows)
//! 3. Environment variables (`EMAIL_CLIENT_TYPE`, `IMAP_SERVER`, …)
//!
//! The resulting [`Config`] is never mutated afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MailError;

/// Which kind of store answers the read-side operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendKind {
    /// Local mbox archives inside a Thunderbird profile.
    Thunderbird,
    /// A remote IMAP server.
    Imap,
    /// Anything else; the original name is kept for error messages.
    Unsupported(String),
}

impl BackendKind {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Thunderbird => "thunderbird",
            Self::Imap => "imap",
            Self::Unsupported(name) => name,
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Thunderbird
    }
}

impl FromStr for BackendKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "thunderbird" | "mbox" => Self::Thunderbird,
            "imap" => Self::Imap,
            _ => Self::Unsupported(s.trim().to_string()),
        })
    }
}

impl From<String> for BackendKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend selector.
    pub backend: BackendKind,
    /// Local archive settings.
    pub archive: ArchiveConfig,
    /// Remote store (IMAP) endpoint.
    #[serde(deserialize_with = "imap_table")]
    pub imap: ServerConfig,
    /// Relay (SMTP) endpoint.
    #[serde(deserialize_with = "smtp_table")]
    pub smtp: ServerConfig,
    /// Account used for both IMAP login and SMTP submission.
    pub account: AccountConfig,
    /// Logging and cache locations.
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Explicit Thunderbird profile directory. `~` is expanded.
    pub profile: Option<PathBuf>,
}

/// A host/port pair. In the config file either key may be omitted; a
/// missing port falls back to the protocol's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize)]
struct ServerTable {
    #[serde(default)]
    host: String,
    port: Option<u16>,
}

impl ServerTable {
    fn with_default_port(self, port: u16) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port.unwrap_or(port),
        }
    }
}

fn imap_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ServerConfig, D::Error> {
    Ok(ServerTable::deserialize(deserializer)?.with_default_port(DEFAULT_IMAP_PORT))
}

fn smtp_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ServerConfig, D::Error> {
    Ok(ServerTable::deserialize(deserializer)?.with_default_port(DEFAULT_SMTP_PORT))
}

/// Account credentials. The password is never serialized and never
/// shown by `Debug`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub address: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("address", &self.address)
            .field("password_set", &!self.password.is_empty())
            .finish()
    }
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

/// Implicit-TLS IMAP.
pub const DEFAULT_IMAP_PORT: u16 = 993;
/// SMTP submission with STARTTLS.
pub const DEFAULT_SMTP_PORT: u16 = 587;

fn default_imap() -> ServerConfig {
    ServerConfig {
        host: String::new(),
        port: DEFAULT_IMAP_PORT,
    }
}

fn default_smtp() -> ServerConfig {
    ServerConfig {
        host: String::new(),
        port: DEFAULT_SMTP_PORT,
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            archive: ArchiveConfig::default(),
            imap: default_imap(),
            smtp: default_smtp(),
            account: AccountConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay environment variables, looked up through `lookup`.
    ///
    /// Empty values count as set (an empty `IMAP_SERVER` clears a host
    /// coming from the config file). Unparseable ports are ignored.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(kind) = lookup("EMAIL_CLIENT_TYPE") {
            self.backend = BackendKind::from(kind);
        }
        if let Some(profile) = lookup("THUNDERBIRD_PROFILE") {
            self.archive.profile = if profile.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(profile))
            };
        }
        if let Some(host) = lookup("IMAP_SERVER") {
            self.imap.host = host;
        }
        if let Some(port) = lookup("IMAP_PORT") {
            apply_port(&mut self.imap, "IMAP_PORT", &port);
        }
        if let Some(host) = lookup("SMTP_SERVER") {
            self.smtp.host = host;
        }
        if let Some(port) = lookup("SMTP_PORT") {
            apply_port(&mut self.smtp, "SMTP_PORT", &port);
        }
        if let Some(address) = lookup("EMAIL_ADDRESS") {
            self.account.address = address;
        }
        if let Some(password) = lookup("EMAIL_PASSWORD") {
            self.account.password = password;
        }
        self
    }

    /// Configured profile override with a leading `~` expanded.
    pub fn profile_path(&self) -> Option<PathBuf> {
        self.archive.profile.as_deref().map(expand_tilde)
    }
}

fn apply_port(server: &mut ServerConfig, var: &str, value: &str) {
    match value.trim().parse::<u16>() {
        Ok(port) => server.port = port,
        Err(e) => tracing::warn!(
            variable = var,
            value = value,
            error = %e,
            "Ignoring invalid port"
        ),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Parse the config file from the standard location. `Ok(None)` when no
/// file exists.
///
/// Environment overrides are applied separately with
/// [`Config::apply_env`], after logging is set up from the file's
/// `[general]` section, so warnings from the overlay are not lost.
pub fn load_config_file() -> Result<Option<Config>, MailError> {
    let Some(path) = config_file_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| MailError::io(&path, e))?;
    parse_config(&contents)
        .map(Some)
        .map_err(|e| MailError::Configuration(format!("{}: {e}", path.display())))
}

/// Parse TOML config text.
pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILBRIDGE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailbridge").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailbridge")
}
