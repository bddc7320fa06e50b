//! Shared configuration for portal tools.
//!
//! TOML profiles layered with environment overrides, and translation of a
//! profile into `portal_core::SessionConfig`. The CLI adds flag-aware
//! wrappers on top; the core never reads files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use portal_api::ReconnectConfig;
use portal_api::endpoint::{FALLBACK_HOST, endpoint_for_origin};
use portal_core::{SessionConfig, WorkflowTimings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PORTAL_CONFIG";

/// Prefix of environment overrides, e.g. `PORTAL_DEFAULTS__TIMEOUT=5`.
pub const ENV_PREFIX: &str = "PORTAL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{name}'")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// A config with a single `default` profile pointing at `device`.
    pub fn for_device(device: &str) -> Self {
        let mut config = Self::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                device: device.to_owned(),
                ..Profile::default()
            },
        );
        config
    }

    /// Pick the named profile, or the default one.
    ///
    /// A missing default profile resolves to the built-in profile for the
    /// soft-AP address, so a fresh install works without a config file.
    /// A missing profile that was asked for by name is an error.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let default_name = self.default_profile.as_deref().unwrap_or("default");
        let wanted = name.unwrap_or(default_name);

        if let Some(profile) = self.profiles.get(wanted) {
            return Ok((wanted.to_owned(), profile.clone()));
        }
        if wanted == default_name {
            tracing::debug!(profile = wanted, "no such profile; using built-in defaults");
            return Ok((wanted.to_owned(), Profile::default()));
        }
        Err(ConfigError::UnknownProfile {
            name: wanted.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds to wait for the device to report ready.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_device() -> String {
    FALLBACK_HOST.into()
}

/// A named device profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Address the portal page is served from (e.g. "http://192.168.4.1"
    /// or a bare host).
    #[serde(default = "default_device")]
    pub device: String,

    /// WebSocket endpoint; overrides the one derived from `device`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Override of `defaults.timeout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "ReconnectOverrides::is_empty")]
    pub reconnect: ReconnectOverrides,

    #[serde(default, skip_serializing_if = "TimingOverrides::is_empty")]
    pub timings: TimingOverrides,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            device: default_device(),
            endpoint: None,
            timeout: None,
            reconnect: ReconnectOverrides::default(),
            timings: TimingOverrides::default(),
        }
    }
}

impl Profile {
    /// How long to wait for the device to report ready.
    pub fn ready_timeout(&self, defaults: &Defaults) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(defaults.timeout))
    }
}

/// Reconnect schedule overrides, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconnectOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl ReconnectOverrides {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(&self, mut base: ReconnectConfig) -> ReconnectConfig {
        if let Some(ms) = self.interval_ms {
            base.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            base.max_delay = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_attempts {
            base.max_attempts = n;
        }
        base
    }
}

/// WiFi workflow timing overrides, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimingOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ip_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_eth_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_display_ms: Option<u64>,
}

impl TimingOverrides {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(&self, mut base: WorkflowTimings) -> WorkflowTimings {
        let slots = [
            (self.scan_timeout_ms, &mut base.scan_timeout),
            (self.connect_timeout_ms, &mut base.connect_timeout),
            (self.wait_ip_timeout_ms, &mut base.wait_ip_timeout),
            (self.check_eth_timeout_ms, &mut base.check_eth_timeout),
            (self.disconnect_timeout_ms, &mut base.disconnect_timeout),
            (self.settle_delay_ms, &mut base.settle_delay),
            (self.error_display_ms, &mut base.error_display),
        ];
        for (value, slot) in slots {
            if let Some(ms) = value {
                *slot = Duration::from_millis(ms);
            }
        }
        base
    }

    fn zero_field(&self) -> Option<&'static str> {
        [
            ("scan_timeout_ms", self.scan_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("wait_ip_timeout_ms", self.wait_ip_timeout_ms),
            ("check_eth_timeout_ms", self.check_eth_timeout_ms),
            ("disconnect_timeout_ms", self.disconnect_timeout_ms),
            ("settle_delay_ms", self.settle_delay_ms),
            ("error_display_ms", self.error_display_ms),
        ]
        .into_iter()
        .find_map(|(name, value)| (value == Some(0)).then_some(name))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `PORTAL_CONFIG` if set, otherwise the
/// platform config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "portal", "portalctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("portalctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, then apply `PORTAL_` environment overrides.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    tracing::debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Session translation ─────────────────────────────────────────────

/// Build a `SessionConfig` from a profile. No CLI flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<SessionConfig, ConfigError> {
    let endpoint = match profile.endpoint.as_deref() {
        Some(raw) => parse_endpoint(raw, profile_name)?,
        None => endpoint_for_origin(&profile.device).map_err(|e| ConfigError::Validation {
            field: format!("profiles.{profile_name}.device"),
            reason: e.to_string(),
        })?,
    };

    let reconnect = profile.reconnect.apply(ReconnectConfig::default());
    if reconnect.interval.is_zero() {
        return Err(ConfigError::Validation {
            field: format!("profiles.{profile_name}.reconnect.interval_ms"),
            reason: "must be greater than zero".into(),
        });
    }
    if reconnect.max_attempts == 0 {
        return Err(ConfigError::Validation {
            field: format!("profiles.{profile_name}.reconnect.max_attempts"),
            reason: "must be at least 1".into(),
        });
    }
    if let Some(field) = profile.timings.zero_field() {
        return Err(ConfigError::Validation {
            field: format!("profiles.{profile_name}.timings.{field}"),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(SessionConfig {
        endpoint,
        reconnect,
        timings: profile.timings.apply(WorkflowTimings::default()),
    })
}

fn parse_endpoint(raw: &str, profile_name: &str) -> Result<Url, ConfigError> {
    let field = || format!("profiles.{profile_name}.endpoint");
    let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field(),
        reason: format!("{e}: {raw}"),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: field(),
            reason: format!("expected a ws:// or wss:// URL, got scheme '{other}'"),
        }),
    }
}
