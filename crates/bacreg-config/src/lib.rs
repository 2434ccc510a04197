//! Shared configuration for the bacreg CLI and TUI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `bacreg_core::PlatformConfig`. Both binaries
//! depend on this crate; the CLI layers its global flags on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bacreg_core::config::DEFAULT_PROXY_IDENTITY;
use bacreg_core::discovery::DEFAULT_SCAN_TIMEOUT;
use bacreg_core::registry::default_key_props;
use bacreg_core::{PlatformConfig, TlsVerification};

/// Keyring service name.
const KEYRING_SERVICE: &str = "bacreg";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "BACREG_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration shared by CLI and TUI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named platform profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Milliseconds a scan may stay silent before it is canceled.
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    /// Seconds the proxy listens for replies.
    #[serde(default = "default_scan_length")]
    pub scan_length: u32,

    /// Registry columns shown for a freshly discovered device.
    #[serde(default = "default_key_props")]
    pub key_props: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            scan_timeout_ms: default_scan_timeout_ms(),
            scan_length: default_scan_length(),
            key_props: default_key_props(),
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
    30
}
fn default_scan_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_SCAN_TIMEOUT.as_millis()).unwrap_or(10_000)
}
fn default_scan_length() -> u32 {
    5
}

/// A named platform profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Platform base URL (e.g., "https://vc.example.com:8443").
    pub platform: String,

    /// Platform instance that owns the BACnet proxy.
    pub platform_uuid: String,

    #[serde(default = "default_proxy_identity")]
    pub proxy_identity: String,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring).
    pub password: Option<String>,

    /// Session token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the session token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,

    pub timeout: Option<u64>,

    pub scan_timeout_ms: Option<u64>,
}

fn default_proxy_identity() -> String {
    DEFAULT_PROXY_IDENTITY.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$BACREG_CONFIG`, then XDG / platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "bacreg", "bacreg").map_or_else(
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
    p.push("bacreg");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, still layering `BACREG_*` env overrides.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BACREG_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// How a profile authenticates against the platform.
#[derive(Debug, Clone)]
pub enum PlatformAuth {
    /// A session token that can be used as-is.
    Token(SecretString),
    /// Credentials to exchange for a token with `get_authorization`.
    Login {
        username: String,
        password: SecretString,
    },
}

fn keyring_entry(profile_name: &str, kind: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{kind}"),
    )?)
}

/// Resolve a session token from the credential chain.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(val) = profile
        .token_env
        .as_ref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(secret) = keyring_entry(profile_name, "token").and_then(|e| Ok(e.get_password()?)) {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

/// Resolve username + password without CLI flags.
pub fn resolve_login(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("BACREG_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    if let Ok(pw) = std::env::var("BACREG_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Ok(pw) = keyring_entry(profile_name, "password").and_then(|e| Ok(e.get_password()?)) {
        return Ok((username, SecretString::from(pw)));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// A token wins; otherwise fall back to a login.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<PlatformAuth, ConfigError> {
    if let Some(token) = resolve_token(profile, profile_name) {
        return Ok(PlatformAuth::Token(token));
    }
    let (username, password) = resolve_login(profile, profile_name)?;
    Ok(PlatformAuth::Login { username, password })
}

/// Store a secret (`token` or `password`) in the system keyring.
pub fn store_secret(profile_name: &str, kind: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, kind)?.set_password(secret)?;
    Ok(())
}

// ── Translation to core ─────────────────────────────────────────────

/// Build a `PlatformConfig` from a profile, with no CLI flag overrides.
///
/// When the profile resolves to a login instead of a token, the returned
/// config carries an empty token; exchange the credentials with
/// `PlatformConnection::login` and set `token` before connecting.
pub fn profile_to_platform_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<(PlatformConfig, PlatformAuth), ConfigError> {
    let url: url::Url = profile
        .platform
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "platform".into(),
            reason: format!("invalid URL: {}", profile.platform),
        })?;

    if profile.platform_uuid.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "platform_uuid".into(),
            reason: "must not be empty".into(),
        });
    }

    let auth = resolve_auth(profile, profile_name)?;
    let token = match &auth {
        PlatformAuth::Token(token) => token.clone(),
        PlatformAuth::Login { .. } => SecretString::from(String::new()),
    };

    let tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = PlatformConfig::new(url, token, profile.platform_uuid.clone());
    config.proxy_identity.clone_from(&profile.proxy_identity);
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.scan_timeout =
        Duration::from_millis(profile.scan_timeout_ms.unwrap_or(defaults.scan_timeout_ms));
    config.key_props.clone_from(&defaults.key_props);

    Ok((config, auth))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn profile() -> Profile {
        Profile {
            platform: "https://vc.example.com:8443".into(),
            platform_uuid: "p1".into(),
            proxy_identity: default_proxy_identity(),
            token: Some("tok".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.scan_timeout_ms, 10_000);
        assert_eq!(cfg.defaults.key_props, default_key_props());
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), profile());
        cfg.default_profile = Some("lab".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (name, p) = loaded.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(p.platform_uuid, "p1");
        assert_eq!(p.proxy_identity, "platform.bacnet_proxy");
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(Some("ghost")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn token_profile_builds_platform_config() {
        let mut p = profile();
        p.insecure = Some(true);
        p.scan_timeout_ms = Some(2_500);
        let (config, auth) =
            profile_to_platform_config(&p, "bacreg-test-token", &Defaults::default()).unwrap();

        assert_eq!(config.url.as_str(), "https://vc.example.com:8443/");
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(config.scan_timeout, Duration::from_millis(2_500));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.token.expose_secret(), "tok");
        assert!(matches!(auth, PlatformAuth::Token(_)));
    }

    #[test]
    fn bad_url_is_rejected() {
        let mut p = profile();
        p.platform = "not a url".into();
        let err = profile_to_platform_config(&p, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "platform"));
    }

    #[test]
    fn empty_platform_uuid_is_rejected() {
        let mut p = profile();
        p.platform_uuid = "  ".into();
        let err = profile_to_platform_config(&p, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "platform_uuid"));
    }
}
