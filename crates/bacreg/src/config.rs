//! CLI configuration -- thin wrapper around `bacreg_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--platform, --token, etc.).

use std::time::Duration;

use secrecy::SecretString;

use bacreg_config::PlatformAuth;
use bacreg_core::{PlatformConfig, PlatformConnection, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use bacreg_config::{Config, Profile, config_path, load_config_or_default, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Translate config + global flags into a `PlatformConfig`.
///
/// Flags take priority over the profile. Without a profile, `--platform`,
/// `--platform-uuid` and `--token` must all be given.
pub fn resolve_platform(global: &GlobalOpts) -> Result<(PlatformConfig, PlatformAuth), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let Some(profile) = cfg.profiles.get(&profile_name) else {
        return flags_only(global, &cfg, &profile_name);
    };

    let mut profile = profile.clone();
    if let Some(ref platform) = global.platform {
        profile.platform.clone_from(platform);
    }
    if let Some(ref uuid) = global.platform_uuid {
        profile.platform_uuid.clone_from(uuid);
    }
    if let Some(ref token) = global.token {
        profile.token = Some(token.clone());
        profile.token_env = None;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let (config, auth) =
        bacreg_config::profile_to_platform_config(&profile, &profile_name, &cfg.defaults)?;
    Ok((config, auth))
}

fn flags_only(
    global: &GlobalOpts,
    cfg: &Config,
    profile_name: &str,
) -> Result<(PlatformConfig, PlatformAuth), CliError> {
    let (Some(url_str), Some(uuid)) = (global.platform.as_deref(), global.platform_uuid.as_deref())
    else {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    };

    let url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "platform".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;

    let Some(ref token) = global.token else {
        return Err(CliError::NoCredentials {
            profile: profile_name.into(),
        });
    };
    let token = SecretString::from(token.clone());

    let mut config = PlatformConfig::new(url, token.clone(), uuid);
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    config.scan_timeout = Duration::from_millis(cfg.defaults.scan_timeout_ms);
    config.key_props.clone_from(&cfg.defaults.key_props);

    Ok((config, PlatformAuth::Token(token)))
}

/// Resolve config and open a connection, logging in first when the profile
/// only has a username and password.
pub async fn connect(global: &GlobalOpts) -> Result<(PlatformConnection, PlatformConfig), CliError> {
    let (mut config, auth) = resolve_platform(global)?;

    if let PlatformAuth::Login { username, password } = auth {
        tracing::debug!(%username, "exchanging credentials for a session token");
        config.token = PlatformConnection::login(&config, &username, &password).await?;
    }

    let connection = PlatformConnection::new(&config)?;
    Ok((connection, config))
}

/// Scan length from the config defaults.
pub fn default_scan_length() -> u32 {
    load_config_or_default().defaults.scan_length
}
