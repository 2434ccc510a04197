// ── Runtime connection configuration ──
//
// These types describe *how* to reach a platform. They carry the session
// token and connection tuning but never touch disk; the CLI/TUI build a
// `PlatformConfig` and hand it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::discovery::DEFAULT_SCAN_TIMEOUT;
use crate::registry::default_key_props;

/// Proxy agent that runs scans unless a profile names another.
pub const DEFAULT_PROXY_IDENTITY: &str = "platform.bacnet_proxy";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one platform.
///
/// Built by CLI/TUI, passed to `PlatformConnection` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform URL (e.g., `https://vc.example.com:8443`).
    pub url: Url,
    pub token: SecretString,
    pub platform_uuid: String,
    pub proxy_identity: String,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How long a scan may run before it is canceled.
    pub scan_timeout: Duration,
    /// Columns shown for newly discovered devices.
    pub key_props: Vec<String>,
}

impl PlatformConfig {
    pub fn new(url: Url, token: SecretString, platform_uuid: impl Into<String>) -> Self {
        Self {
            url,
            token,
            platform_uuid: platform_uuid.into(),
            proxy_identity: DEFAULT_PROXY_IDENTITY.to_owned(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            key_props: default_key_props(),
        }
    }
}
