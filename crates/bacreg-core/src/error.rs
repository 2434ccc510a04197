// ── Core error types ──
//
// User-facing errors from bacreg-core. Consumers never see HTTP statuses or
// JSON-RPC envelopes directly; the `From<bacreg_api::Error>` impl translates
// wire failures into domain variants.

use thiserror::Error;

use crate::codec::CsvError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to platform at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// The session token was rejected. Forwarded to the authorization observer.
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    #[error("Platform request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Remote call errors ───────────────────────────────────────────
    #[error("Remote call failed (code {code}): {message}")]
    Remote { code: i64, message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("No device is being configured")]
    NoActiveDevice,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("{message}")]
    CsvInvalid { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

impl From<CsvError> for CoreError {
    fn from(err: CsvError) -> Self {
        Self::CsvInvalid {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bacreg_api::Error> for CoreError {
    fn from(err: bacreg_api::Error) -> Self {
        match err {
            bacreg_api::Error::Unauthorized { message } => CoreError::Unauthorized { message },
            bacreg_api::Error::Rpc { code, message } => CoreError::Remote { code, message },
            bacreg_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Remote {
                        code: e.status().map_or(-1, |s| i64::from(s.as_u16())),
                        message: e.to_string(),
                    }
                }
            }
            bacreg_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            bacreg_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            bacreg_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            bacreg_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Discovery stream connection failed: {reason}"),
            },
            bacreg_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_through() {
        let err: CoreError = bacreg_api::Error::Unauthorized {
            message: "Invalid authentication token".into(),
        }
        .into();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn rpc_code_preserved() {
        let err: CoreError = bacreg_api::Error::Rpc {
            code: -32602,
            message: "Missing config_name".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Remote { code: -32602, .. }));
    }
}
