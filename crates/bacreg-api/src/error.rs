use thiserror::Error;

/// Top-level error type for the `bacreg-api` crate.
///
/// Covers every failure mode of the remote-call endpoint and the
/// discovery streams. `bacreg-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authorization ───────────────────────────────────────────────
    /// The session token was rejected, or login failed.
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    // ── Remote call ─────────────────────────────────────────────────
    /// Structured `{code, message}` error from the JSON-RPC endpoint.
    #[error("Remote call failed (code {code}): {message}")]
    Rpc { code: i64, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// Discovery stream connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// JSON-RPC error code the platform uses for a rejected token.
pub const UNAUTHORIZED_CODE: i64 = 401;

impl Error {
    /// Returns `true` if a fresh token might resolve this error.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Build the error for a `{code, message}` body, routing the
    /// unauthorized code to [`Error::Unauthorized`].
    pub fn from_rpc(code: i64, message: String) -> Self {
        if code == UNAUTHORIZED_CODE {
            Self::Unauthorized { message }
        } else {
            Self::Rpc { code, message }
        }
    }
}
