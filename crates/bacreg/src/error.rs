//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use bacreg_config::ConfigError;
use bacreg_core::{CoreError, CsvError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the platform at {url}")]
    #[diagnostic(
        code(bacreg::connection_failed),
        help(
            "Check that the platform is running and reachable.\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Not authorized: {message}")]
    #[diagnostic(
        code(bacreg::unauthorized),
        help(
            "The session token was rejected or has expired.\n\
             Pass a fresh one with --token, or store credentials with: bacreg config init"
        )
    )]
    Unauthorized { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(bacreg::no_credentials),
        help(
            "Configure credentials with: bacreg config init\n\
             Or set BACREG_TOKEN, or BACREG_USERNAME and BACREG_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(bacreg::not_found), help("{hint}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("Platform error ({code}): {message}")]
    #[diagnostic(code(bacreg::remote))]
    Remote { code: i64, message: String },

    // ── Registry data ────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(bacreg::invalid_csv),
        help("Registry files need a header row and balanced quotes.")
    )]
    InvalidCsv { message: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bacreg::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(bacreg::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: bacreg config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No platform configured")]
    #[diagnostic(
        code(bacreg::no_config),
        help(
            "Create a profile with: bacreg config init\n\
             Or pass --platform, --platform-uuid and --token.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(bacreg::config))]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(bacreg::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Canceled")]
    #[diagnostic(code(bacreg::canceled))]
    Aborted,

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("{what} timed out")]
    #[diagnostic(
        code(bacreg::timeout),
        help("Increase the limit with --timeout-ms, or check that the proxy agent is running.")
    )]
    Timeout { what: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Unauthorized { .. }
            | Self::NoCredentials { .. }
            | Self::Config(ConfigError::NoCredentials { .. }) => exit_code::AUTH,
            Self::NotFound { .. }
            | Self::ProfileNotFound { .. }
            | Self::Config(ConfigError::UnknownProfile { .. }) => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url: if url.is_empty() {
                    "(unknown)".into()
                } else {
                    url
                },
                reason,
            },
            CoreError::Unauthorized { message } => CliError::Unauthorized { message },
            CoreError::Timeout { .. } => CliError::Timeout {
                what: "Platform request".into(),
            },
            CoreError::Remote { code, message } => CliError::Remote { code, message },
            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                hint: "Run: bacreg scan to see reachable devices".into(),
            },
            CoreError::NoActiveDevice => CliError::Internal("no registry is open".into()),
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "registry".into(),
                reason: message,
            },
            CoreError::CsvInvalid { message } => CliError::InvalidCsv { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<CsvError> for CliError {
    fn from(err: CsvError) -> Self {
        CliError::InvalidCsv {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_exit_with_auth_code() {
        let err: CliError = CoreError::Unauthorized {
            message: "expired".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn bad_registry_edits_are_usage_errors() {
        let err: CliError = CoreError::ValidationFailed {
            message: "Column 9 does not exist.".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
