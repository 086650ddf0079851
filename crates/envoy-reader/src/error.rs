//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use envoy_config::ConfigError;
use envoy_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const PARSE: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the gateway: {message}")]
    #[diagnostic(
        code(envoy::connection_failed),
        help(
            "Check that the gateway is powered and reachable on the local network.\n\
             Override the address with --address, or run: envoy-reader info -v"
        )
    )]
    ConnectionFailed { message: String },

    #[error("Enlighten is temporarily unavailable: {message}")]
    #[diagnostic(
        code(envoy::enlighten_unavailable),
        help("The token service could not be reached. Try again in a few minutes.")
    )]
    EnlightenUnavailable { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(envoy::auth_failed),
        help(
            "Verify your Enlighten email and password.\n\
             Run: envoy-reader config set-password\n\
             Legacy firmware checks local_username and local_password instead."
        )
    )]
    AuthFailed { message: String },

    #[error("The gateway rejected the access token")]
    #[diagnostic(
        code(envoy::token_rejected),
        help(
            "A configured static token cannot be refreshed; mint a new one,\n\
             or configure Enlighten credentials (use_enlighten = true)."
        )
    )]
    TokenRejected,

    #[error("No credentials configured for gateway '{gateway}'")]
    #[diagnostic(
        code(envoy::no_credentials),
        help(
            "Firmware 7 and later needs a token. Set username and use_enlighten in the\n\
             gateway profile and store a password with: envoy-reader config set-password\n\
             Or set ENVOY_USERNAME and ENVOY_PASSWORD."
        )
    )]
    NoCredentials { gateway: String },

    // ── Gateway data ─────────────────────────────────────────────────

    #[error("The gateway refused the request (HTTP {status}): {message}")]
    #[diagnostic(
        code(envoy::gateway_rejected),
        help(
            "The firmware or model override may not match this gateway.\n\
             Remove `firmware` and `model` from the profile to rediscover them."
        )
    )]
    GatewayRejected { status: u16, message: String },

    #[error("Unexpected response from gateway: {message}")]
    #[diagnostic(
        code(envoy::parse),
        help("Run with -vv to log the response body.")
    )]
    Parse { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(envoy::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Gateway profile '{name}' not found in configuration")]
    #[diagnostic(
        code(envoy::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(envoy::no_config),
        help(
            "Pass --address, or add a [gateways.<name>] section to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(envoy::config))]
    Config(ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    #[diagnostic(code(envoy::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::EnlightenUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::TokenRejected | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::Parse { .. } => exit_code::PARSE,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Configuration { message } => CliError::Validation {
                field: "gateway".into(),
                reason: message,
            },
            CoreError::AuthRejected { message } => CliError::AuthFailed { message },
            CoreError::AuthTransient { message } => CliError::EnlightenUnavailable { message },
            CoreError::TokenExpired | CoreError::NotAuthenticated => CliError::TokenRejected,
            CoreError::Network { message } => CliError::ConnectionFailed { message },
            CoreError::GatewayRejected { status, message } => {
                CliError::GatewayRejected { status, message }
            }
            CoreError::Parse { message, body: _ } => CliError::Parse { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { gateway } => CliError::NoCredentials { gateway },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownGateway { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoGateway => CliError::NoConfig {
                path: envoy_config::config_path().display().to_string(),
            },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_class() {
        let auth: CliError = CoreError::AuthRejected {
            message: "bad password".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let net: CliError = CoreError::Network {
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(net.exit_code(), exit_code::CONNECTION);

        let transient: CliError = CoreError::AuthTransient {
            message: "503".into(),
        }
        .into();
        assert_eq!(transient.exit_code(), exit_code::CONNECTION);

        let expired: CliError = CoreError::TokenExpired.into();
        assert_eq!(expired.exit_code(), exit_code::AUTH);

        let refused: CliError = CoreError::GatewayRejected {
            status: 400,
            message: "bad request".into(),
        }
        .into();
        assert_eq!(refused.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn missing_password_is_auth_error() {
        let err: CliError = ConfigError::NoCredentials {
            gateway: "home".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
