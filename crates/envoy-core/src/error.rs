// ── Core error types ──
//
// User-facing errors from envoy-core. Hosts never see HTTP status codes
// or JSON parse failures directly. The `From<envoy_api::Error>` impl
// translates gateway-side transport errors into domain variants;
// `CoreError::from_auth` does the same for the Enlighten login path, where
// transport trouble means "try again later" rather than "poll failed".

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Setup errors ─────────────────────────────────────────────────
    /// Missing or inconsistent configuration. Fatal; surface at setup.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // ── Authentication errors ────────────────────────────────────────
    /// Enlighten refused the credentials. Fatal.
    #[error("Authentication rejected: {message}")]
    AuthRejected { message: String },

    /// Enlighten could not be reached or is overloaded. Retry with backoff.
    #[error("Authentication temporarily unavailable: {message}")]
    AuthTransient { message: String },

    /// The gateway refused the token. Re-authenticate once and retry.
    #[error("Access token expired or rejected by the gateway")]
    TokenExpired,

    /// A fetch was attempted on a session that holds no token.
    #[error("Not authenticated -- call authenticate() first")]
    NotAuthenticated,

    // ── Poll errors ──────────────────────────────────────────────────
    /// Transport failure, timeout, or gateway 5xx.
    #[error("Cannot reach gateway: {message}")]
    Network { message: String },

    /// The gateway refused the request with a 4xx other than 401. Retrying
    /// the same request will not help.
    #[error("Gateway refused the request (HTTP {status}): {message}")]
    GatewayRejected { status: u16, message: String },

    /// The gateway answered with a body that does not decode.
    #[error("Cannot parse gateway response: {message}")]
    Parse { message: String, body: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` when the same call may succeed later without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthTransient { .. } | Self::Network { .. })
    }

    /// `true` when a fresh token should be minted before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::NotAuthenticated)
    }

    /// Translate an error from the Enlighten token flow.
    pub fn from_auth(err: envoy_api::Error) -> Self {
        match err {
            envoy_api::Error::Authentication { message } => Self::AuthRejected { message },
            envoy_api::Error::EnlightenUnavailable { message, .. } => {
                Self::AuthTransient { message }
            }
            envoy_api::Error::Transport(e) => Self::AuthTransient {
                message: e.to_string(),
            },
            envoy_api::Error::Timeout { url } => Self::AuthTransient {
                message: format!("token service timed out ({url})"),
            },
            envoy_api::Error::Deserialization { message, .. } => Self::AuthTransient {
                message: format!("unexpected token service reply: {message}"),
            },
            other => other.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<envoy_api::Error> for CoreError {
    fn from(err: envoy_api::Error) -> Self {
        match err {
            envoy_api::Error::Authentication { message } => CoreError::AuthRejected { message },
            envoy_api::Error::EnlightenUnavailable { message, .. } => {
                CoreError::AuthTransient { message }
            }
            envoy_api::Error::Unauthorized => CoreError::TokenExpired,
            envoy_api::Error::InvalidToken(msg) => CoreError::Configuration {
                message: format!("Invalid access token: {msg}"),
            },
            envoy_api::Error::Transport(e) => CoreError::Network {
                message: e.to_string(),
            },
            envoy_api::Error::InvalidUrl(e) => CoreError::Configuration {
                message: format!("Invalid gateway address: {e}"),
            },
            envoy_api::Error::Timeout { url } => CoreError::Network {
                message: format!("request to {url} timed out"),
            },
            envoy_api::Error::Tls(msg) => CoreError::Network {
                message: format!("TLS error: {msg}"),
            },
            envoy_api::Error::Gateway { status, message } if status >= 500 => {
                CoreError::Network {
                    message: format!("HTTP {status}: {message}"),
                }
            }
            envoy_api::Error::Gateway { status, message } => {
                CoreError::GatewayRejected { status, message }
            }
            envoy_api::Error::Deserialization { message, body } => {
                CoreError::Parse { message, body }
            }
        }
    }
}

/// Treat a 403/404 from the gateway as "not there" rather than a failure.
pub(crate) fn absent_if_not_found<T>(
    result: Result<T, envoy_api::Error>,
) -> Result<Option<T>, CoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_unauthorized_requires_reauth() {
        let err = CoreError::from(envoy_api::Error::Unauthorized);
        assert!(matches!(err, CoreError::TokenExpired));
        assert!(err.requires_reauth());
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_network_failures() {
        let err = CoreError::from(envoy_api::Error::Gateway {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(matches!(err, CoreError::Network { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retried() {
        let err = CoreError::from(envoy_api::Error::Gateway {
            status: 400,
            message: "bad request".into(),
        });
        assert!(matches!(err, CoreError::GatewayRejected { status: 400, .. }));
        assert!(!err.is_retryable());
        assert!(!err.requires_reauth());
    }

    #[test]
    fn timeouts_are_network_failures() {
        let err = CoreError::from(envoy_api::Error::Timeout {
            url: "http://192.168.1.50/production".into(),
        });
        assert!(matches!(err, CoreError::Network { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_path_classification() {
        let rejected = CoreError::from_auth(envoy_api::Error::Authentication {
            message: "bad password".into(),
        });
        assert!(matches!(rejected, CoreError::AuthRejected { .. }));
        assert!(!rejected.is_retryable());

        let transient = CoreError::from_auth(envoy_api::Error::Timeout {
            url: "https://entrez.enphaseenergy.com/tokens".into(),
        });
        assert!(matches!(transient, CoreError::AuthTransient { .. }));
        assert!(transient.is_retryable());
    }

    #[test]
    fn parse_errors_keep_the_body() {
        let err = CoreError::from(envoy_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        });
        match err {
            CoreError::Parse { body, .. } => assert_eq!(body, "<html>"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}
