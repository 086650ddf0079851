use thiserror::Error;

/// Top-level error type for the `envoy-api` crate.
///
/// Covers every failure mode across both API surfaces: the Enlighten
/// token service and the gateway's local HTTP API.
/// `envoy-core` maps these into the domain error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Enlighten or the gateway's local login rejected the credentials
    /// (wrong password, serial not linked to the account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Enlighten answered but could not serve the request right now
    /// (overloaded, maintenance, empty token body).
    #[error("Enlighten unavailable (HTTP {status}): {message}")]
    EnlightenUnavailable { status: u16, message: String },

    /// The gateway refused the bearer token (HTTP 401).
    #[error("Gateway rejected the access token -- re-authentication required")]
    Unauthorized,

    /// The token could not be decoded as a JWT.
    #[error("Invalid Enphase token: {0}")]
    InvalidToken(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Gateway ─────────────────────────────────────────────────────
    /// Non-success status from the gateway other than 401.
    #[error("Gateway error (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON/XML deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Classify a failed `send()`: timeouts get their own variant.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            }
        } else {
            Self::Transport(err)
        }
    }

    /// Returns `true` if this error indicates the token has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::EnlightenUnavailable { .. } => true,
            Self::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the gateway does not serve the requested path
    /// (or does not let this token see it).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Gateway { status, .. } => matches!(status, 403 | 404),
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Build a `Deserialization` error with a short body preview in the message.
    pub(crate) fn deserialization(err: impl std::fmt::Display, body: &str) -> Self {
        Self::Deserialization {
            message: format!("{err} (body preview: {:?})", preview(body)),
            body: body.to_owned(),
        }
    }
}

/// First 200 bytes of a body, cut on a char boundary.
pub fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
