// Enlighten token service
//
// Two-step flow for firmware >= 7:
// 1. POST the account credentials (form-encoded) to the Enlighten login
//    endpoint to open a session.
// 2. POST `{session_id, serial_num, username}` to Entrez; the response
//    body is the raw JWT for that gateway.
//
// The vendor service is slow and often saturated, so every failure is
// classified as either a rejection (terminal) or unavailability (retry).

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{Error, preview};
use crate::transport::TransportConfig;

/// Production Enlighten login endpoint.
pub const ENLIGHTEN_LOGIN_URL: &str = "https://enlighten.enphaseenergy.com/login/login.json";

/// Production Entrez token endpoint.
pub const ENTREZ_TOKEN_URL: &str = "https://entrez.enphaseenergy.com/tokens";

/// Where to reach the token service. Overridable for testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnlightenEndpoints {
    pub login_url: Url,
    pub token_url: Url,
}

impl EnlightenEndpoints {
    /// The vendor's production endpoints.
    pub fn production() -> Result<Self, Error> {
        Ok(Self {
            login_url: Url::parse(ENLIGHTEN_LOGIN_URL)?,
            token_url: Url::parse(ENTREZ_TOKEN_URL)?,
        })
    }

    /// Point both endpoints at a single base URL (`{base}/login/login.json`,
    /// `{base}/tokens`).
    pub fn with_base(base: &Url) -> Result<Self, Error> {
        Ok(Self {
            login_url: base.join("/login/login.json")?,
            token_url: base.join("/tokens")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    is_consumer: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

/// An open Enlighten session.
#[derive(Debug, Clone)]
pub struct EnlightenSession {
    pub session_id: SecretString,
    /// `true` for homeowner accounts, `false` for installers.
    pub is_consumer: Option<bool>,
}

/// HTTP client for the Enlighten/Entrez token service.
pub struct EnlightenClient {
    http: reqwest::Client,
    endpoints: EnlightenEndpoints,
}

impl EnlightenClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(endpoints: EnlightenEndpoints, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            endpoints,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoints: EnlightenEndpoints) -> Self {
        Self { http, endpoints }
    }

    /// The configured endpoints.
    pub fn endpoints(&self) -> &EnlightenEndpoints {
        &self.endpoints
    }

    /// Open an Enlighten session with account credentials.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<EnlightenSession, Error> {
        let url = self.endpoints.login_url.clone();
        debug!("logging in to Enlighten at {}", url);

        let form = [
            ("user[email]", username),
            ("user[password]", password.expose_secret()),
        ];
        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(Error::from_transport)?;
        let body = Self::read_body(resp).await?;

        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::deserialization(e, &body))?;

        match login.session_id {
            Some(session_id) if !session_id.is_empty() => {
                debug!(is_consumer = ?login.is_consumer, "Enlighten login successful");
                Ok(EnlightenSession {
                    session_id: SecretString::from(session_id),
                    is_consumer: login.is_consumer,
                })
            }
            _ => Err(Error::Authentication {
                message: login
                    .message
                    .unwrap_or_else(|| "Enlighten login returned no session".into()),
            }),
        }
    }

    /// Exchange an open session for a gateway token.
    pub async fn fetch_token(
        &self,
        session: &EnlightenSession,
        serial_number: &str,
        username: &str,
    ) -> Result<SecretString, Error> {
        let url = self.endpoints.token_url.clone();
        debug!(serial_number, "requesting gateway token at {}", url);

        let body = json!({
            "session_id": session.session_id.expose_secret(),
            "serial_num": serial_number,
            "username": username,
        });
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::from_transport)?;
        let token = Self::read_body(resp).await?;
        let token = token.trim();

        if token.is_empty() {
            return Err(Error::EnlightenUnavailable {
                status: StatusCode::OK.as_u16(),
                message: "token service returned an empty body".into(),
            });
        }

        debug!(len = token.len(), "received gateway token");
        Ok(SecretString::from(token.to_owned()))
    }

    /// Full flow: login, then fetch a token for `serial_number`.
    pub async fn mint_token(
        &self,
        username: &str,
        password: &SecretString,
        serial_number: &str,
    ) -> Result<SecretString, Error> {
        let session = self.login(username, password).await?;
        self.fetch_token(&session, serial_number, username).await
    }

    /// Read the body of a token-service response, classifying failures.
    async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = format!("HTTP {status}: {}", preview(&body));
        Err(
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Error::EnlightenUnavailable {
                    status: status.as_u16(),
                    message,
                }
            } else {
                Error::Authentication { message }
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn production_endpoints() {
        let endpoints = EnlightenEndpoints::production().unwrap();
        assert_eq!(endpoints.login_url.host_str(), Some("enlighten.enphaseenergy.com"));
        assert_eq!(endpoints.login_url.path(), "/login/login.json");
        assert_eq!(endpoints.token_url.host_str(), Some("entrez.enphaseenergy.com"));
        assert_eq!(endpoints.token_url.path(), "/tokens");
    }

    #[test]
    fn base_override_keeps_paths() {
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        let endpoints = EnlightenEndpoints::with_base(&base).unwrap();
        assert_eq!(endpoints.login_url.as_str(), "http://127.0.0.1:8080/login/login.json");
        assert_eq!(endpoints.token_url.as_str(), "http://127.0.0.1:8080/tokens");
    }
}
