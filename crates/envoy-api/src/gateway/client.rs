// Gateway local API HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction, bearer token
// and Digest handling, and status classification. The client is bound to one host and
// scheme; callers that follow address changes build a fresh client per
// request from a shared `reqwest::Client`, which is cheap.

use std::net::Ipv6Addr;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, preview};
use crate::gateway::digest::{DigestCredential, is_digest_challenge};
use crate::gateway::endpoint::{Endpoint, Scheme};
use crate::gateway::info::GatewayInfo;
use crate::gateway::models::{EnsembleGroup, MeterConfig, ProductionReport};
use crate::transport::TransportConfig;

/// Marker `/auth/check_jwt` prints for an accepted token.
const VALID_TOKEN_MARKER: &str = "Valid token";

/// Raw HTTP client for a gateway's local API.
///
/// Every request is a single GET. A 401 becomes [`Error::Unauthorized`],
/// unless it carries a Digest challenge and the client has a local login,
/// in which case the GET is repeated once with the answer. Any other
/// non-success status becomes [`Error::Gateway`] carrying a body preview.
pub struct GatewayClient {
    http: reqwest::Client,
    host: String,
    scheme: Scheme,
    digest: Option<DigestCredential>,
}

impl GatewayClient {
    /// Create a new gateway client from a `TransportConfig`.
    pub fn new(host: &str, scheme: Scheme, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, host, scheme))
    }

    /// Create a gateway client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, host: &str, scheme: Scheme) -> Self {
        Self {
            http,
            host: host.trim().to_owned(),
            scheme,
            digest: None,
        }
    }

    /// Answer Digest challenges with `login`.
    pub fn with_digest(mut self, login: DigestCredential) -> Self {
        self.digest = Some(login);
        self
    }

    /// The gateway address as configured.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build the full URL of an endpoint: `{scheme}://{host}/{path}`.
    pub fn url(&self, endpoint: Endpoint) -> Result<Url, Error> {
        let full = format!(
            "{}://{}/{}",
            self.scheme,
            url_host(&self.host),
            endpoint.path()
        );
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET an endpoint and return the body as text.
    pub async fn get_text(
        &self,
        endpoint: Endpoint,
        token: Option<&SecretString>,
    ) -> Result<String, Error> {
        let url = self.url(endpoint)?;
        debug!("GET {}", url);

        let mut request = self.http.get(url.clone());
        if let Some(token) = token.filter(|t| !t.expose_secret().is_empty()) {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(Error::from_transport)?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            if let (Some(login), Some(challenge)) = (&self.digest, digest_challenge(&resp)) {
                return self.get_with_digest(endpoint, &url, login, &challenge).await;
            }
        }
        Self::read_body(endpoint, resp).await
    }

    /// Repeat a GET with a Digest answer. A second 401 means the local
    /// login itself is wrong.
    async fn get_with_digest(
        &self,
        endpoint: Endpoint,
        url: &Url,
        login: &DigestCredential,
        challenge: &str,
    ) -> Result<String, Error> {
        let uri = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_owned(),
        };
        let authorization = login.answer(challenge, &uri)?;
        debug!(%endpoint, user = login.username(), "answering digest challenge");

        let resp = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(Error::from_transport)?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: format!(
                    "gateway rejected local user '{}' for {endpoint}",
                    login.username()
                ),
            });
        }
        Self::read_body(endpoint, resp).await
    }

    /// GET an endpoint and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        token: Option<&SecretString>,
    ) -> Result<T, Error> {
        let body = self.get_text(endpoint, token).await?;
        serde_json::from_str(&body).map_err(|e| Error::deserialization(e, &body))
    }

    async fn read_body(endpoint: Endpoint, resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(%endpoint, status = status.as_u16(), bytes = body.len(), "gateway response");

        if !status.is_success() {
            return Err(Error::Gateway {
                status: status.as_u16(),
                message: format!("{endpoint}: {}", preview(&body)),
            });
        }

        Ok(body)
    }

    // ── Typed endpoints ──────────────────────────────────────────────

    /// `GET /info`
    pub async fn info(&self) -> Result<GatewayInfo, Error> {
        let body = self.get_text(Endpoint::Info, None).await?;
        GatewayInfo::from_xml(&body)
    }

    /// `GET /production.json`
    pub async fn production_report(
        &self,
        token: Option<&SecretString>,
    ) -> Result<ProductionReport, Error> {
        self.get_json(Endpoint::ProductionJson, token).await
    }

    /// `GET /ivp/meters`
    pub async fn meters(&self, token: Option<&SecretString>) -> Result<Vec<MeterConfig>, Error> {
        self.get_json(Endpoint::Meters, token).await
    }

    /// `GET /ivp/ensemble/inventory`
    pub async fn ensemble_inventory(
        &self,
        token: Option<&SecretString>,
    ) -> Result<Vec<EnsembleGroup>, Error> {
        self.get_json(Endpoint::EnsembleInventory, token).await
    }

    /// Ask the gateway whether it accepts `token`.
    ///
    /// `GET /auth/check_jwt`. On success the gateway also sets a
    /// `sessionId` cookie, which lands in the client's cookie jar if it
    /// has one. A 401 is reported as `Ok(false)`.
    pub async fn check_token(&self, token: &SecretString) -> Result<bool, Error> {
        match self.get_text(Endpoint::CheckJwt, Some(token)).await {
            Ok(body) => Ok(body.contains(VALID_TOKEN_MARKER)),
            Err(Error::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Fetch `/info` from `host`, trying HTTPS first.
///
/// Firmware older than 7 has no HTTPS listener, so a connect failure or
/// timeout falls back to plain HTTP. Returns the parsed document and the
/// scheme that answered.
pub async fn discover_info(
    http: &reqwest::Client,
    host: &str,
) -> Result<(GatewayInfo, Scheme), Error> {
    let https = GatewayClient::with_client(http.clone(), host, Scheme::Https);
    match https.info().await {
        Ok(info) => Ok((info, Scheme::Https)),
        Err(e) if is_unreachable(&e) => {
            debug!(host, error = %e, "HTTPS /info unreachable, retrying over HTTP");
            let http = GatewayClient::with_client(http.clone(), host, Scheme::Http);
            let info = http.info().await?;
            Ok((info, Scheme::Http))
        }
        Err(e) => Err(e),
    }
}

fn is_unreachable(err: &Error) -> bool {
    match err {
        Error::Timeout { .. } => true,
        Error::Transport(e) => e.is_connect() || e.is_timeout(),
        _ => false,
    }
}

/// The Digest challenge of a 401, if it offers one.
fn digest_challenge(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| is_digest_challenge(value))
        .map(str::to_owned)
}

/// Host component for URL building: IPv6 literals get brackets.
fn url_host(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(host: &str, scheme: Scheme) -> GatewayClient {
        GatewayClient::with_client(reqwest::Client::new(), host, scheme)
    }

    #[test]
    fn builds_ipv4_and_hostname_urls() {
        let c = client("192.168.1.50", Scheme::Https);
        assert_eq!(
            c.url(Endpoint::MeterReadings).unwrap().as_str(),
            "https://192.168.1.50/ivp/meters/readings"
        );

        let c = client("envoy.local", Scheme::Http);
        assert_eq!(
            c.url(Endpoint::ProductionPage).unwrap().as_str(),
            "http://envoy.local/production"
        );
    }

    #[test]
    fn brackets_ipv6_literals_for_urls_only() {
        let c = client("fe80::1", Scheme::Https);
        assert_eq!(c.host(), "fe80::1");
        assert_eq!(
            c.url(Endpoint::Info).unwrap().as_str(),
            "https://[fe80::1]/info"
        );
    }

    #[test]
    fn keeps_explicit_ports() {
        let c = client("127.0.0.1:8080", Scheme::Http);
        assert_eq!(
            c.url(Endpoint::ProductionJson).unwrap().as_str(),
            "http://127.0.0.1:8080/production.json"
        );
    }
}
