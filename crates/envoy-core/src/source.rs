// ── Telemetry source ──
//
// `TelemetrySource` is the narrow seam hosts program against: mint a token,
// read a category. `GatewaySource` is the production implementation over
// the gateway's local HTTP API and the Enlighten token service.
//
// Every call is a single attempt built from the profile snapshot passed
// in. Nothing is cached between calls, so an address change in the
// profile takes effect on the very next request.

use std::time::Duration;

use async_trait::async_trait;
use envoy_api::gateway::digest::DEFAULT_LOCAL_USER;
use envoy_api::{
    DigestCredential, EnlightenClient, EnlightenEndpoints, GatewayClient, Scheme, TlsMode,
    TransportConfig,
};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::dialect::{Dialect, Payloads};
use crate::error::{CoreError, absent_if_not_found};
use crate::probe::{self, Discovery};
use crate::profile::{AccessToken, CapabilitySet, Credential, FirmwareClass, GatewayProfile};
use crate::reading::{MetricCategory, TelemetryReading};

/// Authenticate against and read from a gateway.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Obtain an access token for `profile`.
    ///
    /// Legacy firmware gets an empty local token without any network call.
    /// It carries the local login used for Digest-protected pages.
    async fn authenticate(
        &self,
        profile: &GatewayProfile,
        credential: &Credential,
    ) -> Result<AccessToken, CoreError>;

    /// Read one category. Categories the hardware lacks yield a `NoData`
    /// reading without touching the network.
    async fn fetch(
        &self,
        profile: &GatewayProfile,
        token: Option<&AccessToken>,
        category: MetricCategory,
    ) -> Result<TelemetryReading, CoreError>;
}

/// Tuning for `GatewaySource`.
#[derive(Debug, Clone)]
pub struct GatewaySourceConfig {
    /// Per-request timeout for the gateway's local API.
    pub gateway_timeout: Duration,
    /// Per-request timeout for Enlighten.
    pub enlighten_timeout: Duration,
    /// TLS mode for the gateway. Gateways ship self-signed certificates.
    pub gateway_tls: TlsMode,
    /// Force a scheme instead of deriving it from the firmware class
    /// (reverse proxies, test rigs).
    pub scheme_override: Option<Scheme>,
    /// Token service location. `None` means the vendor's production hosts.
    pub enlighten: Option<EnlightenEndpoints>,
}

impl Default for GatewaySourceConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(10),
            enlighten_timeout: Duration::from_secs(10),
            gateway_tls: TlsMode::DangerAcceptInvalid,
            scheme_override: None,
            enlighten: None,
        }
    }
}

/// `TelemetrySource` over the gateway's local API.
///
/// Holds only pooled HTTP clients and immutable configuration, so one
/// instance can serve any number of profiles.
pub struct GatewaySource {
    gateway_http: reqwest::Client,
    enlighten: EnlightenClient,
    scheme_override: Option<Scheme>,
}

impl GatewaySource {
    pub fn new(config: GatewaySourceConfig) -> Result<Self, CoreError> {
        let gateway_transport = TransportConfig {
            tls: config.gateway_tls,
            ..TransportConfig::gateway()
        }
        .with_timeout(config.gateway_timeout)
        .with_cookie_jar();
        let enlighten_transport = TransportConfig::enlighten().with_timeout(config.enlighten_timeout);

        let gateway_http = gateway_transport
            .build_client()
            .map_err(|e| CoreError::Configuration {
                message: e.to_string(),
            })?;
        let endpoints = match config.enlighten {
            Some(endpoints) => endpoints,
            None => EnlightenEndpoints::production().map_err(|e| CoreError::Configuration {
                message: e.to_string(),
            })?,
        };
        let enlighten = EnlightenClient::new(endpoints, &enlighten_transport).map_err(|e| {
            CoreError::Configuration {
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            gateway_http,
            enlighten,
            scheme_override: config.scheme_override,
        })
    }

    /// Build from pre-made clients.
    pub fn with_clients(gateway_http: reqwest::Client, enlighten: EnlightenClient) -> Self {
        Self {
            gateway_http,
            enlighten,
            scheme_override: None,
        }
    }

    /// Force `scheme` for every gateway request.
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme_override = Some(scheme);
        self
    }

    /// Client for `profile`. Legacy firmware also answers Digest challenges,
    /// with the token's local login or the stock `envoy` login.
    fn client(&self, profile: &GatewayProfile, token: Option<&AccessToken>) -> GatewayClient {
        let scheme = self.scheme_override.unwrap_or_else(|| profile.scheme());
        let client = GatewayClient::with_client(self.gateway_http.clone(), &profile.address, scheme);
        if profile.requires_token() {
            return client;
        }
        let login = token
            .and_then(AccessToken::local_login)
            .cloned()
            .unwrap_or_else(|| DigestCredential::envoy_default(&profile.serial_number));
        client.with_digest(login)
    }

    /// Identify the gateway at `address` from `/info`.
    pub async fn discover(&self, address: &str) -> Result<Discovery, CoreError> {
        probe::discover(&self.gateway_http, address).await
    }

    /// Detect meters and storage. See [`probe::probe`].
    pub async fn probe(
        &self,
        profile: &GatewayProfile,
        token: Option<&AccessToken>,
    ) -> Result<CapabilitySet, CoreError> {
        probe::probe(&self.client(profile, token), profile, token).await
    }

    /// Ask the gateway whether it accepts `token` (`/auth/check_jwt`).
    pub async fn check_token(
        &self,
        profile: &GatewayProfile,
        token: &AccessToken,
    ) -> Result<bool, CoreError> {
        Ok(self
            .client(profile, Some(token))
            .check_token(token.secret())
            .await?)
    }
}

#[async_trait]
impl TelemetrySource for GatewaySource {
    async fn authenticate(
        &self,
        profile: &GatewayProfile,
        credential: &Credential,
    ) -> Result<AccessToken, CoreError> {
        let serial = profile.serial_number.trim();
        if serial.is_empty() {
            return Err(CoreError::Configuration {
                message: "gateway serial number is not set".into(),
            });
        }

        if profile.firmware_class == FirmwareClass::Legacy {
            let login = local_login(credential, serial)?;
            debug!(serial, user = login.username(), "legacy firmware, no token required");
            return Ok(AccessToken::local_with(login));
        }

        match credential {
            Credential::None | Credential::Local { .. } => Err(CoreError::Configuration {
                message: "gateway firmware requires a token: configure Enlighten credentials or a token".into(),
            }),
            Credential::StaticToken(raw) => {
                if raw.expose_secret().trim().is_empty() {
                    return Err(CoreError::Configuration {
                        message: "configured token is empty".into(),
                    });
                }
                Ok(AccessToken::new(raw.clone(), serial))
            }
            Credential::Enlighten { username, password } => {
                debug!(serial, username = %username, "minting token via Enlighten");
                let raw = self
                    .enlighten
                    .mint_token(username, password, serial)
                    .await
                    .map_err(CoreError::from_auth)?;
                Ok(AccessToken::new(raw, serial))
            }
        }
    }

    async fn fetch(
        &self,
        profile: &GatewayProfile,
        token: Option<&AccessToken>,
        category: MetricCategory,
    ) -> Result<TelemetryReading, CoreError> {
        if !profile.capabilities.supports(category) {
            debug!(%category, model = %profile.capabilities.model, "category not supported");
            return Ok(TelemetryReading::no_data(category));
        }

        let bearer = token.and_then(AccessToken::bearer);
        if profile.requires_token() && bearer.is_none() {
            return Err(CoreError::NotAuthenticated);
        }

        let dialect = Dialect::for_capabilities(&profile.capabilities);
        let endpoints = dialect.endpoints(category);
        if endpoints.is_empty() {
            return Ok(TelemetryReading::no_data(category));
        }

        let client = self.client(profile, token);
        let mut payloads = Payloads::new();
        for endpoint in endpoints {
            match absent_if_not_found(client.get_text(endpoint, bearer).await)? {
                Some(body) => payloads.insert(endpoint, body),
                None => debug!(%endpoint, "endpoint not available, fields left empty"),
            }
        }

        let data = dialect.parse(category, &payloads)?;
        Ok(TelemetryReading::new(category, data))
    }
}

/// The Digest login a legacy gateway is read with.
fn local_login(credential: &Credential, serial: &str) -> Result<DigestCredential, CoreError> {
    match credential {
        Credential::Local {
            username,
            password: Some(password),
        } => Ok(DigestCredential::new(username.clone(), password.clone())),
        Credential::Local {
            username,
            password: None,
        } if username != DEFAULT_LOCAL_USER => Err(CoreError::Configuration {
            message: format!("local user '{username}' needs a password"),
        }),
        _ => Ok(DigestCredential::envoy_default(serial)),
    }
}
