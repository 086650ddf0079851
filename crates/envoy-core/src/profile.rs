// ── Gateway profile and credentials ──
//
// These types describe *which* gateway to talk to and *how* to
// authenticate. They carry credential data but never touch disk; the host
// builds a `GatewayProfile` (from config or discovery) and hands it in on
// every call.

use chrono::{DateTime, Utc};
use envoy_api::{DigestCredential, Scheme, TokenClaims};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::reading::MetricCategory;

// ── Firmware and hardware ────────────────────────────────────────────

/// Whether the gateway's local API wants a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FirmwareClass {
    /// Firmware < 7: plain HTTP, no authentication.
    Legacy,
    /// Firmware >= 7: HTTPS with an Enlighten-minted token.
    #[strum(to_string = "token", serialize = "token_auth")]
    TokenAuth,
}

impl FirmwareClass {
    /// URL scheme the local API is served on.
    pub fn scheme(self) -> Scheme {
        match self {
            Self::Legacy => Scheme::Http,
            Self::TokenAuth => Scheme::Https,
        }
    }
}

/// Hardware model, as far as it changes what can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GatewayModel {
    /// Envoy-R on firmware < 3.9 (HTML production page only).
    #[strum(to_string = "legacy_r", serialize = "legacy")]
    LegacyR,
    /// Envoy-R on firmware >= 3.9.
    #[strum(to_string = "envoy_r", serialize = "r")]
    EnvoyR,
    /// Envoy-S without integrated metering.
    #[strum(to_string = "envoy_s_standard", serialize = "standard")]
    EnvoySStandard,
    /// Envoy-S with integrated production/consumption meters.
    #[strum(to_string = "envoy_s_metered", serialize = "metered")]
    EnvoySMetered,
}

impl GatewayModel {
    /// `true` for the Envoy-S family (batteries possible).
    pub fn is_envoy_s(self) -> bool {
        matches!(self, Self::EnvoySStandard | Self::EnvoySMetered)
    }

    /// Human-readable name.
    pub fn verbose_name(self) -> &'static str {
        match self {
            Self::LegacyR | Self::EnvoyR => "Envoy-R",
            Self::EnvoySStandard => "Envoy-S Standard",
            Self::EnvoySMetered => "Envoy-S Metered",
        }
    }
}

/// Enabled meter EIDs by measurement type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterLayout {
    pub production: Option<u64>,
    pub net_consumption: Option<u64>,
    pub total_consumption: Option<u64>,
}

impl MeterLayout {
    /// The consumption meter to read, preferring net over total.
    pub fn consumption(&self) -> Option<u64> {
        self.net_consumption.or(self.total_consumption)
    }

    /// CTs count as enabled when both a production and a consumption
    /// meter report.
    pub fn ct_enabled(&self) -> bool {
        self.production.is_some() && self.consumption().is_some()
    }
}

/// What the hardware behind a gateway can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub model: GatewayModel,
    pub meters: MeterLayout,
    /// Encharge / IQ Batteries present in the ensemble inventory.
    pub encharge: bool,
    /// AC Battery present in `production.json` storage.
    pub ac_battery: bool,
}

impl CapabilitySet {
    /// A capability set with no meters and no storage.
    pub fn new(model: GatewayModel) -> Self {
        Self {
            model,
            meters: MeterLayout::default(),
            encharge: false,
            ac_battery: false,
        }
    }

    pub fn has_battery(&self) -> bool {
        self.model.is_envoy_s() && (self.encharge || self.ac_battery)
    }

    /// Whether `category` can be read at all on this hardware.
    pub fn supports(&self, category: MetricCategory) -> bool {
        let metered = self.model == GatewayModel::EnvoySMetered && self.meters.ct_enabled();
        match category {
            MetricCategory::Production => true,
            MetricCategory::Consumption => metered,
            MetricCategory::Grid => metered && self.meters.net_consumption.is_some(),
            MetricCategory::Inverters => self.model != GatewayModel::LegacyR,
            MetricCategory::Battery => self.has_battery(),
        }
    }
}

// ── Profile ──────────────────────────────────────────────────────────

/// Everything needed to reach one gateway.
///
/// Only the host changes a profile, and only by swapping the address
/// (`with_address`). The library builds URLs from whatever snapshot it is
/// handed and remembers nothing between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayProfile {
    pub serial_number: String,
    /// Hostname, IPv4 or IPv6 literal, stored verbatim.
    pub address: String,
    pub firmware_class: FirmwareClass,
    pub firmware_version: Option<String>,
    pub part_number: Option<String>,
    pub capabilities: CapabilitySet,
}

impl GatewayProfile {
    pub fn new(
        serial_number: impl Into<String>,
        address: impl Into<String>,
        firmware_class: FirmwareClass,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            address: address.into(),
            firmware_class,
            firmware_version: None,
            part_number: None,
            capabilities,
        }
    }

    /// The same gateway at a different address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.firmware_class.scheme()
    }

    pub fn requires_token(&self) -> bool {
        self.firmware_class == FirmwareClass::TokenAuth
    }
}

// ── Credentials ──────────────────────────────────────────────────────

/// How to obtain an access token.
#[derive(Debug, Clone)]
pub enum Credential {
    /// No credentials. Legacy firmware falls back to the stock `envoy`
    /// login for its Digest-protected pages.
    None,
    /// Local login for legacy firmware's Digest-protected pages. Without a
    /// password only the `envoy` user works, its password being derived
    /// from the serial number.
    Local {
        username: String,
        password: Option<SecretString>,
    },
    /// Enlighten account; tokens are minted on demand.
    Enlighten {
        username: String,
        password: SecretString,
    },
    /// A token minted elsewhere. Cannot be refreshed.
    StaticToken(SecretString),
}

impl Credential {
    /// `true` when a rejected token can be replaced by minting a new one.
    pub fn can_mint(&self) -> bool {
        matches!(self, Self::Enlighten { .. })
    }
}

/// A bearer token bound to one gateway serial.
///
/// `expires_at` is decoded from the JWT. Within a session the gateway's
/// 401 is the only expiry signal; hosts consult `expires_at` only to decide
/// whether a stored token is worth resuming.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    serial_number: String,
    obtained_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    local_login: Option<DigestCredential>,
}

impl AccessToken {
    /// Wrap a raw token for `serial_number`, noting its advertised expiry.
    pub fn new(secret: SecretString, serial_number: impl Into<String>) -> Self {
        let expires_at = TokenClaims::decode_unverified(secret.expose_secret())
            .ok()
            .and_then(|claims| claims.expires_at());
        Self {
            secret,
            serial_number: serial_number.into(),
            obtained_at: Utc::now(),
            expires_at,
            local_login: None,
        }
    }

    /// The empty token used for legacy firmware.
    pub fn local() -> Self {
        Self {
            secret: SecretString::from(String::new()),
            serial_number: String::new(),
            obtained_at: Utc::now(),
            expires_at: None,
            local_login: None,
        }
    }

    /// A legacy-firmware token that answers Digest challenges with `login`.
    pub fn local_with(login: DigestCredential) -> Self {
        Self {
            local_login: Some(login),
            ..Self::local()
        }
    }

    /// Login for Digest-protected pages, if one was resolved.
    pub fn local_login(&self) -> Option<&DigestCredential> {
        self.local_login.as_ref()
    }

    pub fn is_local(&self) -> bool {
        self.secret.expose_secret().is_empty()
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// The secret, or `None` for a local token.
    pub fn bearer(&self) -> Option<&SecretString> {
        (!self.is_local()).then_some(&self.secret)
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    /// Expiry advertised in the token.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// `true` if the token advertises an expiry later than `instant`.
    /// Tokens without a decodable expiry never qualify.
    pub fn valid_beyond(&self, instant: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp > instant)
    }

    /// `true` if the token stays valid for at least `margin` from now.
    pub fn valid_for(&self, margin: std::time::Duration) -> bool {
        chrono::Duration::from_std(margin)
            .ok()
            .and_then(|margin| Utc::now().checked_add_signed(margin))
            .is_some_and(|instant| self.valid_beyond(instant))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn metered(meters: MeterLayout) -> CapabilitySet {
        CapabilitySet {
            meters,
            ..CapabilitySet::new(GatewayModel::EnvoySMetered)
        }
    }

    #[test]
    fn presence_matrix() {
        let legacy = CapabilitySet::new(GatewayModel::LegacyR);
        assert!(legacy.supports(MetricCategory::Production));
        assert!(!legacy.supports(MetricCategory::Inverters));
        assert!(!legacy.supports(MetricCategory::Consumption));

        let standard = CapabilitySet {
            encharge: true,
            ..CapabilitySet::new(GatewayModel::EnvoySStandard)
        };
        assert!(standard.supports(MetricCategory::Inverters));
        assert!(standard.supports(MetricCategory::Battery));
        assert!(!standard.supports(MetricCategory::Grid));

        let ct = metered(MeterLayout {
            production: Some(704643328),
            net_consumption: Some(704643584),
            total_consumption: None,
        });
        assert!(ct.supports(MetricCategory::Consumption));
        assert!(ct.supports(MetricCategory::Grid));
        assert!(!ct.supports(MetricCategory::Battery));

        let no_ct = metered(MeterLayout {
            production: Some(704643328),
            ..MeterLayout::default()
        });
        assert!(!no_ct.supports(MetricCategory::Consumption));
        assert!(no_ct.supports(MetricCategory::Production));
    }

    #[test]
    fn total_consumption_meter_has_no_grid() {
        let caps = metered(MeterLayout {
            production: Some(1),
            net_consumption: None,
            total_consumption: Some(2),
        });
        assert!(caps.supports(MetricCategory::Consumption));
        assert!(!caps.supports(MetricCategory::Grid));
    }

    #[test]
    fn envoy_r_never_reports_batteries() {
        let caps = CapabilitySet {
            ac_battery: true,
            ..CapabilitySet::new(GatewayModel::EnvoyR)
        };
        assert!(!caps.supports(MetricCategory::Battery));
    }

    #[test]
    fn model_and_class_aliases() {
        assert_eq!(GatewayModel::from_str("metered").ok(), Some(GatewayModel::EnvoySMetered));
        assert_eq!(GatewayModel::from_str("Standard").ok(), Some(GatewayModel::EnvoySStandard));
        assert_eq!(FirmwareClass::from_str("token").ok(), Some(FirmwareClass::TokenAuth));
        assert_eq!(FirmwareClass::from_str("legacy").ok(), Some(FirmwareClass::Legacy));
    }

    #[test]
    fn with_address_keeps_everything_else() {
        let profile = GatewayProfile::new(
            "122201234567",
            "192.168.1.50",
            FirmwareClass::TokenAuth,
            CapabilitySet::new(GatewayModel::EnvoySStandard),
        );
        let moved = profile.clone().with_address("fe80::1");
        assert_eq!(moved.address, "fe80::1");
        assert_eq!(moved.serial_number, profile.serial_number);
        assert_eq!(moved.capabilities, profile.capabilities);
    }

    #[test]
    fn local_token_has_no_bearer() {
        let token = AccessToken::local();
        assert!(token.is_local());
        assert!(token.bearer().is_none());

        let token = AccessToken::new(SecretString::from("opaque".to_owned()), "1");
        assert!(token.bearer().is_some());
        assert_eq!(token.expires_at(), None);
        assert!(!token.valid_beyond(Utc::now()));
    }

    #[test]
    fn local_token_carries_digest_login() {
        assert!(AccessToken::local().local_login().is_none());

        let token = AccessToken::local_with(DigestCredential::envoy_default("121212121212"));
        assert!(token.is_local());
        assert_eq!(token.local_login().map(DigestCredential::username), Some("envoy"));
    }

    #[test]
    fn only_enlighten_can_mint() {
        let enlighten = Credential::Enlighten {
            username: "me@example.com".into(),
            password: SecretString::from("pw".to_owned()),
        };
        assert!(enlighten.can_mint());
        assert!(!Credential::None.can_mint());
        assert!(!Credential::StaticToken(SecretString::from("eyJ".to_owned())).can_mint());
        assert!(
            !Credential::Local {
                username: "envoy".into(),
                password: None
            }
            .can_mint()
        );
    }
}
