// Gateway endpoint catalogue

use std::fmt;

/// Local API endpoints served by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// `envoy_info` XML. Unauthenticated on every firmware.
    Info,
    /// HTML production page of firmware < 3.9.
    ProductionPage,
    /// Production totals, firmware >= 3.9.
    ProductionV1,
    /// Per-microinverter production.
    Inverters,
    /// Combined production/consumption/storage report.
    ProductionJson,
    /// Meter (CT) configuration.
    Meters,
    /// Live meter readings, keyed by meter EID.
    MeterReadings,
    /// Ensemble device inventory (Encharge, Enpower).
    EnsembleInventory,
    /// Ensemble per-battery power.
    EnsemblePower,
    /// Token validation; hands out a session cookie.
    CheckJwt,
}

impl Endpoint {
    /// Path relative to the gateway root, without a leading slash.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::ProductionPage => "production",
            Self::ProductionV1 => "api/v1/production",
            Self::Inverters => "api/v1/production/inverters",
            Self::ProductionJson => "production.json",
            Self::Meters => "ivp/meters",
            Self::MeterReadings => "ivp/meters/readings",
            Self::EnsembleInventory => "ivp/ensemble/inventory",
            Self::EnsemblePower => "ivp/ensemble/power",
            Self::CheckJwt => "auth/check_jwt",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// URL scheme used to reach the gateway.
///
/// Token firmware serves HTTPS only; older firmware serves plain HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
