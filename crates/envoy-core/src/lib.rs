// envoy-core: Domain layer between envoy-api and hosts (CLI).

pub mod dialect;
pub mod error;
pub mod probe;
pub mod profile;
pub mod reading;
pub mod session;
pub mod source;

// ── Primary re-exports ──────────────────────────────────────────────
pub use dialect::{Dialect, Payloads, Storage};
pub use error::CoreError;
pub use probe::Discovery;
pub use profile::{
    AccessToken, CapabilitySet, Credential, FirmwareClass, GatewayModel, GatewayProfile,
    MeterLayout,
};
pub use reading::{
    BatteryKind, BatteryReading, BatteryUnit, EnergyReading, GridReading, InverterReading,
    MetricCategory, ReadingData, TelemetryReading,
};
pub use session::{GatewaySession, SessionState};
pub use source::{GatewaySource, GatewaySourceConfig, TelemetrySource};

// Wire-level types hosts need when building a source.
pub use envoy_api::gateway::digest::DEFAULT_LOCAL_USER;
pub use envoy_api::{EnlightenEndpoints, Scheme, TlsMode};
