// Gateway JSON response types
//
// Field names follow the firmware verbatim. Everything optional is
// `#[serde(default)]` because field presence varies across firmware
// releases and hardware configurations.

use serde::{Deserialize, Serialize};

// ── api/v1/production ────────────────────────────────────────────────

/// Production totals from `api/v1/production`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionV1 {
    #[serde(default)]
    pub watts_now: Option<f64>,
    #[serde(default)]
    pub watt_hours_today: Option<f64>,
    #[serde(default)]
    pub watt_hours_seven_days: Option<f64>,
    #[serde(default)]
    pub watt_hours_lifetime: Option<f64>,
}

// ── api/v1/production/inverters ──────────────────────────────────────

/// One microinverter from `api/v1/production/inverters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterEntry {
    pub serial_number: String,
    /// Unix seconds.
    #[serde(default)]
    pub last_report_date: Option<i64>,
    #[serde(default)]
    pub dev_type: Option<i64>,
    #[serde(default)]
    pub last_report_watts: Option<f64>,
    #[serde(default)]
    pub max_report_watts: Option<f64>,
}

// ── production.json ──────────────────────────────────────────────────

/// The combined report served at `production.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionReport {
    #[serde(default)]
    pub production: Vec<MeasurementEntry>,
    #[serde(default)]
    pub consumption: Vec<MeasurementEntry>,
    #[serde(default)]
    pub storage: Vec<StorageEntry>,
}

/// A production or consumption entry in `production.json`.
///
/// `type` is `inverters` (summed microinverter reports) or `eim`
/// (integrated meter). `eim` entries carry a `measurementType` of
/// `production`, `total-consumption` or `net-consumption`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub active_count: i64,
    #[serde(default)]
    pub measurement_type: Option<String>,
    #[serde(default)]
    pub reading_time: Option<i64>,
    #[serde(default)]
    pub w_now: Option<f64>,
    #[serde(default)]
    pub wh_lifetime: Option<f64>,
    #[serde(default)]
    pub wh_today: Option<f64>,
    #[serde(default)]
    pub wh_last_seven_days: Option<f64>,
}

impl MeasurementEntry {
    /// `true` when this entry reports live data (at least one device).
    pub fn is_active(&self) -> bool {
        self.active_count > 0
    }

    pub fn is_measurement(&self, measurement_type: &str) -> bool {
        self.measurement_type.as_deref() == Some(measurement_type)
    }
}

/// A storage entry in `production.json`. AC Batteries carry `percentFull`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub active_count: i64,
    #[serde(default)]
    pub reading_time: Option<i64>,
    #[serde(default)]
    pub w_now: Option<f64>,
    #[serde(default)]
    pub wh_now: Option<f64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub percent_full: Option<f64>,
}

// ── ivp/meters ───────────────────────────────────────────────────────

/// Meter configuration entry from `ivp/meters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterConfig {
    pub eid: u64,
    /// `enabled` or `disabled`.
    pub state: String,
    /// `production`, `net-consumption` or `total-consumption`.
    pub measurement_type: String,
    #[serde(default)]
    pub phase_mode: Option<String>,
    #[serde(default)]
    pub phase_count: Option<u32>,
    #[serde(default)]
    pub metering_status: Option<String>,
}

impl MeterConfig {
    pub fn is_enabled(&self) -> bool {
        self.state == "enabled"
    }
}

// ── ivp/meters/readings ──────────────────────────────────────────────

/// Live reading for one meter from `ivp/meters/readings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    pub eid: u64,
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Energy delivered (Wh), i.e. imported for a net meter.
    #[serde(default)]
    pub act_energy_dlvd: Option<f64>,
    /// Energy received (Wh), i.e. exported for a net meter.
    #[serde(default)]
    pub act_energy_rcvd: Option<f64>,
    #[serde(default)]
    pub active_power: Option<f64>,
    #[serde(default)]
    pub apparent_power: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub freq: Option<f64>,
}

// ── ivp/ensemble/inventory ───────────────────────────────────────────

/// One device group from `ivp/ensemble/inventory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleGroup {
    /// `ENCHARGE`, `ENPOWER`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub devices: Vec<EnsembleDevice>,
}

impl EnsembleGroup {
    pub fn is_encharge(&self) -> bool {
        self.kind.eq_ignore_ascii_case("ENCHARGE")
    }
}

/// An ensemble device. Battery fields are only present on Encharge units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleDevice {
    #[serde(rename = "serial_num")]
    pub serial_number: String,
    #[serde(default)]
    pub percent_full: Option<f64>,
    /// Degrees Celsius.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Wh.
    #[serde(default, rename = "encharge_capacity")]
    pub encharge_capacity: Option<f64>,
}

// ── ivp/ensemble/power ───────────────────────────────────────────────

/// Per-battery power from `ivp/ensemble/power`.
///
/// Firmware serves the list under the literal key `"devices:"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePower {
    #[serde(default, rename = "devices:", alias = "devices")]
    pub devices: Vec<EnsemblePowerDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePowerDevice {
    pub serial_num: String,
    /// Milliwatts; positive while discharging.
    #[serde(default)]
    pub real_power_mw: Option<f64>,
    /// Milli-volt-amperes.
    #[serde(default)]
    pub apparent_power_mva: Option<f64>,
    #[serde(default)]
    pub soc: Option<f64>,
}
