// ── Telemetry readings ──
//
// Typed results of a fetch. Every variant has a fixed field set; a value
// the hardware or firmware cannot provide is `None`, never a missing key,
// so repeated reads of one category always return the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// What to read from a gateway.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MetricCategory {
    Production,
    Consumption,
    /// Net import/export at the grid connection.
    Grid,
    Inverters,
    Battery,
}

/// One reading for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub category: MetricCategory,
    pub taken_at: DateTime<Utc>,
    pub data: ReadingData,
}

impl TelemetryReading {
    pub fn new(category: MetricCategory, data: ReadingData) -> Self {
        Self {
            category,
            taken_at: Utc::now(),
            data,
        }
    }

    /// A reading for a category the gateway cannot provide.
    pub fn no_data(category: MetricCategory) -> Self {
        Self::new(category, ReadingData::NoData)
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.data, ReadingData::NoData)
    }
}

/// Category-specific payload of a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ReadingData {
    Energy(EnergyReading),
    Grid(GridReading),
    Inverters(Vec<InverterReading>),
    Battery(BatteryReading),
    NoData,
}

/// Production or consumption figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyReading {
    /// Current power (W).
    pub power_w: Option<f64>,
    /// Energy since local midnight (Wh).
    pub today_wh: Option<f64>,
    /// Energy over the last seven days (Wh).
    pub last_seven_days_wh: Option<f64>,
    /// Energy since installation (Wh).
    pub lifetime_wh: Option<f64>,
}

/// Grid exchange as seen by the net-consumption meter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridReading {
    /// Positive while importing (W).
    pub net_power_w: Option<f64>,
    pub import_power_w: Option<f64>,
    pub export_power_w: Option<f64>,
    pub lifetime_import_wh: Option<f64>,
    pub lifetime_export_wh: Option<f64>,
}

impl GridReading {
    /// Split a signed net power into import and export.
    pub fn from_net(
        net_power_w: Option<f64>,
        lifetime_import_wh: Option<f64>,
        lifetime_export_wh: Option<f64>,
    ) -> Self {
        Self {
            net_power_w,
            import_power_w: net_power_w.map(|p| p.max(0.0)),
            export_power_w: net_power_w.map(|p| (-p).max(0.0)),
            lifetime_import_wh,
            lifetime_export_wh,
        }
    }
}

/// One microinverter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterReading {
    pub serial_number: String,
    pub last_report: Option<DateTime<Utc>>,
    pub device_type: Option<i64>,
    pub power_w: Option<f64>,
    pub max_power_w: Option<f64>,
}

/// Aggregate battery state across every storage unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// Mean state of charge (%).
    pub state_of_charge_pct: Option<f64>,
    /// Total usable capacity (Wh).
    pub capacity_wh: Option<f64>,
    /// Energy currently stored (Wh).
    pub stored_wh: Option<f64>,
    /// Signed total power; positive while discharging (W).
    pub real_power_w: Option<f64>,
    pub charging_power_w: Option<f64>,
    pub discharging_power_w: Option<f64>,
    pub units: Vec<BatteryUnit>,
}

/// A single storage unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryUnit {
    pub serial_number: String,
    pub kind: BatteryKind,
    pub state_of_charge_pct: Option<f64>,
    pub capacity_wh: Option<f64>,
    pub stored_wh: Option<f64>,
    pub real_power_w: Option<f64>,
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatteryKind {
    /// IQ Battery / Encharge.
    Encharge,
    /// First-generation AC Battery.
    AcBattery,
}
