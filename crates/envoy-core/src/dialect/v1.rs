// `api/v1` JSON endpoints: production totals and per-inverter reports.

use chrono::DateTime;
use envoy_api::Endpoint;
use envoy_api::gateway::models::{InverterEntry, ProductionV1};

use crate::dialect::Payloads;
use crate::error::CoreError;
use crate::reading::{EnergyReading, InverterReading};

pub fn production(payloads: &Payloads) -> Result<EnergyReading, CoreError> {
    let Some(totals) = payloads.json::<ProductionV1>(Endpoint::ProductionV1)? else {
        return Ok(EnergyReading::default());
    };
    Ok(EnergyReading {
        power_w: totals.watts_now,
        today_wh: totals.watt_hours_today,
        last_seven_days_wh: totals.watt_hours_seven_days,
        lifetime_wh: totals.watt_hours_lifetime,
    })
}

pub fn inverters(payloads: &Payloads) -> Result<Vec<InverterReading>, CoreError> {
    let entries = payloads
        .json::<Vec<InverterEntry>>(Endpoint::Inverters)?
        .unwrap_or_default();

    Ok(entries
        .into_iter()
        .map(|entry| InverterReading {
            last_report: entry
                .last_report_date
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            serial_number: entry.serial_number,
            device_type: entry.dev_type,
            power_w: entry.last_report_watts,
            max_power_w: entry.max_report_watts,
        })
        .collect())
}
