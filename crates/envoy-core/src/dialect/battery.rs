// Battery parsing shared by the Envoy-S family.
//
// Encharge / IQ Batteries report charge and capacity in the ensemble
// inventory and live power (in mW) in the ensemble power list. The older
// AC Battery appears as a `production.json` storage entry that carries
// `percentFull`. Positive power means discharging.

use envoy_api::Endpoint;
use envoy_api::gateway::models::{EnsembleGroup, EnsemblePower, ProductionReport};

use crate::dialect::{Payloads, Storage};
use crate::error::CoreError;
use crate::reading::{BatteryKind, BatteryReading, BatteryUnit};

const AC_BATTERY_SERIAL: &str = "ac_battery";

pub fn endpoints(storage: Storage) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    if storage.encharge {
        endpoints.push(Endpoint::EnsembleInventory);
        endpoints.push(Endpoint::EnsemblePower);
    }
    if storage.ac_battery {
        endpoints.push(Endpoint::ProductionJson);
    }
    endpoints
}

pub fn parse(storage: Storage, payloads: &Payloads) -> Result<BatteryReading, CoreError> {
    let mut units = Vec::new();
    if storage.encharge {
        units.extend(encharge_units(payloads)?);
    }
    if storage.ac_battery {
        units.extend(ac_battery_units(payloads)?);
    }
    Ok(aggregate(units))
}

fn encharge_units(payloads: &Payloads) -> Result<Vec<BatteryUnit>, CoreError> {
    let inventory = payloads
        .json::<Vec<EnsembleGroup>>(Endpoint::EnsembleInventory)?
        .unwrap_or_default();
    let power = payloads
        .json::<EnsemblePower>(Endpoint::EnsemblePower)?
        .unwrap_or_default();

    let units = inventory
        .iter()
        .filter(|group| group.is_encharge())
        .flat_map(|group| group.devices.iter())
        .map(|device| {
            let live = power
                .devices
                .iter()
                .find(|p| p.serial_num == device.serial_number);
            let soc = device.percent_full.or_else(|| live.and_then(|p| p.soc));
            BatteryUnit {
                serial_number: device.serial_number.clone(),
                kind: BatteryKind::Encharge,
                state_of_charge_pct: soc,
                capacity_wh: device.encharge_capacity,
                stored_wh: device
                    .encharge_capacity
                    .zip(soc)
                    .map(|(capacity, pct)| (capacity * pct / 100.0).round()),
                real_power_w: live.and_then(|p| p.real_power_mw).map(|mw| mw / 1_000.0),
                temperature_c: device.temperature,
            }
        })
        .collect();
    Ok(units)
}

fn ac_battery_units(payloads: &Payloads) -> Result<Vec<BatteryUnit>, CoreError> {
    let Some(report) = payloads.json::<ProductionReport>(Endpoint::ProductionJson)? else {
        return Ok(Vec::new());
    };

    Ok(report
        .storage
        .iter()
        .filter(|entry| entry.percent_full.is_some())
        .map(|entry| {
            let capacity_wh = entry
                .wh_now
                .zip(entry.percent_full)
                .filter(|&(_, pct)| pct > 0.0)
                .map(|(stored, pct)| (stored * 100.0 / pct).round());
            BatteryUnit {
                serial_number: AC_BATTERY_SERIAL.to_owned(),
                kind: BatteryKind::AcBattery,
                state_of_charge_pct: entry.percent_full,
                capacity_wh,
                stored_wh: entry.wh_now,
                real_power_w: entry.w_now,
                temperature_c: None,
            }
        })
        .collect())
}

fn sum(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

fn aggregate(units: Vec<BatteryUnit>) -> BatteryReading {
    let socs: Vec<f64> = units.iter().filter_map(|u| u.state_of_charge_pct).collect();
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let state_of_charge_pct =
        (!socs.is_empty()).then(|| socs.iter().sum::<f64>() / socs.len() as f64);

    let real_power_w = sum(units.iter().map(|u| u.real_power_w));

    BatteryReading {
        state_of_charge_pct,
        capacity_wh: sum(units.iter().map(|u| u.capacity_wh)),
        stored_wh: sum(units.iter().map(|u| u.stored_wh)),
        real_power_w,
        charging_power_w: real_power_w.map(|p| (-p).max(0.0)),
        discharging_power_w: real_power_w.map(|p| p.max(0.0)),
        units,
    }
}
