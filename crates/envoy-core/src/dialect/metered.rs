// Envoy-S Metered.
//
// With CTs enabled, live power and lifetime energy come from the per-meter
// readings (keyed by EID) and "today" from the `eim` entries of
// `production.json`. With CTs disabled only `production.json` is usable.
// Seven-day totals on metered gateways are inaccurate and never reported.

use envoy_api::Endpoint;
use envoy_api::gateway::models::{MeasurementEntry, MeterReading, ProductionReport};

use crate::dialect::Payloads;
use crate::error::CoreError;
use crate::profile::MeterLayout;
use crate::reading::{EnergyReading, GridReading};

const EIM: &str = "eim";
const INVERTERS: &str = "inverters";

struct Sources {
    readings: Vec<MeterReading>,
    report: Option<ProductionReport>,
}

impl Sources {
    fn load(payloads: &Payloads) -> Result<Self, CoreError> {
        Ok(Self {
            readings: payloads
                .json::<Vec<MeterReading>>(Endpoint::MeterReadings)?
                .unwrap_or_default(),
            report: payloads.json::<ProductionReport>(Endpoint::ProductionJson)?,
        })
    }

    fn meter(&self, eid: Option<u64>) -> Option<&MeterReading> {
        let eid = eid?;
        self.readings.iter().find(|r| r.eid == eid)
    }
}

fn active_entry<'a>(
    entries: &'a [MeasurementEntry],
    kind: &str,
    measurement_type: Option<&str>,
) -> Option<&'a MeasurementEntry> {
    entries.iter().find(|e| {
        e.kind == kind
            && e.is_active()
            && measurement_type.is_none_or(|m| e.is_measurement(m))
    })
}

/// Production with CTs enabled.
pub fn production(meters: &MeterLayout, payloads: &Payloads) -> Result<EnergyReading, CoreError> {
    let sources = Sources::load(payloads)?;
    let meter = sources.meter(meters.production);

    let today_wh = sources
        .report
        .as_ref()
        .and_then(|r| active_entry(&r.production, EIM, None))
        .and_then(|e| e.wh_today);

    Ok(EnergyReading {
        power_w: meter.and_then(|m| m.active_power),
        today_wh,
        last_seven_days_wh: None,
        lifetime_wh: meter.and_then(|m| m.act_energy_dlvd),
    })
}

/// Consumption with CTs enabled.
///
/// A net-consumption meter measures the grid connection, so household
/// consumption is production plus net. A total-consumption meter reads
/// the load directly.
pub fn consumption(meters: &MeterLayout, payloads: &Payloads) -> Result<EnergyReading, CoreError> {
    let sources = Sources::load(payloads)?;
    let production = sources.meter(meters.production);

    let (power_w, lifetime_wh) = if meters.net_consumption.is_some() {
        let net = sources.meter(meters.net_consumption);
        let power = production
            .and_then(|p| p.active_power)
            .zip(net.and_then(|n| n.active_power))
            .map(|(p, n)| p + n);
        let lifetime = production.and_then(|p| p.act_energy_dlvd).zip(net).and_then(|(p, n)| {
            let received = n.act_energy_rcvd?;
            let delivered = n.act_energy_dlvd?;
            Some(p - (received - delivered))
        });
        (power, lifetime)
    } else {
        let total = sources.meter(meters.total_consumption);
        (
            total.and_then(|t| t.active_power),
            total.and_then(|t| t.act_energy_rcvd),
        )
    };

    let today_wh = sources
        .report
        .as_ref()
        .and_then(|r| active_entry(&r.consumption, EIM, Some("total-consumption")))
        .and_then(|e| e.wh_today);

    Ok(EnergyReading {
        power_w,
        today_wh,
        last_seven_days_wh: None,
        lifetime_wh,
    })
}

/// Grid exchange from the net-consumption meter.
pub fn grid(meters: &MeterLayout, payloads: &Payloads) -> Result<GridReading, CoreError> {
    let sources = Sources::load(payloads)?;
    let net = sources.meter(meters.net_consumption);
    Ok(GridReading::from_net(
        net.and_then(|n| n.active_power),
        net.and_then(|n| n.act_energy_dlvd),
        net.and_then(|n| n.act_energy_rcvd),
    ))
}

/// Production with CTs disabled, from `production.json`.
///
/// Uses the `eim` entry when a production meter exists, otherwise the
/// summed `inverters` entry, which has no daily total.
pub fn production_ct_disabled(
    meters: &MeterLayout,
    payloads: &Payloads,
) -> Result<EnergyReading, CoreError> {
    let Some(report) = payloads.json::<ProductionReport>(Endpoint::ProductionJson)? else {
        return Ok(EnergyReading::default());
    };

    let kind = if meters.production.is_some() {
        EIM
    } else {
        INVERTERS
    };
    let entry = active_entry(&report.production, kind, None);

    Ok(EnergyReading {
        power_w: entry.and_then(|e| e.w_now),
        today_wh: entry.and_then(|e| e.wh_today),
        last_seven_days_wh: None,
        lifetime_wh: entry.and_then(|e| e.wh_lifetime),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PROD_EID: u64 = 704_643_328;
    const NET_EID: u64 = 704_643_584;
    const TOTAL_EID: u64 = 704_643_840;

    const READINGS: &str = r#"[
        {"eid":704643328,"timestamp":1672574917,"actEnergyDlvd":4000000,"actEnergyRcvd":0,"activePower":3000},
        {"eid":704643584,"timestamp":1672574917,"actEnergyDlvd":1500000,"actEnergyRcvd":2500000,"activePower":-1200},
        {"eid":704643840,"timestamp":1672574917,"actEnergyDlvd":0,"actEnergyRcvd":3100000,"activePower":1750}
    ]"#;

    const REPORT: &str = r#"{
        "production":[
            {"type":"inverters","activeCount":12,"readingTime":1672574917,"wNow":2950,"whLifetime":3990000},
            {"type":"eim","activeCount":1,"measurementType":"production","readingTime":1672574917,"wNow":3000,"whLifetime":4000000,"whToday":12000,"whLastSevenDays":80000}
        ],
        "consumption":[
            {"type":"eim","activeCount":1,"measurementType":"total-consumption","wNow":1800,"whLifetime":3000000,"whToday":9500,"whLastSevenDays":60000},
            {"type":"eim","activeCount":1,"measurementType":"net-consumption","wNow":-1200,"whLifetime":-1000000,"whToday":0,"whLastSevenDays":0}
        ],
        "storage":[{"type":"acb","activeCount":0,"wNow":0,"whNow":0,"state":"idle"}]
    }"#;

    fn payloads() -> Payloads {
        Payloads::new()
            .with(Endpoint::MeterReadings, READINGS)
            .with(Endpoint::ProductionJson, REPORT)
    }

    fn net_layout() -> MeterLayout {
        MeterLayout {
            production: Some(PROD_EID),
            net_consumption: Some(NET_EID),
            total_consumption: None,
        }
    }

    #[test]
    fn production_from_meter() {
        let reading = production(&net_layout(), &payloads()).unwrap();
        assert_eq!(
            reading,
            EnergyReading {
                power_w: Some(3000.0),
                today_wh: Some(12_000.0),
                last_seven_days_wh: None,
                lifetime_wh: Some(4_000_000.0),
            }
        );
    }

    #[test]
    fn consumption_from_net_meter() {
        let reading = consumption(&net_layout(), &payloads()).unwrap();
        // 3000 W produced, 1200 W exported.
        assert_eq!(reading.power_w, Some(1800.0));
        // 4 MWh produced, 1 MWh net exported.
        assert_eq!(reading.lifetime_wh, Some(3_000_000.0));
        assert_eq!(reading.today_wh, Some(9_500.0));
        assert_eq!(reading.last_seven_days_wh, None);
    }

    #[test]
    fn consumption_from_total_meter() {
        let layout = MeterLayout {
            production: Some(PROD_EID),
            net_consumption: None,
            total_consumption: Some(TOTAL_EID),
        };
        let reading = consumption(&layout, &payloads()).unwrap();
        assert_eq!(reading.power_w, Some(1750.0));
        assert_eq!(reading.lifetime_wh, Some(3_100_000.0));
    }

    #[test]
    fn grid_import_export() {
        let reading = grid(&net_layout(), &payloads()).unwrap();
        assert_eq!(
            reading,
            GridReading {
                net_power_w: Some(-1200.0),
                import_power_w: Some(0.0),
                export_power_w: Some(1200.0),
                lifetime_import_wh: Some(1_500_000.0),
                lifetime_export_wh: Some(2_500_000.0),
            }
        );
    }

    #[test]
    fn missing_meter_readings_leave_fields_empty() {
        let payloads = Payloads::new().with(Endpoint::ProductionJson, REPORT);
        let reading = production(&net_layout(), &payloads).unwrap();
        assert_eq!(reading.power_w, None);
        assert_eq!(reading.lifetime_wh, None);
        assert_eq!(reading.today_wh, Some(12_000.0));
    }

    #[test]
    fn ct_disabled_uses_inverters_entry() {
        let reading = production_ct_disabled(&MeterLayout::default(), &payloads()).unwrap();
        assert_eq!(
            reading,
            EnergyReading {
                power_w: Some(2950.0),
                today_wh: None,
                last_seven_days_wh: None,
                lifetime_wh: Some(3_990_000.0),
            }
        );
    }

    #[test]
    fn ct_disabled_with_production_meter_uses_eim() {
        let layout = MeterLayout {
            production: Some(PROD_EID),
            ..MeterLayout::default()
        };
        let reading = production_ct_disabled(&layout, &payloads()).unwrap();
        assert_eq!(reading.today_wh, Some(12_000.0));
        assert_eq!(reading.last_seven_days_wh, None);
    }
}
