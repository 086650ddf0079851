//! `read`: one poll cycle over the requested categories.

use tabled::Tabled;

use envoy_core::{
    BatteryReading, EnergyReading, GridReading, InverterReading, ReadingData, TelemetryReading,
};

use crate::cli::{GlobalOpts, ReadArgs};
use crate::config::ResolvedGateway;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(super) struct ReadingRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn power(w: Option<f64>) -> String {
    match w {
        None => "-".into(),
        Some(w) if w.abs() >= 1_000.0 => format!("{:.2} kW", w / 1_000.0),
        Some(w) => format!("{w:.0} W"),
    }
}

fn energy(wh: Option<f64>) -> String {
    match wh {
        None => "-".into(),
        Some(wh) if wh.abs() >= 1_000_000.0 => format!("{:.2} MWh", wh / 1_000_000.0),
        Some(wh) if wh.abs() >= 1_000.0 => format!("{:.2} kWh", wh / 1_000.0),
        Some(wh) => format!("{wh:.0} Wh"),
    }
}

fn percent(pct: Option<f64>) -> String {
    pct.map_or_else(|| "-".into(), |p| format!("{p:.0} %"))
}

fn energy_rows(e: &EnergyReading) -> Vec<(String, String)> {
    vec![
        ("Power".into(), power(e.power_w)),
        ("Today".into(), energy(e.today_wh)),
        ("Last 7 days".into(), energy(e.last_seven_days_wh)),
        ("Lifetime".into(), energy(e.lifetime_wh)),
    ]
}

fn grid_rows(g: &GridReading) -> Vec<(String, String)> {
    vec![
        ("Net power".into(), power(g.net_power_w)),
        ("Import".into(), power(g.import_power_w)),
        ("Export".into(), power(g.export_power_w)),
        ("Lifetime import".into(), energy(g.lifetime_import_wh)),
        ("Lifetime export".into(), energy(g.lifetime_export_wh)),
    ]
}

fn inverter_rows(inverters: &[InverterReading]) -> Vec<(String, String)> {
    inverters
        .iter()
        .map(|i| {
            let value = match i.max_power_w {
                Some(_) => format!("{} (max {})", power(i.power_w), power(i.max_power_w)),
                None => power(i.power_w),
            };
            (i.serial_number.clone(), value)
        })
        .collect()
}

fn battery_rows(b: &BatteryReading) -> Vec<(String, String)> {
    let mut rows = vec![
        ("State of charge".into(), percent(b.state_of_charge_pct)),
        ("Capacity".into(), energy(b.capacity_wh)),
        ("Stored".into(), energy(b.stored_wh)),
        ("Power".into(), power(b.real_power_w)),
        ("Charging".into(), power(b.charging_power_w)),
        ("Discharging".into(), power(b.discharging_power_w)),
    ];
    rows.extend(b.units.iter().map(|u| {
        (
            format!("{} {}", u.kind, u.serial_number),
            format!("{}, {}", percent(u.state_of_charge_pct), power(u.real_power_w)),
        )
    }));
    rows
}

/// Flatten readings into one table row per figure.
pub(super) fn rows(readings: &[TelemetryReading]) -> Vec<ReadingRow> {
    readings
        .iter()
        .flat_map(|reading| {
            let pairs = match &reading.data {
                ReadingData::Energy(e) => energy_rows(e),
                ReadingData::Grid(g) => grid_rows(g),
                ReadingData::Inverters(i) if i.is_empty() => {
                    vec![("-".into(), "no inverters reported".into())]
                }
                ReadingData::Inverters(i) => inverter_rows(i),
                ReadingData::Battery(b) => battery_rows(b),
                ReadingData::NoData => vec![("-".into(), "not available".into())],
            };
            let category = reading.category.to_string();
            pairs.into_iter().map(move |(metric, value)| ReadingRow {
                category: category.clone(),
                metric,
                value,
            })
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    resolved: &ResolvedGateway,
    args: ReadArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut conn = util::connect(resolved, util::TokenReuse::Cached, global.quiet).await?;

    let mut readings = Vec::new();
    for category in util::categories(&args.categories) {
        readings.push(conn.session.poll(category).await?);
    }
    conn.remember_token(resolved);

    let out = output::render_list(global.format(), readings.as_slice(), rows);
    output::print_output(&out, global.quiet);
    Ok(())
}
