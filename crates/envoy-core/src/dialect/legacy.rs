// Envoy-R below firmware 3.9 publishes production only as an HTML table:
//
//   <tr><td>Currently</td>    <td>  1.25 kW</td></tr>
//   <tr><td>Today</td>        <td> 12.3 kWh</td></tr>
//   <tr><td>Past Week</td>    <td> 81.0 kWh</td></tr>
//   <tr><td>Since Installation</td> <td> 4.5 MWh</td></tr>

use std::sync::LazyLock;

use envoy_api::Endpoint;
use regex::Regex;

use crate::dialect::{Payloads, parse_error};
use crate::error::CoreError;
use crate::reading::EnergyReading;

static CURRENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<td>Currentl.*</td>\s+<td>\s*(\d+(?:\.\d+)?)\s*(W|kW|MW)</td>")
        .expect("static regex")
});

static TODAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<td>Today</td>\s+<td>\s*(\d+(?:\.\d+)?)\s*(Wh|kWh|MWh)</td>")
        .expect("static regex")
});

static PAST_WEEK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<td>Past Week</td>\s+<td>\s*(\d+(?:\.\d+)?)\s*(Wh|kWh|MWh)</td>")
        .expect("static regex")
});

static LIFETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<td>Since Installation</td>\s+<td>\s*(\d+(?:\.\d+)?)\s*(Wh|kWh|MWh)</td>")
        .expect("static regex")
});

/// Production from the HTML page. A missing page yields an empty reading;
/// a page with none of the four rows is a parse error.
pub fn production(payloads: &Payloads) -> Result<EnergyReading, CoreError> {
    let Some(page) = payloads.text(Endpoint::ProductionPage) else {
        return Ok(EnergyReading::default());
    };

    let reading = EnergyReading {
        power_w: scaled(&CURRENT, page),
        today_wh: scaled(&TODAY, page),
        last_seven_days_wh: scaled(&PAST_WEEK, page),
        lifetime_wh: scaled(&LIFETIME, page),
    };

    if reading == EnergyReading::default() {
        return Err(parse_error(
            Endpoint::ProductionPage,
            &"no production values found in page",
            page,
        ));
    }
    Ok(reading)
}

/// First match of `re` in `page`, scaled to W or Wh.
fn scaled(re: &Regex, page: &str) -> Option<f64> {
    let caps = re.captures(page)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let factor = match caps.get(2)?.as_str() {
        "kW" | "kWh" => 1_000.0,
        "MW" | "MWh" => 1_000_000.0,
        _ => 1.0,
    };
    Some(value * factor)
}
