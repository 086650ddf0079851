//! `watch`: poll on an interval until Ctrl-C.
//!
//! Transient failures (network, Enlighten outage, a token still rejected
//! after one re-authentication) back off exponentially from the poll
//! interval up to five minutes. Anything else ends the loop.

use std::time::Duration;

use tracing::{info, warn};

use envoy_core::{CoreError, MetricCategory, TelemetryReading};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::ResolvedGateway;
use crate::error::CliError;
use crate::output;

use super::{read, util};

const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Exponential delay, doubled per consecutive failure and capped.
#[derive(Debug)]
struct Backoff {
    base: Duration,
    failures: u32,
}

impl Backoff {
    fn new(base: Duration) -> Self {
        Self { base, failures: 0 }
    }

    fn reset(&mut self) {
        self.failures = 0;
    }

    /// Record a failure and return how long to wait.
    fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let factor = 2u32.saturating_pow(self.failures);
        self.base.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

fn keeps_watching(err: &CoreError) -> bool {
    err.is_retryable() || err.requires_reauth() || matches!(err, CoreError::Parse { .. })
}

async fn cycle(
    session: &mut envoy_core::GatewaySession,
    categories: &[MetricCategory],
) -> Result<Vec<TelemetryReading>, CoreError> {
    let mut readings = Vec::with_capacity(categories.len());
    for &category in categories {
        readings.push(session.poll(category).await?);
    }
    Ok(readings)
}

fn render(readings: &[TelemetryReading], global: &GlobalOpts) -> String {
    match global.format() {
        // One line per cycle for streaming consumers.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(readings),
        format => output::render_list(format, readings, read::rows),
    }
}

pub async fn handle(
    resolved: &ResolvedGateway,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let interval: Duration = args.interval.into();
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let mut conn = util::connect(resolved, util::TokenReuse::Cached, global.quiet).await?;
    let categories = util::categories(&args.categories);
    let mut backoff = Backoff::new(interval);
    let mut cycles = 0u64;

    info!(
        gateway = %resolved.name,
        interval = %humantime::format_duration(interval),
        "watching"
    );

    loop {
        let delay = match cycle(&mut conn.session, &categories).await {
            Ok(readings) => {
                backoff.reset();
                output::print_output(&render(&readings, global), global.quiet);
                interval
            }
            Err(err) if keeps_watching(&err) => {
                let delay = backoff.fail();
                warn!(
                    error = %err,
                    retry_in = %humantime::format_duration(delay),
                    "poll failed"
                );
                delay
            }
            Err(err) => return Err(err.into()),
        };
        conn.remember_token(resolved);

        cycles += 1;
        if args.count.is_some_and(|n| cycles >= n) {
            return Ok(());
        }

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }
    }
}
