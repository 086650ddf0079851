//! `info`: discover, probe, and print the gateway profile.

use envoy_core::GatewayProfile;

use crate::cli::GlobalOpts;
use crate::config::{self, Config, ResolvedGateway};
use crate::error::CliError;
use crate::output;

use super::util;

fn yes_no(value: bool) -> String {
    String::from(if value { "yes" } else { "no" })
}

fn format_profile(profile: &GatewayProfile) -> String {
    let caps = &profile.capabilities;
    let meter = |eid: Option<u64>| eid.map_or_else(|| "-".into(), |e| e.to_string());
    output::detail_block(&[
        ("Serial", profile.serial_number.clone()),
        ("Address", profile.address.clone()),
        ("Model", caps.model.verbose_name().into()),
        ("Firmware", profile.firmware_version.clone().unwrap_or_else(|| "-".into())),
        ("Part number", profile.part_number.clone().unwrap_or_else(|| "-".into())),
        ("Auth", profile.firmware_class.to_string()),
        ("CT metering", yes_no(caps.meters.ct_enabled())),
        ("Production meter", meter(caps.meters.production)),
        ("Net meter", meter(caps.meters.net_consumption)),
        ("Total meter", meter(caps.meters.total_consumption)),
        ("Encharge", yes_no(caps.encharge)),
        ("AC Battery", yes_no(caps.ac_battery)),
    ])
}

/// Persist a discovered address when the profile opted in.
fn remember_address(
    config: &mut Config,
    resolved: &ResolvedGateway,
    profile: &GatewayProfile,
    quiet: bool,
) -> Result<(), CliError> {
    let configured_serial = resolved.gateway.serial.as_deref().map(str::trim);
    let Ok(entry) = config.gateway_mut(Some(&resolved.name)) else {
        return Ok(());
    };
    // Only the same physical gateway may move.
    if configured_serial.is_some_and(|s| s != profile.serial_number) {
        return Ok(());
    }
    if entry.apply_discovered_address(&profile.address) {
        config::save_config(config)?;
        if !quiet {
            eprintln!(
                "✓ Address of '{}' updated to {}",
                resolved.name, profile.address
            );
        }
    } else if entry.address != profile.address && !quiet {
        eprintln!(
            "  Gateway answered at {} but profile '{}' has {} (auto_update_address is off)",
            profile.address, resolved.name, entry.address
        );
    }
    Ok(())
}

pub async fn handle(
    mut config: Config,
    resolved: &ResolvedGateway,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let conn = util::connect(resolved, util::TokenReuse::Cached, global.quiet).await?;
    let profile = conn.session.profile().clone();

    if resolved.from_config && conn.discovery.is_some() {
        remember_address(&mut config, resolved, &profile, global.quiet)?;
    }

    let out = output::render_single(global.format(), &profile, format_profile);
    output::print_output(&out, global.quiet);
    Ok(())
}
