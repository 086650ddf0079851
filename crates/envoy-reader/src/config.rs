//! CLI configuration: thin wrapper around `envoy_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--address, --serial, --username, --timeout).

use std::time::Duration;

use clap::ValueEnum;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use envoy_config::{Config, GatewayConfig, config_path, load_config_or_default, save_config};

/// A gateway profile with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct ResolvedGateway {
    pub name: String,
    pub gateway: GatewayConfig,
    /// The profile exists in the config file (as opposed to flags only).
    pub from_config: bool,
    pub timeout: Duration,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_gateway_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_gateway.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names, for error help text.
pub fn available_gateways(config: &Config) -> String {
    if config.gateways.is_empty() {
        "(none)".into()
    } else {
        config.gateways.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Fill `--output` from `defaults.output` when the flag was not given.
pub fn apply_defaults(global: &mut GlobalOpts, config: &Config) {
    if global.output.is_none() {
        global.output = OutputFormat::from_str(&config.defaults.output, true).ok();
    }
}

/// Pick the active gateway and apply flag overrides.
///
/// Without a matching profile, `--address` alone is enough for an ad-hoc
/// gateway.
pub fn resolve_gateway(global: &GlobalOpts, config: &Config) -> Result<ResolvedGateway, CliError> {
    let name = active_gateway_name(global, config);

    let (mut gateway, from_config) = match config.gateways.get(&name) {
        Some(gateway) => (gateway.clone(), true),
        None if global.address.is_some() => (GatewayConfig::default(), false),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_gateways(config),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // Flag > env > profile
    if let Some(ref address) = global.address {
        gateway.address.clone_from(address);
    }
    if let Some(ref serial) = global.serial {
        gateway.serial = Some(serial.clone());
    }
    if let Some(ref username) = global.username {
        gateway.username = Some(username.clone());
        gateway.use_enlighten = true;
    }

    if gateway.address.trim().is_empty() {
        return Err(CliError::Validation {
            field: "address".into(),
            reason: format!("gateway profile '{name}' has no address"),
        });
    }

    let timeout = global
        .timeout
        .or(gateway.timeout)
        .unwrap_or(config.defaults.timeout);

    Ok(ResolvedGateway {
        name,
        gateway,
        from_config,
        timeout: Duration::from_secs(timeout),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["envoy-reader"];
        argv.extend_from_slice(args);
        argv.push("info");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config() -> Config {
        let mut config = Config {
            default_gateway: Some("home".into()),
            ..Config::default()
        };
        config.gateways.insert(
            "home".into(),
            GatewayConfig {
                serial: Some("122201234567".into()),
                timeout: Some(20),
                ..GatewayConfig::new("192.168.1.50")
            },
        );
        config
    }

    #[test]
    fn flags_override_profile() {
        let resolved = resolve_gateway(
            &global(&["--address", "10.0.0.9", "--username", "me@example.com"]),
            &config(),
        )
        .unwrap();
        assert_eq!(resolved.name, "home");
        assert!(resolved.from_config);
        assert_eq!(resolved.gateway.address, "10.0.0.9");
        assert!(resolved.gateway.use_enlighten);
        assert_eq!(resolved.timeout, Duration::from_secs(20));
    }

    #[test]
    fn address_alone_is_enough() {
        let resolved = resolve_gateway(&global(&["--address", "envoy.local"]), &Config::default())
            .unwrap();
        assert!(!resolved.from_config);
        assert_eq!(resolved.gateway.address, "envoy.local");
        assert_eq!(resolved.timeout, Duration::from_secs(10));
    }

    #[test]
    fn unknown_profile() {
        let err = resolve_gateway(&global(&["--profile", "cabin"]), &config()).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { .. }));

        let err = resolve_gateway(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn output_default_from_config() {
        let mut opts = global(&[]);
        let mut config = config();
        config.defaults.output = "yaml".into();
        apply_defaults(&mut opts, &config);
        assert_eq!(opts.output, Some(OutputFormat::Yaml));
    }
}
