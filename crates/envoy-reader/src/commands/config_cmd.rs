//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_gateway {
        let _ = writeln!(out, "default_gateway = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, g) in &cfg.gateways {
        let _ = writeln!(out);
        let _ = writeln!(out, "[gateways.{name}]");
        let _ = writeln!(out, "address = \"{}\"", g.address);
        if let Some(ref serial) = g.serial {
            let _ = writeln!(out, "serial = \"{serial}\"");
        }
        let _ = writeln!(out, "use_enlighten = {}", g.use_enlighten);
        if let Some(ref u) = g.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if let Some(ref env) = g.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if g.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if g.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = g.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(cache) = g.cache_token {
            let _ = writeln!(out, "cache_token = {cache}");
        }
        if let Some(ref user) = g.local_username {
            let _ = writeln!(out, "local_username = \"{user}\"");
        }
        if g.local_password.is_some() {
            let _ = writeln!(out, "local_password = \"****\"");
        }
        let _ = writeln!(out, "auto_update_address = {}", g.auto_update_address);
        if let Some(ref firmware) = g.firmware {
            let _ = writeln!(out, "firmware = \"{firmware}\"");
        }
        if let Some(ref model) = g.model {
            let _ = writeln!(out, "model = \"{model}\"");
        }
        if let Some(ref scheme) = g.scheme {
            let _ = writeln!(out, "scheme = \"{scheme}\"");
        }
        if let Some(timeout) = g.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// A copy of `cfg` safe to print in structured formats.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for g in cfg.gateways.values_mut() {
        if g.password.is_some() {
            g.password = Some("****".into());
        }
        if g.token.is_some() {
            g.token = Some("****".into());
        }
        if g.local_password.is_some() {
            g.local_password = Some("****".into());
        }
    }
    cfg
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(global.format(), &cfg, format_config_redacted);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword { gateway } => {
            let cfg = config::load_config_or_default();
            let name = gateway.unwrap_or_else(|| config::active_gateway_name(global, &cfg));

            if !cfg.gateways.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_gateways(&cfg),
                });
            }

            let secret = rpassword::prompt_password("Enlighten password: ")?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            envoy_config::store_password(&name, &secret)?;

            if !global.quiet {
                eprintln!("✓ Password stored in system keyring for gateway '{name}'");
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.gateways.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_gateways(&cfg),
                });
            }

            cfg.default_gateway = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default gateway set to '{name}'");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    #[test]
    fn secrets_are_masked() {
        let mut cfg = Config::default();
        cfg.gateways.insert(
            "home".into(),
            GatewayConfig {
                password: Some("hunter2".into()),
                token: Some("eyJ...".into()),
                local_password: Some("654321".into()),
                ..GatewayConfig::new("192.168.1.50")
            },
        );

        let text = format_config_redacted(&redacted(&cfg));
        assert!(text.contains("[gateways.home]"));
        assert!(text.contains("password = \"****\""));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("eyJ"));
        assert!(text.contains("local_password = \"****\""));
        assert!(!text.contains("654321"));
    }
}
