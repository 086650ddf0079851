//! `login`: obtain an access token and report on it.

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::ResolvedGateway;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct LoginReport {
    serial_number: String,
    token_required: bool,
    obtained_at: String,
    expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

fn format_report(report: &LoginReport) -> String {
    let mut pairs = vec![
        ("Serial", report.serial_number.clone()),
        (
            "Token",
            if report.token_required {
                "required".into()
            } else {
                "not required (legacy firmware)".into()
            },
        ),
        ("Obtained", report.obtained_at.clone()),
        ("Expires", report.expires_at.clone().unwrap_or_else(|| "-".into())),
    ];
    if let Some(accepted) = report.accepted {
        pairs.push(("Accepted", if accepted { "yes" } else { "no" }.to_owned()));
    }
    if let Some(ref token) = report.token {
        pairs.push(("Raw token", token.clone()));
    }
    output::detail_block(&pairs)
}

pub async fn handle(
    resolved: &ResolvedGateway,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let conn = util::connect(resolved, util::TokenReuse::Fresh, global.quiet).await?;
    let profile = conn.session.profile();
    let Some(token) = conn.session.token() else {
        return Err(CliError::Internal("session has no token after login".into()));
    };

    let token_required = profile.requires_token();
    let accepted = if args.verify && token_required {
        let pb = util::spinner("Verifying token with gateway", global.quiet);
        let accepted = conn.source.check_token(profile, token).await;
        pb.finish_and_clear();
        Some(accepted?)
    } else {
        None
    };

    let report = LoginReport {
        serial_number: profile.serial_number.clone(),
        token_required,
        obtained_at: token.obtained_at().to_rfc3339(),
        expires_at: token.expires_at().map(|t| t.to_rfc3339()),
        accepted,
        token: (args.show_token && token_required)
            .then(|| token.secret().expose_secret().to_owned()),
    };

    let out = output::render_single(global.format(), &report, format_report);
    output::print_output(&out, global.quiet);

    if accepted == Some(false) {
        return Err(CliError::TokenRejected);
    }
    Ok(())
}
