//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use envoy_config::ConfigError;
use envoy_core::{
    AccessToken, CoreError, Credential, Discovery, GatewayProfile, GatewaySession, GatewaySource,
    GatewaySourceConfig, MetricCategory,
};

use crate::cli::Category;
use crate::config::ResolvedGateway;
use crate::error::CliError;

/// A cached token is only resumed if it outlives this margin.
const TOKEN_REUSE_MARGIN: Duration = Duration::from_secs(60 * 60);

/// Whether `connect` may resume a cached token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenReuse {
    Cached,
    Fresh,
}

/// A ready session plus what discovery found, if it ran.
pub struct Connection {
    pub source: Arc<GatewaySource>,
    pub session: GatewaySession,
    pub discovery: Option<Discovery>,
    saved_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Write the session's token to the cache if it was minted since the
    /// last write. Failures are logged, never fatal.
    pub fn remember_token(&mut self, resolved: &ResolvedGateway) {
        if !resolved.gateway.caches_token() || !self.session.credential().can_mint() {
            return;
        }
        let Some(token) = self.session.token() else {
            return;
        };
        if self.saved_at == Some(token.obtained_at()) {
            return;
        }
        match envoy_config::save_cached_token(&resolved.name, token) {
            Ok(()) => self.saved_at = Some(token.obtained_at()),
            Err(e) => warn!(gateway = %resolved.name, error = %e, "could not cache token"),
        }
    }
}

impl From<Category> for MetricCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Production => Self::Production,
            Category::Consumption => Self::Consumption,
            Category::Grid => Self::Grid,
            Category::Inverters => Self::Inverters,
            Category::Battery => Self::Battery,
        }
    }
}

/// Requested categories, or every category when none were given.
pub fn categories(requested: &[Category]) -> Vec<MetricCategory> {
    if requested.is_empty() {
        return MetricCategory::iter().collect();
    }
    let mut out: Vec<MetricCategory> = Vec::with_capacity(requested.len());
    for category in requested.iter().copied().map(MetricCategory::from) {
        if !out.contains(&category) {
            out.push(category);
        }
    }
    out
}

/// Spinner on stderr; hidden in quiet mode or when stderr is not a TTY.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn build_source(resolved: &ResolvedGateway) -> Result<GatewaySource, CliError> {
    let config = GatewaySourceConfig {
        gateway_timeout: resolved.timeout,
        enlighten_timeout: resolved.timeout,
        scheme_override: resolved.gateway.scheme_override()?,
        ..GatewaySourceConfig::default()
    };
    Ok(GatewaySource::new(config)?)
}

/// Resolve the credential, prompting for a missing Enlighten password
/// when attached to a terminal.
pub fn resolve_credential(resolved: &ResolvedGateway) -> Result<Credential, CliError> {
    match envoy_config::resolve_credential(&resolved.gateway, &resolved.name) {
        Err(ConfigError::NoCredentials { gateway })
            if resolved.gateway.use_enlighten && std::io::stdin().is_terminal() =>
        {
            let Some(username) = resolved.gateway.username.clone() else {
                return Err(CliError::NoCredentials { gateway });
            };
            let password = rpassword::prompt_password(format!("Enlighten password for {username}: "))?;
            if password.is_empty() {
                return Err(CliError::NoCredentials { gateway });
            }
            Ok(Credential::Enlighten {
                username,
                password: SecretString::from(password),
            })
        }
        other => Ok(other?),
    }
}

/// A cached token for `serial` that is still worth resuming.
fn cached_token(resolved: &ResolvedGateway, serial: &str) -> Option<AccessToken> {
    match envoy_config::load_cached_token(&resolved.name) {
        Ok(Some(token)) if token.serial_number() == serial && token.valid_for(TOKEN_REUSE_MARGIN) => {
            Some(token)
        }
        Ok(Some(token)) => {
            debug!(
                gateway = %resolved.name,
                expires_at = ?token.expires_at(),
                "cached token expired or for another gateway, discarding"
            );
            if let Err(e) = envoy_config::clear_cached_token(&resolved.name) {
                warn!(error = %e, "could not remove stale token cache");
            }
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(gateway = %resolved.name, error = %e, "ignoring unreadable token cache");
            None
        }
    }
}

/// Session for token firmware: resume a cached token when allowed,
/// otherwise authenticate with the configured credential. The flag tells
/// whether the token came from the cache.
async fn token_session(
    source: Arc<GatewaySource>,
    profile: GatewayProfile,
    resolved: &ResolvedGateway,
    reuse: TokenReuse,
    quiet: bool,
) -> Result<(GatewaySession, bool), CliError> {
    let cacheable = reuse == TokenReuse::Cached
        && resolved.gateway.caches_token()
        && envoy_config::resolve_token(&resolved.gateway).is_none();

    if let Some(token) = cacheable
        .then(|| cached_token(resolved, &profile.serial_number))
        .flatten()
    {
        // No prompt here: a password is only needed if the gateway refuses
        // the cached token.
        let credential = envoy_config::resolve_credential(&resolved.gateway, &resolved.name)
            .unwrap_or(Credential::None);
        let mut session = GatewaySession::new(source.clone(), profile.clone(), credential);
        if session.resume(token) {
            debug!(gateway = %resolved.name, "resumed cached token");
            return Ok((session, true));
        }
    }

    let credential = resolve_credential(resolved)?;
    let mut session = GatewaySession::new(source, profile, credential);
    let pb = spinner("Authenticating", quiet);
    let authenticated = session.authenticate().await;
    pb.finish_and_clear();
    authenticated?;
    Ok((session, false))
}

/// Build the profile (from config or discovery), authenticate, and probe
/// hardware capabilities.
pub async fn connect(
    resolved: &ResolvedGateway,
    reuse: TokenReuse,
    quiet: bool,
) -> Result<Connection, CliError> {
    let source = Arc::new(build_source(resolved)?);
    let address = resolved.gateway.address.trim();

    let pb = spinner(&format!("Contacting gateway at {address}"), quiet);
    let (profile, discovery) = match resolved.gateway.to_profile()? {
        Some(profile) => {
            debug!(gateway = %resolved.name, "using pinned profile, skipping discovery");
            (profile, None)
        }
        None => match source.discover(address).await {
            Ok(discovery) => {
                let profile = resolved
                    .gateway
                    .apply_overrides(discovery.clone().into_profile(address))?;
                (profile, Some(discovery))
            }
            Err(err) => {
                pb.finish_and_clear();
                return Err(err.into());
            }
        },
    };
    pb.finish_and_clear();

    let (mut session, mut resumed) = if profile.requires_token() {
        token_session(source.clone(), profile, resolved, reuse, quiet).await?
    } else {
        let credential = envoy_config::resolve_local_credential(&resolved.gateway);
        let mut session = GatewaySession::new(source.clone(), profile, credential);
        session.authenticate().await?;
        (session, false)
    };

    let caps = match source.probe(session.profile(), session.token()).await {
        Err(CoreError::TokenExpired) if resumed && session.credential().can_mint() => {
            debug!(gateway = %resolved.name, "cached token refused, minting a fresh one");
            resumed = false;
            session.authenticate().await?;
            source.probe(session.profile(), session.token()).await?
        }
        other => other?,
    };
    let profile: GatewayProfile = session.profile().clone().with_capabilities(caps);
    session.set_profile(profile);

    let saved_at = if resumed {
        session.token().map(AccessToken::obtained_at)
    } else {
        None
    };
    let mut conn = Connection {
        source,
        session,
        discovery,
        saved_at,
    };
    conn.remember_token(resolved);
    Ok(conn)
}
