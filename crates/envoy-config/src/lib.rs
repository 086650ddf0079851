//! Configuration for envoy-reader.
//!
//! TOML gateway profiles, credential resolution (env + keyring +
//! plaintext), translation to `envoy_core` profiles and credentials, and
//! the on-disk cache of minted tokens.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use envoy_core::{
    AccessToken, CapabilitySet, Credential, DEFAULT_LOCAL_USER, FirmwareClass, GatewayModel,
    GatewayProfile, Scheme,
};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "envoy-reader";

/// Environment variable consulted after a gateway's `password_env`.
pub const PASSWORD_ENV: &str = "ENVOY_PASSWORD";

/// Environment variable consulted when a gateway has no `username`.
pub const USERNAME_ENV: &str = "ENVOY_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for gateway '{gateway}'")]
    NoCredentials { gateway: String },

    #[error("unknown gateway '{name}'")]
    UnknownGateway { name: String },

    #[error("no gateway selected and no default_gateway configured")]
    NoGateway,

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Gateway used when `--profile` is not given.
    pub default_gateway: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateways.
    #[serde(default)]
    pub gateways: BTreeMap<String, GatewayConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_gateway: Some("default".into()),
            defaults: Defaults::default(),
            gateways: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}

/// One configured gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Hostname or IP literal.
    pub address: String,

    /// Gateway serial number. Discovered from `/info` when absent.
    pub serial: Option<String>,

    /// Mint tokens through Enlighten with `username` and a password.
    #[serde(default)]
    pub use_enlighten: bool,

    /// Enlighten account email.
    pub username: Option<String>,

    /// Environment variable holding the Enlighten password.
    pub password_env: Option<String>,

    /// Enlighten password (plaintext, prefer keyring).
    pub password: Option<String>,

    /// Pre-minted gateway token (plaintext, prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable holding a pre-minted token.
    pub token_env: Option<String>,

    /// Keep minted tokens on disk and reuse them until they near expiry.
    /// Defaults to on.
    pub cache_token: Option<bool>,

    /// Local user for legacy firmware's Digest-protected pages ("envoy" or
    /// "installer"). Defaults to "envoy".
    pub local_username: Option<String>,

    /// Local password. The "envoy" user's default is derived from the serial.
    pub local_password: Option<String>,

    /// Accept a discovered address in place of `address`.
    #[serde(default)]
    pub auto_update_address: bool,

    /// Firmware class override: "legacy" or "token".
    pub firmware: Option<String>,

    /// Model override: "legacy", "r", "standard", "metered".
    pub model: Option<String>,

    /// Scheme override: "http" or "https" (reverse proxies).
    pub scheme: Option<String>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl GatewayConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Parsed `firmware` override.
    pub fn firmware_class(&self) -> Result<Option<FirmwareClass>, ConfigError> {
        parse_override("firmware", self.firmware.as_deref())
    }

    /// Parsed `model` override.
    pub fn gateway_model(&self) -> Result<Option<GatewayModel>, ConfigError> {
        parse_override("model", self.model.as_deref())
    }

    /// Parsed `scheme` override.
    pub fn scheme_override(&self) -> Result<Option<Scheme>, ConfigError> {
        match self.scheme.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) if s.eq_ignore_ascii_case("http") => Ok(Some(Scheme::Http)),
            Some(s) if s.eq_ignore_ascii_case("https") => Ok(Some(Scheme::Https)),
            Some(s) => Err(ConfigError::Validation {
                field: "scheme".into(),
                reason: format!("unrecognized value '{s}'"),
            }),
        }
    }

    pub fn caches_token(&self) -> bool {
        self.cache_token.unwrap_or(true)
    }

    /// A profile built from configuration alone, when serial, firmware and
    /// model are all pinned. `None` means discovery is needed.
    pub fn to_profile(&self) -> Result<Option<GatewayProfile>, ConfigError> {
        let (Some(serial), Some(class), Some(model)) =
            (self.serial.as_deref(), self.firmware_class()?, self.gateway_model()?)
        else {
            return Ok(None);
        };
        Ok(Some(GatewayProfile::new(
            serial,
            self.address.clone(),
            class,
            CapabilitySet::new(model),
        )))
    }

    /// Apply configured overrides to a discovered profile.
    pub fn apply_overrides(&self, mut profile: GatewayProfile) -> Result<GatewayProfile, ConfigError> {
        if let Some(serial) = self.serial.as_deref().filter(|s| !s.trim().is_empty()) {
            profile.serial_number = serial.trim().to_owned();
        }
        if let Some(class) = self.firmware_class()? {
            profile.firmware_class = class;
        }
        if let Some(model) = self.gateway_model()? {
            if model != profile.capabilities.model {
                profile.capabilities = CapabilitySet::new(model);
            }
        }
        Ok(profile)
    }

    /// Take `discovered` as the new address when `auto_update_address` is
    /// set. Returns whether the address changed.
    pub fn apply_discovered_address(&mut self, discovered: &str) -> bool {
        let discovered = discovered.trim();
        if discovered.is_empty() || discovered == self.address {
            return false;
        }
        if !self.auto_update_address {
            debug!(
                configured = %self.address,
                discovered,
                "address change ignored, auto_update_address is off"
            );
            return false;
        }
        info!(from = %self.address, to = discovered, "gateway address updated");
        self.address = discovered.to_owned();
        true
    }
}

fn parse_override<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>, ConfigError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Validation {
                field: field.into(),
                reason: format!("unrecognized value '{s}'"),
            })
        })
        .transpose()
}

impl Config {
    /// Resolve a gateway by name, falling back to `default_gateway`.
    pub fn gateway(&self, name: Option<&str>) -> Result<(String, &GatewayConfig), ConfigError> {
        let name = self.gateway_name(name)?;
        let gateway = self
            .gateways
            .get(&name)
            .ok_or_else(|| ConfigError::UnknownGateway { name: name.clone() })?;
        Ok((name, gateway))
    }

    pub fn gateway_mut(&mut self, name: Option<&str>) -> Result<&mut GatewayConfig, ConfigError> {
        let name = self.gateway_name(name)?;
        self.gateways
            .get_mut(&name)
            .ok_or(ConfigError::UnknownGateway { name })
    }

    fn gateway_name(&self, name: Option<&str>) -> Result<String, ConfigError> {
        name.or(self.default_gateway.as_deref())
            .map(str::to_owned)
            .ok_or(ConfigError::NoGateway)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "envoy-reader").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("envoy-reader");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `ENVOY_*` environment variables. Nested keys use a
/// double underscore: `ENVOY_DEFAULTS__TIMEOUT=20`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ENVOY_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), gateways = config.gateways.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(gateway_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{gateway_name}/password"))
}

/// Store an Enlighten password in the system keyring.
pub fn store_password(gateway_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(gateway_name)?.set_password(password)?;
    Ok(())
}

/// Resolve the Enlighten password: `password_env`, then `ENVOY_PASSWORD`,
/// then the keyring, then plaintext.
pub fn resolve_password(
    gateway: &GatewayConfig,
    gateway_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Gateway's password_env
    if let Some(ref env_name) = gateway.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring_entry(gateway_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = gateway.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        gateway: gateway_name.into(),
    })
}

/// A pre-minted token from `token_env` or plaintext `token`.
pub fn resolve_token(gateway: &GatewayConfig) -> Option<SecretString> {
    gateway
        .token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .or_else(|| gateway.token.clone())
        .filter(|t| !t.trim().is_empty())
        .map(SecretString::from)
}

/// The credential a gateway authenticates with.
///
/// A configured token wins over Enlighten. Without either the gateway only
/// works on legacy firmware.
pub fn resolve_credential(
    gateway: &GatewayConfig,
    gateway_name: &str,
) -> Result<Credential, ConfigError> {
    if let Some(token) = resolve_token(gateway) {
        return Ok(Credential::StaticToken(token));
    }

    if !gateway.use_enlighten {
        return Ok(Credential::None);
    }

    let username = gateway
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            gateway: gateway_name.into(),
        })?;
    let password = resolve_password(gateway, gateway_name)?;
    Ok(Credential::Enlighten { username, password })
}

/// The local login for legacy firmware. `None` when nothing is
/// configured, leaving the stock `envoy` login in effect.
pub fn resolve_local_credential(gateway: &GatewayConfig) -> Credential {
    let username = gateway
        .local_username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let password = gateway
        .local_password
        .clone()
        .filter(|p| !p.is_empty())
        .map(SecretString::from);

    if username.is_none() && password.is_none() {
        return Credential::None;
    }
    Credential::Local {
        username: username.unwrap_or(DEFAULT_LOCAL_USER).to_owned(),
        password,
    }
}

// ── Token cache ─────────────────────────────────────────────────────

/// A minted token as stored between runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CachedToken {
    pub serial_number: String,
    pub token: String,
}

/// Where a gateway's minted token is kept.
pub fn token_cache_path(gateway_name: &str) -> PathBuf {
    let file = format!("{}.toml", cache_file_stem(gateway_name));
    ProjectDirs::from("", "", "envoy-reader").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".cache");
            p.push("envoy-reader");
            p.push("tokens");
            p.push(&file);
            p
        },
        |dirs| dirs.cache_dir().join("tokens").join(&file),
    )
}

fn cache_file_stem(gateway_name: &str) -> String {
    gateway_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// The cached token for `gateway_name`, if one was stored.
pub fn load_cached_token(gateway_name: &str) -> Result<Option<AccessToken>, ConfigError> {
    load_cached_token_from(&token_cache_path(gateway_name))
}

pub fn load_cached_token_from(path: &Path) -> Result<Option<AccessToken>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let cached: CachedToken = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), serial = %cached.serial_number, "loaded cached token");
    Ok(Some(AccessToken::new(
        SecretString::from(cached.token),
        cached.serial_number,
    )))
}

/// Store a minted token for `gateway_name`. Local tokens are not stored.
pub fn save_cached_token(gateway_name: &str, token: &AccessToken) -> Result<(), ConfigError> {
    save_cached_token_to(token, &token_cache_path(gateway_name))
}

pub fn save_cached_token_to(token: &AccessToken, path: &Path) -> Result<(), ConfigError> {
    let Some(secret) = token.bearer() else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let cached = CachedToken {
        serial_number: token.serial_number().to_owned(),
        token: secret.expose_secret().to_owned(),
    };
    std::fs::write(path, toml::to_string(&cached)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    debug!(path = %path.display(), "token cached");
    Ok(())
}

/// Forget the cached token for `gateway_name`.
pub fn clear_cached_token(gateway_name: &str) -> Result<(), ConfigError> {
    match std::fs::remove_file(token_cache_path(gateway_name)) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_gateway = "home"

[defaults]
output = "json"
timeout = 15

[gateways.home]
address = "192.168.1.50"
serial = "122201234567"
use_enlighten = true
username = "me@example.com"
password_env = "HOME_ENLIGHTEN_PASSWORD"
firmware = "token"
model = "metered"

[gateways.cabin]
address = "envoy.cabin.lan"
auto_update_address = true
"#;

    // Loading reads ENVOY_* variables, so every load runs inside a Jail
    // to serialize with the tests that set them.

    #[test]
    fn loads_gateways_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            let config = load_config_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(config.default_gateway.as_deref(), Some("home"));
            assert_eq!(config.defaults.output, "json");
            assert_eq!(config.defaults.timeout, 15);

            let (name, home) = config.gateway(None).unwrap();
            assert_eq!(name, "home");
            assert_eq!(home.address, "192.168.1.50");
            assert!(home.use_enlighten);

            let (_, cabin) = config.gateway(Some("cabin")).unwrap();
            assert!(cabin.auto_update_address);
            assert_eq!(cabin.serial, None);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let config = load_config_from(&jail.directory().join("absent.toml")).unwrap();
            assert_eq!(config.defaults, Defaults::default());
            assert!(config.gateways.is_empty());
            Ok(())
        });
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config
            .gateways
            .insert("default".into(), GatewayConfig::new("10.0.0.8"));
        save_config_to(&config, &path).unwrap();

        Jail::expect_with(|_| {
            let loaded = load_config_from(&path).unwrap();
            assert_eq!(loaded.gateways["default"].address, "10.0.0.8");
            Ok(())
        });
    }

    #[test]
    fn unknown_gateway() {
        let config = Config::default();
        assert!(matches!(
            config.gateway(Some("garage")),
            Err(ConfigError::UnknownGateway { .. })
        ));

        let config = Config {
            default_gateway: None,
            ..Config::default()
        };
        assert!(matches!(config.gateway(None), Err(ConfigError::NoGateway)));
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("ENVOY_DEFAULTS__TIMEOUT", "42");
            jail.set_env("ENVOY_DEFAULT_GATEWAY", "cabin");

            let config = load_config_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(config.defaults.timeout, 42);
            assert_eq!(config.default_gateway.as_deref(), Some("cabin"));
            Ok(())
        });
    }

    #[test]
    fn pinned_profile_skips_discovery() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        let profile = config.gateways["home"].to_profile().unwrap().unwrap();
        assert_eq!(profile.serial_number, "122201234567");
        assert_eq!(profile.address, "192.168.1.50");
        assert_eq!(profile.firmware_class, FirmwareClass::TokenAuth);
        assert_eq!(profile.capabilities.model, GatewayModel::EnvoySMetered);

        assert_eq!(config.gateways["cabin"].to_profile().unwrap(), None);
    }

    #[test]
    fn bad_override_is_validation_error() {
        let gateway = GatewayConfig {
            firmware: Some("quantum".into()),
            ..GatewayConfig::new("10.0.0.8")
        };
        assert!(matches!(
            gateway.firmware_class(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn overrides_apply_to_discovered_profile() {
        let gateway = GatewayConfig {
            serial: Some("999".into()),
            model: Some("standard".into()),
            ..GatewayConfig::new("10.0.0.8")
        };
        let discovered = GatewayProfile::new(
            "122201234567",
            "10.0.0.8",
            FirmwareClass::TokenAuth,
            CapabilitySet::new(GatewayModel::EnvoySMetered),
        );
        let profile = gateway.apply_overrides(discovered).unwrap();
        assert_eq!(profile.serial_number, "999");
        assert_eq!(profile.firmware_class, FirmwareClass::TokenAuth);
        assert_eq!(profile.capabilities.model, GatewayModel::EnvoySStandard);
    }

    #[test]
    fn discovered_address_respects_toggle() {
        let mut pinned = GatewayConfig::new("192.168.1.50");
        assert!(!pinned.apply_discovered_address("192.168.1.77"));
        assert_eq!(pinned.address, "192.168.1.50");

        let mut roaming = GatewayConfig {
            auto_update_address: true,
            ..GatewayConfig::new("192.168.1.50")
        };
        assert!(!roaming.apply_discovered_address("192.168.1.50"));
        assert!(roaming.apply_discovered_address("192.168.1.77"));
        assert_eq!(roaming.address, "192.168.1.77");
    }

    #[test]
    fn password_from_gateway_env() {
        Jail::expect_with(|jail| {
            jail.set_env("HOME_ENLIGHTEN_PASSWORD", "from-env");
            let gateway = GatewayConfig {
                use_enlighten: true,
                username: Some("me@example.com".into()),
                password_env: Some("HOME_ENLIGHTEN_PASSWORD".into()),
                password: Some("plaintext".into()),
                ..GatewayConfig::new("10.0.0.8")
            };
            match resolve_credential(&gateway, "home").unwrap() {
                Credential::Enlighten { username, password } => {
                    assert_eq!(username, "me@example.com");
                    assert_eq!(password.expose_secret(), "from-env");
                }
                other => panic!("expected Enlighten credential, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn global_password_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PASSWORD_ENV, "global");
            let gateway = GatewayConfig {
                password_env: Some("ENVOY_TEST_UNSET_PASSWORD".into()),
                ..GatewayConfig::new("10.0.0.8")
            };
            let password = resolve_password(&gateway, "home").unwrap();
            assert_eq!(password.expose_secret(), "global");
            Ok(())
        });
    }

    #[test]
    fn token_wins_over_enlighten() {
        Jail::expect_with(|jail| {
            jail.set_env("CABIN_TOKEN", "eyJ.token");
            let gateway = GatewayConfig {
                use_enlighten: true,
                token_env: Some("CABIN_TOKEN".into()),
                ..GatewayConfig::new("10.0.0.8")
            };
            match resolve_credential(&gateway, "cabin").unwrap() {
                Credential::StaticToken(token) => assert_eq!(token.expose_secret(), "eyJ.token"),
                other => panic!("expected static token, got {other:?}"),
            }
            Ok(())
        });
    }

    // Header {"alg":"HS256","typ":"JWT"}, claims {"aud":"122201234567","exp":4102444800}.
    const FAR_FUTURE_JWT: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
        eyJhdWQiOiIxMjIyMDEyMzQ1NjciLCJleHAiOjQxMDI0NDQ4MDB9.c2lnbmF0dXJl";

    #[test]
    fn cached_token_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens").join("home.toml");
        let token = AccessToken::new(SecretString::from(FAR_FUTURE_JWT.to_owned()), "122201234567");

        save_cached_token_to(&token, &path).unwrap();
        let loaded = load_cached_token_from(&path).unwrap().unwrap();
        assert_eq!(loaded.serial_number(), "122201234567");
        assert_eq!(loaded.secret().expose_secret(), FAR_FUTURE_JWT);
        assert_eq!(loaded.expires_at(), token.expires_at());
        assert!(loaded.expires_at().is_some());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn local_tokens_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.toml");
        save_cached_token_to(&AccessToken::local(), &path).unwrap();
        assert!(!path.exists());
        assert!(load_cached_token_from(&path).unwrap().is_none());
    }

    #[test]
    fn corrupt_cache_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home.toml");
        std::fs::write(&path, "serial_number = ").unwrap();
        assert!(matches!(
            load_cached_token_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn cache_file_names_are_sanitized() {
        let path = token_cache_path("../home lan");
        assert_eq!(path.file_name().unwrap(), "___home_lan.toml");
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "tokens");
    }

    #[test]
    fn scheme_override_parses() {
        let mut gateway = GatewayConfig::new("10.0.0.8");
        assert_eq!(gateway.scheme_override().unwrap(), None);
        gateway.scheme = Some("HTTP".into());
        assert_eq!(gateway.scheme_override().unwrap(), Some(Scheme::Http));
        gateway.scheme = Some("gopher".into());
        assert!(matches!(
            gateway.scheme_override(),
            Err(ConfigError::Validation { .. })
        ));
        assert!(gateway.caches_token());
    }

    #[test]
    fn local_login_from_config() {
        let gateway = GatewayConfig {
            local_username: Some("installer".into()),
            local_password: Some("s3cret".into()),
            ..GatewayConfig::new("10.0.0.8")
        };
        match resolve_local_credential(&gateway) {
            Credential::Local { username, password } => {
                assert_eq!(username, "installer");
                assert_eq!(password.unwrap().expose_secret(), "s3cret");
            }
            other => panic!("expected local credential, got {other:?}"),
        }

        let password_only = GatewayConfig {
            local_password: Some("654321".into()),
            ..GatewayConfig::new("10.0.0.8")
        };
        match resolve_local_credential(&password_only) {
            Credential::Local { username, .. } => assert_eq!(username, "envoy"),
            other => panic!("expected local credential, got {other:?}"),
        }

        assert!(matches!(
            resolve_local_credential(&GatewayConfig::new("10.0.0.8")),
            Credential::None
        ));
    }

    #[test]
    fn no_enlighten_means_no_credential() {
        let gateway = GatewayConfig::new("10.0.0.8");
        assert!(matches!(
            resolve_credential(&gateway, "home").unwrap(),
            Credential::None
        ));
    }
}
