// Local gateway login (HTTP Digest)
//
// Firmware older than 7 guards some pages, `/api/v1/production/inverters`
// among them, with HTTP Digest auth instead of a bearer token. The stock
// user is `envoy` with the last six characters of the serial number as
// its password.

use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Default local user on legacy firmware.
pub const DEFAULT_LOCAL_USER: &str = "envoy";

/// Username and password for a gateway's Digest-protected pages.
#[derive(Debug, Clone)]
pub struct DigestCredential {
    username: String,
    password: SecretString,
}

impl DigestCredential {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// The `envoy` user with the password derived from `serial_number`.
    pub fn envoy_default(serial_number: &str) -> Self {
        Self::new(
            DEFAULT_LOCAL_USER,
            SecretString::from(default_password(serial_number).to_owned()),
        )
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Answer a `WWW-Authenticate: Digest ...` challenge for a GET of `uri`
    /// (path and query). Returns the `Authorization` header value.
    pub fn answer(&self, challenge: &str, uri: &str) -> Result<String, Error> {
        let mut prompt = digest_auth::parse(challenge).map_err(|e| Error::Authentication {
            message: format!("unusable digest challenge: {e}"),
        })?;
        let context =
            digest_auth::AuthContext::new(self.username.as_str(), self.password.expose_secret(), uri);
        let answer = prompt.respond(&context).map_err(|e| Error::Authentication {
            message: format!("cannot answer digest challenge: {e}"),
        })?;
        Ok(answer.to_header_string())
    }
}

/// Last six characters of the serial, or all of it when shorter.
fn default_password(serial_number: &str) -> &str {
    let serial = serial_number.trim();
    serial
        .char_indices()
        .rev()
        .nth(5)
        .map_or(serial, |(i, _)| &serial[i..])
}

/// `true` for a `WWW-Authenticate` value announcing the Digest scheme.
pub(crate) fn is_digest_challenge(value: &str) -> bool {
    value
        .trim_start()
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
}
