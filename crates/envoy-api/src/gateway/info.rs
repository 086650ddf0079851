// `/info` endpoint
//
// The only endpoint every firmware serves unauthenticated. It answers with
// an `envoy_info` XML document:
//
//   <envoy_info>
//     <device>
//       <sn>122201234567</sn>
//       <pn>800-00555-r03</pn>
//       <software>D7.6.175</software>
//       <imeter>true</imeter>
//     </device>
//     <web-tokens>true</web-tokens>
//   </envoy_info>

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize)]
struct EnvoyInfoXml {
    #[serde(default)]
    device: Option<DeviceXml>,
    #[serde(default, rename = "web-tokens")]
    web_tokens: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceXml {
    #[serde(default)]
    sn: Option<String>,
    #[serde(default)]
    pn: Option<String>,
    #[serde(default)]
    software: Option<String>,
    #[serde(default)]
    imeter: Option<String>,
}

/// Parsed `/info` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInfo {
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
    pub firmware: Option<FirmwareVersion>,
    /// `Some(true)` on Envoy-S Metered, `Some(false)` on Envoy-S Standard,
    /// absent on Envoy-R.
    pub imeter: Option<bool>,
    /// `true` when the firmware requires an Enlighten token.
    pub web_tokens: bool,
}

impl GatewayInfo {
    /// Parse the `envoy_info` XML body.
    pub fn from_xml(body: &str) -> Result<Self, Error> {
        let raw: EnvoyInfoXml =
            quick_xml::de::from_str(body).map_err(|e| Error::deserialization(e, body))?;

        let device = raw.device;
        let text = |v: Option<String>| v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());

        let (serial_number, part_number, software, imeter) = match device {
            Some(d) => (text(d.sn), text(d.pn), text(d.software), text(d.imeter)),
            None => (None, None, None, None),
        };

        Ok(Self {
            serial_number,
            part_number,
            firmware: software.and_then(|s| FirmwareVersion::from_software_tag(&s)),
            imeter: imeter.as_deref().and_then(parse_flag),
            web_tokens: raw.web_tokens.as_deref().and_then(parse_flag).unwrap_or(false),
        })
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

// ── Firmware version ────────────────────────────────────────────────

/// Dotted gateway firmware version (`7.6.175`).
///
/// Ordering compares the numeric components; the raw string is kept for
/// display.
#[derive(Debug, Clone)]
pub struct FirmwareVersion {
    raw: String,
    parts: Vec<u32>,
}

impl FirmwareVersion {
    /// Parse the `<software>` tag, which prefixes the version with a
    /// letter (`D7.6.175`, `R3.9.36`).
    pub fn from_software_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let version = match tag.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => &tag[c.len_utf8()..],
            _ => tag,
        };
        version.parse().ok()
    }

    /// Major component.
    pub fn major(&self) -> u32 {
        self.parts.first().copied().unwrap_or(0)
    }

    /// `true` when `self >= major.minor`.
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        self.cmp_parts(&[major, minor]) != Ordering::Less
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn cmp_parts(&self, other: &[u32]) -> Ordering {
        let len = self.parts.len().max(other.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.get(i).copied().unwrap_or(0);
            if a != b {
                return a.cmp(&b);
            }
        }
        Ordering::Equal
    }
}

impl FromStr for FirmwareVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let mut parts = Vec::new();
        for component in raw.split('.') {
            // Trailing build suffixes ("175_beta") keep their numeric prefix.
            let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            parts.push(digits.parse().map_err(|_| Error::Deserialization {
                message: format!("firmware component out of range: {component}"),
                body: raw.to_owned(),
            })?);
        }

        if parts.is_empty() {
            return Err(Error::Deserialization {
                message: format!("not a firmware version: {raw:?}"),
                body: raw.to_owned(),
            });
        }

        Ok(Self {
            raw: raw.to_owned(),
            parts,
        })
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FirmwareVersion {}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_parts(&other.parts)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
