// ── Firmware dialects ──
//
// A dialect maps a metric category to the endpoints that carry it and
// turns the fetched bodies into a typed reading. The variant is chosen
// from the capability set; each variant's parsing lives in its own module.
//
// Bodies are collected into `Payloads` first. An endpoint that answered
// 403/404 is simply missing from the map, and every value derived from it
// comes back as `None`.

pub mod battery;
pub mod legacy;
pub mod metered;
pub mod v1;

use std::collections::BTreeMap;

use envoy_api::Endpoint;
use envoy_api::error::preview;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::CoreError;
use crate::profile::{CapabilitySet, GatewayModel, MeterLayout};
use crate::reading::{MetricCategory, ReadingData};

/// Battery hardware behind an Envoy-S.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Storage {
    pub encharge: bool,
    pub ac_battery: bool,
}

impl Storage {
    pub fn from_capabilities(caps: &CapabilitySet) -> Self {
        if caps.model.is_envoy_s() {
            Self {
                encharge: caps.encharge,
                ac_battery: caps.ac_battery,
            }
        } else {
            Self::default()
        }
    }
}

/// How a gateway exposes its telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Envoy-R below firmware 3.9: the HTML production page.
    LegacyHtml,
    /// `api/v1` JSON endpoints (Envoy-R >= 3.9, Envoy-S Standard).
    JsonV1(Storage),
    /// Envoy-S Metered with CTs enabled: per-meter readings.
    Metered(MeterLayout, Storage),
    /// Envoy-S Metered with CTs disabled: `production.json` only.
    MeteredCtDisabled(MeterLayout, Storage),
}

impl Dialect {
    pub fn for_capabilities(caps: &CapabilitySet) -> Self {
        let storage = Storage::from_capabilities(caps);
        match caps.model {
            GatewayModel::LegacyR => Self::LegacyHtml,
            GatewayModel::EnvoyR | GatewayModel::EnvoySStandard => Self::JsonV1(storage),
            GatewayModel::EnvoySMetered if caps.meters.ct_enabled() => {
                Self::Metered(caps.meters, storage)
            }
            GatewayModel::EnvoySMetered => Self::MeteredCtDisabled(caps.meters, storage),
        }
    }

    /// Endpoints to GET for `category`. Empty when the dialect has no
    /// source for it.
    pub fn endpoints(&self, category: MetricCategory) -> Vec<Endpoint> {
        match (self, category) {
            (Self::LegacyHtml, MetricCategory::Production) => vec![Endpoint::ProductionPage],
            (Self::LegacyHtml, _) => Vec::new(),

            (Self::JsonV1(_), MetricCategory::Production) => vec![Endpoint::ProductionV1],
            (Self::Metered(..), MetricCategory::Production | MetricCategory::Consumption) => {
                vec![Endpoint::MeterReadings, Endpoint::ProductionJson]
            }
            (Self::Metered(..), MetricCategory::Grid) => vec![Endpoint::MeterReadings],
            (Self::MeteredCtDisabled(..), MetricCategory::Production) => {
                vec![Endpoint::ProductionJson]
            }

            (_, MetricCategory::Inverters) => vec![Endpoint::Inverters],
            (
                Self::JsonV1(storage)
                | Self::Metered(_, storage)
                | Self::MeteredCtDisabled(_, storage),
                MetricCategory::Battery,
            ) => battery::endpoints(*storage),

            _ => Vec::new(),
        }
    }

    /// Turn fetched bodies into a reading.
    pub fn parse(
        &self,
        category: MetricCategory,
        payloads: &Payloads,
    ) -> Result<ReadingData, CoreError> {
        match (self, category) {
            (Self::LegacyHtml, MetricCategory::Production) => {
                legacy::production(payloads).map(ReadingData::Energy)
            }
            (Self::LegacyHtml, _) => Ok(ReadingData::NoData),

            (Self::JsonV1(_), MetricCategory::Production) => {
                v1::production(payloads).map(ReadingData::Energy)
            }
            (Self::Metered(meters, _), MetricCategory::Production) => {
                metered::production(meters, payloads).map(ReadingData::Energy)
            }
            (Self::Metered(meters, _), MetricCategory::Consumption) => {
                metered::consumption(meters, payloads).map(ReadingData::Energy)
            }
            (Self::Metered(meters, _), MetricCategory::Grid) => {
                metered::grid(meters, payloads).map(ReadingData::Grid)
            }
            (Self::MeteredCtDisabled(meters, _), MetricCategory::Production) => {
                metered::production_ct_disabled(meters, payloads).map(ReadingData::Energy)
            }

            (_, MetricCategory::Inverters) => v1::inverters(payloads).map(ReadingData::Inverters),
            (
                Self::JsonV1(storage)
                | Self::Metered(_, storage)
                | Self::MeteredCtDisabled(_, storage),
                MetricCategory::Battery,
            ) => battery::parse(*storage, payloads).map(ReadingData::Battery),

            _ => Ok(ReadingData::NoData),
        }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

/// Raw bodies fetched for one reading, keyed by endpoint.
#[derive(Debug, Clone, Default)]
pub struct Payloads {
    bodies: BTreeMap<Endpoint, String>,
}

impl Payloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, endpoint: Endpoint, body: String) {
        self.bodies.insert(endpoint, body);
    }

    /// Builder-style insert, mostly for tests.
    pub fn with(mut self, endpoint: Endpoint, body: impl Into<String>) -> Self {
        self.insert(endpoint, body.into());
        self
    }

    pub fn text(&self, endpoint: Endpoint) -> Option<&str> {
        self.bodies.get(&endpoint).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Decode the JSON body of `endpoint`, if it was fetched.
    pub fn json<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<Option<T>, CoreError> {
        let Some(body) = self.text(endpoint) else {
            return Ok(None);
        };
        serde_json::from_str(body)
            .map(Some)
            .map_err(|e| parse_error(endpoint, &e, body))
    }
}

/// Build a `Parse` error, logging the body preview.
pub(crate) fn parse_error(endpoint: Endpoint, err: &dyn std::fmt::Display, body: &str) -> CoreError {
    warn!(%endpoint, error = %err, body = preview(body), "cannot parse gateway response");
    CoreError::Parse {
        message: format!("{endpoint}: {err}"),
        body: body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(model: GatewayModel) -> CapabilitySet {
        CapabilitySet::new(model)
    }

    #[test]
    fn dialect_selection() {
        assert_eq!(
            Dialect::for_capabilities(&caps(GatewayModel::LegacyR)),
            Dialect::LegacyHtml
        );
        assert!(matches!(
            Dialect::for_capabilities(&caps(GatewayModel::EnvoySStandard)),
            Dialect::JsonV1(_)
        ));
        assert!(matches!(
            Dialect::for_capabilities(&caps(GatewayModel::EnvoySMetered)),
            Dialect::MeteredCtDisabled(..)
        ));

        let metered = CapabilitySet {
            meters: MeterLayout {
                production: Some(1),
                net_consumption: Some(2),
                total_consumption: None,
            },
            ..caps(GatewayModel::EnvoySMetered)
        };
        assert!(matches!(
            Dialect::for_capabilities(&metered),
            Dialect::Metered(..)
        ));
    }

    #[test]
    fn envoy_r_storage_is_ignored() {
        let caps = CapabilitySet {
            encharge: true,
            ..caps(GatewayModel::EnvoyR)
        };
        let dialect = Dialect::for_capabilities(&caps);
        assert!(dialect.endpoints(MetricCategory::Battery).is_empty());
    }

    #[test]
    fn legacy_has_no_inverter_source() {
        assert!(
            Dialect::LegacyHtml
                .endpoints(MetricCategory::Inverters)
                .is_empty()
        );
        assert_eq!(
            Dialect::LegacyHtml.endpoints(MetricCategory::Production),
            vec![Endpoint::ProductionPage]
        );
    }

    #[test]
    fn missing_payload_decodes_to_none() {
        let payloads = Payloads::new();
        let value: Option<serde_json::Value> = payloads.json(Endpoint::ProductionJson).unwrap_or_default();
        assert!(value.is_none());
    }

    #[test]
    fn bad_json_is_a_parse_error_with_body() {
        let payloads = Payloads::new().with(Endpoint::ProductionJson, "{not json");
        match payloads.json::<serde_json::Value>(Endpoint::ProductionJson) {
            Err(CoreError::Parse { message, body }) => {
                assert!(message.starts_with("/production.json"));
                assert_eq!(body, "{not json");
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}
