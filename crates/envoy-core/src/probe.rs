// ── Discovery and probing ──
//
// `discover` identifies a gateway from its unauthenticated `/info`
// document. `probe` then asks the (possibly authenticated) local API which
// meters and batteries are actually installed. Both return fresh values;
// the host decides whether to store them in its profile.

use envoy_api::gateway::models::{EnsembleGroup, MeterConfig, ProductionReport};
use envoy_api::{GatewayClient, GatewayInfo, Scheme, gateway};
use tracing::{debug, info};

use crate::error::{CoreError, absent_if_not_found};
use crate::profile::{
    AccessToken, CapabilitySet, FirmwareClass, GatewayModel, GatewayProfile, MeterLayout,
};

/// What `/info` says about a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub info: GatewayInfo,
    /// Scheme that answered `/info`.
    pub scheme: Scheme,
    pub firmware_class: FirmwareClass,
    /// Model guess before probing meters.
    pub model: GatewayModel,
}

impl Discovery {
    pub fn from_info(info: GatewayInfo, scheme: Scheme) -> Self {
        let firmware_class = if info.web_tokens {
            FirmwareClass::TokenAuth
        } else {
            FirmwareClass::Legacy
        };
        let model = provisional_model(&info);
        Self {
            info,
            scheme,
            firmware_class,
            model,
        }
    }

    /// A profile for `address` built from this discovery. Capabilities
    /// hold the provisional model only until `probe` runs.
    pub fn into_profile(self, address: &str) -> GatewayProfile {
        let mut profile = GatewayProfile::new(
            self.info.serial_number.unwrap_or_default(),
            address,
            self.firmware_class,
            CapabilitySet::new(self.model),
        );
        profile.firmware_version = self.info.firmware.map(|v| v.to_string());
        profile.part_number = self.info.part_number;
        profile
    }
}

/// Model from firmware version and the `imeter` flag.
pub fn provisional_model(info: &GatewayInfo) -> GatewayModel {
    if info.firmware.as_ref().is_some_and(|v| !v.at_least(3, 9)) {
        return GatewayModel::LegacyR;
    }
    match info.imeter {
        Some(true) => GatewayModel::EnvoySMetered,
        Some(false) => GatewayModel::EnvoySStandard,
        None => GatewayModel::EnvoyR,
    }
}

/// Fetch and interpret `/info` (HTTPS first, then HTTP).
pub async fn discover(http: &reqwest::Client, address: &str) -> Result<Discovery, CoreError> {
    let (info, scheme) = gateway::discover_info(http, address).await?;
    let discovery = Discovery::from_info(info, scheme);
    info!(
        address,
        serial = discovery.info.serial_number.as_deref().unwrap_or("?"),
        firmware = discovery.info.firmware.as_ref().map(|v| v.as_str()).unwrap_or("?"),
        model = %discovery.model,
        class = %discovery.firmware_class,
        "discovered gateway"
    );
    Ok(discovery)
}

/// Detect meters and storage behind `profile`.
///
/// A 404/403 on a probe endpoint means the hardware is absent. A 401 is
/// `TokenExpired`.
pub async fn probe(
    client: &GatewayClient,
    profile: &GatewayProfile,
    token: Option<&AccessToken>,
) -> Result<CapabilitySet, CoreError> {
    let bearer = token.and_then(AccessToken::bearer);
    let mut caps = CapabilitySet::new(profile.capabilities.model);

    if caps.model == GatewayModel::EnvoySMetered {
        let meters = absent_if_not_found(client.meters(bearer).await)?.unwrap_or_default();
        caps.meters = meter_layout(&meters);
        debug!(meters = ?caps.meters, ct_enabled = caps.meters.ct_enabled(), "probed meters");
    }

    if caps.model.is_envoy_s() {
        let inventory =
            absent_if_not_found(client.ensemble_inventory(bearer).await)?.unwrap_or_default();
        caps.encharge = has_encharge(&inventory);

        let report = absent_if_not_found(client.production_report(bearer).await)?;
        caps.ac_battery = report.as_ref().is_some_and(has_ac_battery);
        debug!(
            encharge = caps.encharge,
            ac_battery = caps.ac_battery,
            "probed storage"
        );
    }

    Ok(caps)
}

/// Enabled meter EIDs by measurement type.
pub fn meter_layout(meters: &[MeterConfig]) -> MeterLayout {
    let mut layout = MeterLayout::default();
    for meter in meters.iter().filter(|m| m.is_enabled()) {
        match meter.measurement_type.as_str() {
            "production" => layout.production = Some(meter.eid),
            "net-consumption" => layout.net_consumption = Some(meter.eid),
            "total-consumption" => layout.total_consumption = Some(meter.eid),
            other => debug!(eid = meter.eid, measurement_type = other, "ignoring meter"),
        }
    }
    layout
}

fn has_encharge(inventory: &[EnsembleGroup]) -> bool {
    inventory
        .iter()
        .any(|group| group.is_encharge() && !group.devices.is_empty())
}

fn has_ac_battery(report: &ProductionReport) -> bool {
    report.storage.iter().any(|s| s.percent_full.is_some())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn info(xml: &str) -> GatewayInfo {
        GatewayInfo::from_xml(xml).unwrap()
    }

    #[test]
    fn model_detection() {
        let old = info("<envoy_info><device><software>R3.8.10</software></device></envoy_info>");
        assert_eq!(provisional_model(&old), GatewayModel::LegacyR);

        let r = info("<envoy_info><device><software>R3.17.3</software></device></envoy_info>");
        assert_eq!(provisional_model(&r), GatewayModel::EnvoyR);

        let metered = info(
            "<envoy_info><device><software>D7.6.175</software><imeter>true</imeter></device></envoy_info>",
        );
        assert_eq!(provisional_model(&metered), GatewayModel::EnvoySMetered);

        let standard = info(
            "<envoy_info><device><software>D5.0.49</software><imeter>false</imeter></device></envoy_info>",
        );
        assert_eq!(provisional_model(&standard), GatewayModel::EnvoySStandard);
    }

    #[test]
    fn web_tokens_select_token_auth() {
        let d = Discovery::from_info(
            info("<envoy_info><device><sn>1</sn></device><web-tokens>true</web-tokens></envoy_info>"),
            Scheme::Https,
        );
        assert_eq!(d.firmware_class, FirmwareClass::TokenAuth);

        let profile = d.into_profile("envoy.local");
        assert_eq!(profile.serial_number, "1");
        assert_eq!(profile.address, "envoy.local");
    }

    #[test]
    fn disabled_meters_are_skipped() {
        let meters: Vec<MeterConfig> = serde_json::from_str(
            r#"[
                {"eid":704643328,"state":"enabled","measurementType":"production","phaseMode":"split","phaseCount":2,"meteringStatus":"normal"},
                {"eid":704643584,"state":"disabled","measurementType":"net-consumption","phaseMode":"split","phaseCount":2,"meteringStatus":"normal"}
            ]"#,
        )
        .unwrap();
        let layout = meter_layout(&meters);
        assert_eq!(layout.production, Some(704_643_328));
        assert_eq!(layout.net_consumption, None);
        assert!(!layout.ct_enabled());
    }
}
