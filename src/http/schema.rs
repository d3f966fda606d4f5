//! JSON request schema for `/v1/geolocate` and `/v1/country` (spec §6),
//! translated from a `serde`-derive + `#[serde(rename_all)]`
//! idiom (`services/locate/geolocate_public.rs`'s `LocationRequestPublic`)
//! into the documented geolocation schema instead of a bespoke submission
//! format.
//!
//! Two SPEC_FULL.md §B supplements live here, not in `Query`:
//! - `radioType` overriding `radio` when both are present on a cell tower.
//! - `considerIp` (default `true`) injecting `fallbacks.ipf` when the
//!   request omits `fallbacks` entirely.
//!
//! Unknown keys are silently ignored (serde's default behavior without
//! `deny_unknown_fields`), matching spec §9's "missing=drop" schema note.
use serde::Deserialize;

use crate::constants::RadioType;
use crate::query::{RawCellInput, RawWifiInput};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocateRequest {
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default = "default_consider_ip")]
    pub consider_ip: bool,
    #[serde(default)]
    pub home_mobile_country_code: Option<u16>,
    #[serde(default)]
    pub home_mobile_network_code: Option<u16>,
    #[serde(default)]
    pub radio_type: Option<String>,
    #[serde(default)]
    pub cell_towers: Vec<CellTowerWire>,
    #[serde(default)]
    pub wifi_access_points: Vec<WifiAccessPointWire>,
    #[serde(default)]
    pub fallbacks: Option<FallbacksWire>,
}

fn default_consider_ip() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTowerWire {
    #[serde(default)]
    pub radio: Option<String>,
    #[serde(default)]
    pub radio_type: Option<String>,
    pub mobile_country_code: u16,
    pub mobile_network_code: u16,
    #[serde(default)]
    pub location_area_code: Option<u32>,
    #[serde(default)]
    pub cell_id: Option<u32>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub psc: Option<u16>,
    #[serde(default)]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub timing_advance: Option<u32>,
}

impl CellTowerWire {
    /// "When both `radio` and `radioType` are supplied, `radioType` wins"
    /// (spec §6, SPEC_FULL.md §B).
    fn resolved_radio(&self, request_level_radio_type: Option<&str>) -> Option<RadioType> {
        let raw = self.radio_type.as_deref().or(self.radio.as_deref()).or(request_level_radio_type)?;
        raw.parse().ok()
    }

    pub fn into_raw(self, request_level_radio_type: Option<&str>) -> Option<RawCellInput> {
        let radio = self.resolved_radio(request_level_radio_type)?;
        Some(RawCellInput {
            radio,
            mcc: self.mobile_country_code,
            mnc: self.mobile_network_code,
            lac: self.location_area_code,
            cid: self.cell_id,
            psc: self.psc,
            signal: self.signal_strength,
            ta: self.timing_advance,
            age: self.age,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiAccessPointWire {
    pub mac_address: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub channel: Option<u16>,
    #[serde(default)]
    pub frequency: Option<u32>,
    #[serde(default)]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub signal_to_noise_ratio: Option<i32>,
    #[serde(default)]
    pub ssid: Option<String>,
}

impl From<WifiAccessPointWire> for RawWifiInput {
    fn from(wire: WifiAccessPointWire) -> Self {
        RawWifiInput {
            mac: wire.mac_address,
            signal: wire.signal_strength,
            snr: wire.signal_to_noise_ratio,
            channel: wire.channel,
            frequency: wire.frequency,
            age: wire.age,
            ssid: wire.ssid,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FallbacksWire {
    #[serde(default)]
    pub lacf: Option<bool>,
    #[serde(default)]
    pub ipf: Option<bool>,
}

pub struct ResolvedFallbacks {
    pub lacf: bool,
    pub ipf: bool,
}

impl LocateRequest {
    /// Resolves `fallbacks`, injecting `considerIp` as the `ipf` default
    /// exactly when the request didn't specify `fallbacks.ipf` itself.
    pub fn resolved_fallbacks(&self) -> ResolvedFallbacks {
        let lacf = self.fallbacks.as_ref().and_then(|f| f.lacf).unwrap_or(false);
        let ipf = self.fallbacks.as_ref().and_then(|f| f.ipf).unwrap_or(self.consider_ip);
        ResolvedFallbacks { lacf, ipf }
    }

    pub fn raw_wifis(wifi_access_points: Vec<WifiAccessPointWire>) -> Vec<RawWifiInput> {
        wifi_access_points.into_iter().map(RawWifiInput::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consider_ip_defaults_true_and_becomes_ipf() {
        let request: LocateRequest = serde_json::from_str("{}").unwrap();
        assert!(request.consider_ip);
        assert!(request.resolved_fallbacks().ipf);
    }

    #[test]
    fn explicit_ipf_false_overrides_consider_ip() {
        let request: LocateRequest = serde_json::from_str(r#"{"fallbacks":{"ipf":false}}"#).unwrap();
        assert!(!request.resolved_fallbacks().ipf);
    }

    #[test]
    fn radio_type_wins_over_radio() {
        let tower: CellTowerWire = serde_json::from_str(
            r#"{"radio":"gsm","radioType":"lte","mobileCountryCode":234,"mobileNetworkCode":15,"locationAreaCode":1,"cellId":1}"#,
        )
        .unwrap();
        let raw = tower.into_raw(None).unwrap();
        assert_eq!(raw.radio, RadioType::Lte);
    }

    #[test]
    fn unknown_keys_are_silently_dropped() {
        let request: LocateRequest = serde_json::from_str(r#"{"unexpectedField": 42, "considerIp": false}"#).unwrap();
        assert!(!request.consider_ip);
    }
}
