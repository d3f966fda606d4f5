//! The Query object: canonicalizes and deduplicates a client's observation,
//! derives GeoIP/region facts, and scores the achievable accuracy.
//!
//! Grounded in Ichnaea's `api/locate/query.py`, translated from Python's
//! property-setter idiom into a single validating constructor, the way
//! `services/locate/geolocate.rs` runs `LocationRequest` deserialization
//! straight into validated domain state.
use std::net::IpAddr;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::apikey::ApiKey;
use crate::constants::{ApiType, RadioType};
use crate::geoip::{GeoIpRecord, SharedGeoIpDatabase};
use crate::lookup::{CellAreaLookup, CellLookup, FallbackLookup, OrderedDedup, WifiLookup};
use crate::result::DataAccuracy;
use crate::station::StationStore;
use crate::stats::StatsClient;

#[derive(Debug, Clone)]
pub struct RawCellInput {
    pub radio: RadioType,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: Option<u32>,
    pub cid: Option<u32>,
    pub psc: Option<u16>,
    pub signal: Option<i32>,
    pub ta: Option<u32>,
    pub age: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RawWifiInput {
    pub mac: String,
    pub signal: Option<i32>,
    pub snr: Option<i32>,
    pub channel: Option<u16>,
    pub frequency: Option<u32>,
    pub age: Option<i64>,
    pub ssid: Option<String>,
}

pub struct QueryParams {
    pub ip: Option<String>,
    pub cell: Vec<RawCellInput>,
    pub wifi: Vec<RawWifiInput>,
    pub fallback_lacf: Option<bool>,
    pub fallback_ipf: Option<bool>,
    pub api_key: ApiKey,
    pub api_type: ApiType,
    pub geoip_db: Option<SharedGeoIpDatabase>,
    pub station_store: Option<Arc<dyn StationStore>>,
    pub http_client: Option<Client>,
    pub stats_client: Arc<dyn StatsClient>,
}

pub struct Query {
    pub ip: Option<IpAddr>,
    pub geoip: Option<GeoIpRecord>,
    pub region: Option<String>,
    pub cell: Vec<CellLookup>,
    _cell_area: Vec<CellAreaLookup>,
    pub wifi: Vec<WifiLookup>,
    /// Count of wifi observations as submitted, before dedup/thresholding —
    /// what `query.py`'s `len(self._wifi_unvalidated)` reports to stats.
    wifi_unvalidated_count: usize,
    pub fallback: FallbackLookup,
    pub api_key: ApiKey,
    pub api_type: ApiType,
    pub geoip_db: Option<SharedGeoIpDatabase>,
    pub station_store: Option<Arc<dyn StationStore>>,
    pub http_client: Option<Client>,
    pub stats_client: Arc<dyn StatsClient>,
}

impl Query {
    pub fn new(params: QueryParams) -> Self {
        let fallback = FallbackLookup::with_defaults(params.fallback_lacf.unwrap_or(false), params.fallback_ipf.unwrap_or(true));

        let ip = params.ip.as_deref().and_then(|s| s.parse::<IpAddr>().ok());
        let geoip = ip.and_then(|addr| params.geoip_db.as_ref().and_then(|db| db.lookup(addr)));
        let region = geoip.as_ref().map(|record| record.region_code.clone());

        let (cell, cell_area) = build_cell_lookups(&params.cell);
        let wifi_unvalidated_count = params.wifi.len();
        let wifi = build_wifi_lookups(&params.wifi);

        Self {
            ip,
            geoip,
            region,
            cell,
            _cell_area: cell_area,
            wifi,
            wifi_unvalidated_count,
            fallback,
            api_key: params.api_key,
            api_type: params.api_type,
            geoip_db: params.geoip_db,
            station_store: params.station_store,
            http_client: params.http_client,
            stats_client: params.stats_client,
        }
    }

    /// `cell_area` is only observable when `fallback.lacf` is set — spec §3
    /// invariant, preserved even though `_cell_area` was always computed.
    pub fn cell_area(&self) -> &[CellAreaLookup] {
        if self.fallback.lacf { &self._cell_area } else { &[] }
    }

    /// Deterministic from the tuple (has wifi?, has cell?, has cell_area +
    /// lacf?, has ip + ipf?, api_type) — spec §4.3.
    pub fn expected_accuracy(&self) -> DataAccuracy {
        let mut candidates = vec![DataAccuracy::None];

        if !self.wifi.is_empty() {
            candidates.push(match self.api_type {
                ApiType::Locate => DataAccuracy::High,
                _ => DataAccuracy::None,
            });
        }
        if !self.cell.is_empty() {
            candidates.push(match self.api_type {
                ApiType::Locate => DataAccuracy::Medium,
                ApiType::Region => DataAccuracy::Low,
                ApiType::None => DataAccuracy::None,
            });
        }
        if !self.cell_area().is_empty() || (self.ip.is_some() && self.fallback.ipf) {
            candidates.push(DataAccuracy::Low);
        }

        candidates.into_iter().min().unwrap_or(DataAccuracy::None)
    }

    /// Canonical dictionary form consumed by `FallbackSource` as the
    /// external fallback request body (spec §4.3 `internal_query`).
    pub fn internal_query(&self) -> InternalQuery {
        InternalQuery {
            cell: self
                .cell
                .iter()
                .map(|c| InternalCell { radio: c.radio.to_string(), mcc: c.mcc, mnc: c.mnc, lac: c.lac, cid: c.cid, signal: c.signal })
                .collect(),
            wifi: self.wifi.iter().map(|w| InternalWifi { mac: w.mac.clone(), signal: w.signal }).collect(),
            fallbacks: InternalFallbacks { lacf: self.fallback.lacf, ipf: self.fallback.ipf },
        }
    }

    pub fn collect_metrics(&self) -> bool {
        self.api_key.should_log(self.api_type) && self.expected_accuracy() != DataAccuracy::None
    }

    pub fn emit_query_stats(&self) {
        if !self.collect_metrics() {
            return;
        }
        self.stats_client.emit_query_stats(self.region.as_deref(), &self.api_key.name, self.ip.is_some(), self.cell.len(), self.wifi_unvalidated_count);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InternalCell {
    pub radio: String,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: Option<u32>,
    pub cid: Option<u32>,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternalWifi {
    pub mac: String,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternalFallbacks {
    pub lacf: bool,
    pub ipf: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternalQuery {
    pub cell: Vec<InternalCell>,
    pub wifi: Vec<InternalWifi>,
    pub fallbacks: InternalFallbacks,
}

fn build_cell_lookups(raw: &[RawCellInput]) -> (Vec<CellLookup>, Vec<CellAreaLookup>) {
    let mut cells = OrderedDedup::new();
    let mut areas = OrderedDedup::new();

    for input in raw {
        if let Some(lac) = input.lac {
            if let Some(cid) = input.cid {
                if let Some(lookup) = CellLookup::create(input.radio, input.mcc, input.mnc, lac, cid, input.psc, input.signal, input.ta, input.age) {
                    let identity = lookup.identity();
                    cells.insert_or_replace(identity, lookup, |a, b| a.better(b));
                }
            }
            if let Some(area) = CellAreaLookup::create(input.radio, input.mcc, input.mnc, lac, input.signal, input.age) {
                let identity = area.identity();
                areas.insert_or_replace(identity, area, |a, b| a.better(b));
            }
        }
    }

    (cells.into_values(), areas.into_values())
}

fn build_wifi_lookups(raw: &[RawWifiInput]) -> Vec<WifiLookup> {
    let mut dedup = OrderedDedup::new();
    for input in raw {
        if let Some(lookup) = WifiLookup::create(&input.mac, input.signal, input.snr, input.channel, input.frequency, input.age, input.ssid.clone()) {
            let identity = lookup.identity().to_string();
            dedup.insert_or_replace(identity, lookup, |a, b| a.better(b));
        }
    }
    let values = dedup.into_values();
    if values.len() < crate::config::min_wifis_in_query() { Vec::new() } else { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::StaticGeoIpDatabase;
    use crate::stats::LoggingStatsClient;

    fn params(wifi: Vec<RawWifiInput>, cell: Vec<RawCellInput>, api_type: ApiType) -> QueryParams {
        QueryParams {
            ip: None,
            cell,
            wifi,
            fallback_lacf: None,
            fallback_ipf: None,
            api_key: ApiKey::new("test", true, true),
            api_type,
            geoip_db: Some(Arc::new(StaticGeoIpDatabase::test_fixture())),
            station_store: None,
            http_client: None,
            stats_client: Arc::new(LoggingStatsClient),
        }
    }

    #[test]
    fn duplicate_mac_below_threshold_empties_wifi() {
        let raw = vec![
            RawWifiInput { mac: "aa:bb:cc:dd:ee:ff".to_string(), signal: Some(-70), snr: None, channel: None, frequency: None, age: None, ssid: None },
            RawWifiInput { mac: "AA:BB:CC:DD:EE:FF".to_string(), signal: Some(-90), snr: None, channel: None, frequency: None, age: None, ssid: None },
        ];
        let query = Query::new(params(raw, vec![], ApiType::Locate));
        assert_eq!(query.wifi.len(), 0);
    }

    #[test]
    fn duplicate_cells_dedup_keeping_strongest_signal() {
        let raw = vec![
            RawCellInput { radio: RadioType::Lte, mcc: 234, mnc: 15, lac: Some(1000), cid: Some(1), psc: None, signal: Some(-70), ta: None, age: None },
            RawCellInput { radio: RadioType::Lte, mcc: 234, mnc: 15, lac: Some(1000), cid: Some(1), psc: None, signal: Some(-60), ta: None, age: None },
            RawCellInput { radio: RadioType::Lte, mcc: 234, mnc: 16, lac: Some(1000), cid: Some(2), psc: None, signal: Some(-80), ta: None, age: None },
            RawCellInput { radio: RadioType::Lte, mcc: 234, mnc: 17, lac: Some(1000), cid: Some(3), psc: None, signal: Some(-50), ta: None, age: None },
        ];
        let query = Query::new(params(vec![], raw, ApiType::Locate));
        assert_eq!(query.cell.len(), 3);
        let dup = query.cell.iter().find(|c| c.mnc == 15).unwrap();
        assert_eq!(dup.signal, Some(-60));
    }

    #[test]
    fn cell_area_hidden_unless_lacf() {
        let raw = vec![RawCellInput { radio: RadioType::Gsm, mcc: 234, mnc: 15, lac: Some(1000), cid: Some(1), psc: None, signal: None, ta: None, age: None }];
        let mut p = params(vec![], raw, ApiType::Locate);
        p.fallback_lacf = Some(false);
        let query = Query::new(p);
        assert!(query.cell_area().is_empty());
    }

    #[test]
    fn expected_accuracy_monotone_when_adding_wifi() {
        let base = Query::new(params(vec![], vec![], ApiType::Locate));
        assert_eq!(base.expected_accuracy(), DataAccuracy::None);

        let raw = vec![RawWifiInput { mac: "aabbccddeeff".to_string(), signal: None, snr: None, channel: None, frequency: None, age: None, ssid: None },
                       RawWifiInput { mac: "112233445566".to_string(), signal: None, snr: None, channel: None, frequency: None, age: None, ssid: None }];
        let with_wifi = Query::new(params(raw, vec![], ApiType::Locate));
        assert!(with_wifi.expected_accuracy() <= base.expected_accuracy());
    }

    #[test]
    fn region_api_type_ignores_wifi_for_accuracy() {
        let raw = vec![RawWifiInput { mac: "aabbccddeeff".to_string(), signal: None, snr: None, channel: None, frequency: None, age: None, ssid: None },
                       RawWifiInput { mac: "112233445566".to_string(), signal: None, snr: None, channel: None, frequency: None, age: None, ssid: None }];
        let query = Query::new(params(raw, vec![], ApiType::Region));
        assert_eq!(query.expected_accuracy(), DataAccuracy::None);
    }
}
