//! InternalSource: consults the local crowd-sourced store. Position queries
//! try Wi-Fi first, then cell; region queries only the cell/MCC path.
//! Grounded in `ichnaea/api/locate/internal.py`'s
//! `InternalPositionSource`/`InternalRegionSource` composition.
use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::constants::{ApiType, DataSource};
use crate::geocode::Geocoder;
use crate::query::Query;
use crate::result::Result as LocateResult;
use crate::source::Source;
use crate::station::{search_cell, search_wifi};

pub struct InternalSource {
    pub geocoder: std::sync::Arc<Geocoder>,
}

impl InternalSource {
    fn search_wifi_step(&self, query: &Query) -> Option<LocateResult> {
        let store = query.station_store.as_deref()?;
        let now = chrono::Utc::now().timestamp();
        let fused = search_wifi(&query.wifi, store, now)?;
        let score = crate::station::FusedPosition {
            lat: fused.lat,
            lon: fused.lon,
            accuracy: fused.accuracy,
            cluster_size: fused.cluster_size,
        }
        .score();
        Some(LocateResult::position(fused.lat, fused.lon, fused.accuracy, score, DataSource::Internal))
    }

    fn search_cell_step(&self, query: &Query) -> Option<LocateResult> {
        let store = query.station_store.as_deref()?;
        if query.cell.is_empty() {
            return None;
        }
        let identities: Vec<_> = query.cell.iter().map(|c| c.identity()).collect();
        let signals: HashMap<_, _> = query.cell.iter().map(|c| (c.identity(), c.signal)).collect();
        let (fix, score) = search_cell(&identities, store, &signals)?;
        Some(LocateResult::position(fix.lat, fix.lon, fix.radius, score, DataSource::Internal))
    }

    fn search_mcc_step(&self, query: &Query) -> Option<LocateResult> {
        if query.cell.is_empty() {
            return None;
        }
        let mut mccs: Vec<u16> = query.cell.iter().map(|c| c.mcc).collect();
        mccs.sort_unstable();
        mccs.dedup();
        if mccs.len() != 1 {
            return None;
        }
        let code = self.geocoder.regions_for_mcc(mccs[0]);
        if code.len() == 1 { Some(LocateResult::region(code[0].clone(), None, 0.6, DataSource::Internal)) } else { None }
    }
}

impl Source for InternalSource {
    fn tag(&self) -> DataSource {
        DataSource::Internal
    }

    fn should_search(&self, query: &Query, _accumulated: &crate::result::ResultList) -> bool {
        match query.api_type {
            ApiType::Locate => !query.wifi.is_empty() || !query.cell.is_empty(),
            ApiType::Region => !query.cell.is_empty(),
            ApiType::None => false,
        }
    }

    fn search<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, LocateResult> {
        Box::pin(async move {
            match query.api_type {
                ApiType::Locate => {
                    let wifi_result = if !query.wifi.is_empty() { self.search_wifi_step(query) } else { None };
                    let wifi_satisfies = wifi_result.as_ref().is_some_and(|r| r.data_accuracy() <= query.expected_accuracy());
                    if wifi_satisfies {
                        return wifi_result.unwrap();
                    }
                    let cell_result = self.search_cell_step(query);
                    match (wifi_result, cell_result) {
                        (Some(wifi), Some(cell)) => {
                            if cell.score >= wifi.score { cell } else { wifi }
                        }
                        (Some(wifi), None) => wifi,
                        (None, Some(cell)) => cell,
                        (None, None) => LocateResult::empty(),
                    }
                }
                ApiType::Region => self.search_mcc_step(query).unwrap_or_else(LocateResult::empty),
                ApiType::None => LocateResult::empty(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::apikey::ApiKey;
    use crate::lookup::CellIdentity;
    use crate::query::{QueryParams, RawCellInput};
    use crate::station::{StationFix, StationStore};
    use crate::stats::LoggingStatsClient;

    struct CellOnlyStore {
        fix: StationFix,
    }
    impl StationStore for CellOnlyStore {
        fn load_cells(&self, identities: &[CellIdentity]) -> HashMap<CellIdentity, StationFix> {
            identities.iter().map(|id| (*id, self.fix)).collect()
        }
        fn load_wifis(&self, _macs: &[String]) -> HashMap<String, StationFix> {
            HashMap::new()
        }
    }

    /// A single Wi-Fi AP can't form a cluster (below `MIN_WIFIS_IN_QUERY`),
    /// so `search_wifi_step` yields nothing even though a fix is stored;
    /// the cell step's result must still surface rather than being dropped.
    #[tokio::test]
    async fn cell_result_surfaces_when_wifi_cluster_is_too_small() {
        let raw_cell = vec![RawCellInput {
            radio: crate::constants::RadioType::Lte,
            mcc: 234,
            mnc: 15,
            lac: Some(1000),
            cid: Some(1),
            psc: None,
            signal: Some(-70),
            ta: None,
            age: None,
        }];
        let raw_wifi =
            vec![crate::query::RawWifiInput { mac: "aabbccddeeff".to_string(), signal: Some(-60), snr: None, channel: None, frequency: None, age: None, ssid: None }];

        let store = Arc::new(CellOnlyStore { fix: StationFix { lat: 51.5, lon: -0.1, radius: 5_000.0, samples: 3, last_seen: chrono::Utc::now().timestamp() } });

        let query = Query::new(QueryParams {
            ip: None,
            cell: raw_cell,
            wifi: raw_wifi,
            fallback_lacf: None,
            fallback_ipf: None,
            api_key: ApiKey::new("test", true, true),
            api_type: ApiType::Locate,
            geoip_db: None,
            station_store: Some(store),
            http_client: None,
            stats_client: Arc::new(LoggingStatsClient),
        });
        // A single wifi input never meets MIN_WIFIS_IN_QUERY, so the wifi
        // list itself is empty and only the cell step can contribute.
        assert!(query.wifi.is_empty());

        let source = InternalSource { geocoder: Arc::new(crate::geocode::Geocoder::load_embedded_test_dataset()) };
        let result = source.search(&query).await;
        assert!(!result.is_empty());
        assert_eq!(result.lat, Some(51.5));
    }
}
