//! GeoIPSource: last-resort source derived purely from `query.geoip`.
//!
//! Preserves the open question from spec §9 verbatim: once this source
//! runs (i.e. `query.ip` is set and `fallback.ipf` allows it), it counts as
//! having searched even if the GeoIP lookup produced nothing — grounded in
//! `ichnaea/api/locate/geoip.py`'s `source_used = bool(query.ip)`.
use futures::future::BoxFuture;

use crate::constants::{ApiType, DataSource};
use crate::query::Query;
use crate::result::{Result as LocateResult, ResultList};
use crate::source::Source;

pub struct GeoIPSource;

impl Source for GeoIPSource {
    fn tag(&self) -> DataSource {
        DataSource::GeoIp
    }

    fn should_search(&self, query: &Query, _accumulated: &ResultList) -> bool {
        query.ip.is_some() && query.fallback.ipf
    }

    fn search<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, LocateResult> {
        Box::pin(async move {
            let Some(record) = &query.geoip else {
                return LocateResult::empty();
            };
            match query.api_type {
                ApiType::Region => LocateResult::region(record.region_code.clone(), record.region_name.clone(), record.score, DataSource::GeoIp),
                _ => LocateResult::position(record.lat, record.lon, record.accuracy, record.score, DataSource::GeoIp),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::apikey::ApiKey;
    use crate::geoip::StaticGeoIpDatabase;
    use crate::query::QueryParams;
    use crate::stats::LoggingStatsClient;

    fn query_with_ip(ip: &str, ipf: bool) -> Query {
        Query::new(QueryParams {
            ip: Some(ip.to_string()),
            cell: vec![],
            wifi: vec![],
            fallback_lacf: None,
            fallback_ipf: Some(ipf),
            api_key: ApiKey::new("test", true, true),
            api_type: ApiType::Locate,
            geoip_db: Some(Arc::new(StaticGeoIpDatabase::test_fixture())),
            station_store: None,
            http_client: None,
            stats_client: Arc::new(LoggingStatsClient),
        })
    }

    #[tokio::test]
    async fn resolves_london_ip_to_position() {
        let query = query_with_ip("81.2.69.160", true);
        let source = GeoIPSource;
        assert!(source.should_search(&query, &ResultList::new()));
        let result = source.search(&query).await;
        assert_eq!(result.lat, Some(51.5));
    }

    #[tokio::test]
    async fn ipf_false_gates_source_out() {
        let query = query_with_ip("81.2.69.160", false);
        let source = GeoIPSource;
        assert!(!source.should_search(&query, &ResultList::new()));
    }

    #[tokio::test]
    async fn geoip_miss_on_loopback_yields_empty_but_still_searched() {
        let query = query_with_ip("127.0.0.1", true);
        let source = GeoIPSource;
        assert!(source.should_search(&query, &ResultList::new()));
        let result = source.search(&query).await;
        assert!(result.is_empty());
    }
}
