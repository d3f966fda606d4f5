//! The Source pipeline: an ordered cascade of search sources, each of which
//! may return a `Result`; the orchestrator accumulates them with early
//! termination (spec §4.4).
//!
//! Grounded in Ichnaea's `api/locate/internal.py` composition-of-mixins
//! control flow (spec §9: "dynamic dispatch on per-source search" → a
//! sequence of source objects sharing one capability set) and the
//! cascade-then-external-fallback shape in
//! `services/locate/geolocate.rs`/`geolocate_public.rs`.
pub mod fallback;
pub mod geoip_source;
pub mod internal;

use futures::future::BoxFuture;

use crate::constants::DataSource;
use crate::query::Query;
use crate::result::{Result as LocateResult, ResultList};

pub trait Source: Send + Sync {
    fn tag(&self) -> DataSource;
    fn should_search(&self, query: &Query, accumulated: &ResultList) -> bool;
    fn search<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, LocateResult>;
}

/// Runs `sources` in order, stopping as soon as the accumulated results
/// satisfy the query's expected accuracy. Emits per-source and overall
/// stats exactly as spec §4.4's orchestration contract describes.
pub async fn run(sources: &[Box<dyn Source>], query: &Query) -> ResultList {
    let mut accumulated = ResultList::new();
    let expected_accuracy = query.expected_accuracy();
    let collect_metrics = query.collect_metrics();

    for source in sources {
        if !source.should_search(query, &accumulated) {
            continue;
        }

        let result = source.search(query).await;
        let hit = result.data_accuracy() <= expected_accuracy;
        if collect_metrics {
            query.stats_client.emit_source_stats(source.tag().as_ref(), hit);
        }
        accumulated.add(result);

        if accumulated.satisfies(expected_accuracy) {
            break;
        }
    }

    if collect_metrics {
        let best = accumulated.best();
        let hit = best.data_accuracy() <= expected_accuracy;
        let winning_source = if hit { best.source.map(|s| s.as_ref()) } else { None };
        query.stats_client.emit_result_stats(query.api_key.allow_fallback, expected_accuracy, hit, winning_source);
    }

    accumulated
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::apikey::ApiKey;
    use crate::constants::ApiType;
    use crate::query::QueryParams;
    use crate::stats::LoggingStatsClient;

    struct AlwaysEmpty(DataSource);
    impl Source for AlwaysEmpty {
        fn tag(&self) -> DataSource {
            self.0
        }
        fn should_search(&self, _query: &Query, _accumulated: &ResultList) -> bool {
            true
        }
        fn search<'a>(&'a self, _query: &'a Query) -> BoxFuture<'a, LocateResult> {
            Box::pin(async { LocateResult::empty() })
        }
    }

    struct AlwaysHit(DataSource);
    impl Source for AlwaysHit {
        fn tag(&self) -> DataSource {
            self.0
        }
        fn should_search(&self, _query: &Query, _accumulated: &ResultList) -> bool {
            true
        }
        fn search<'a>(&'a self, _query: &'a Query) -> BoxFuture<'a, LocateResult> {
            Box::pin(async { LocateResult::position(51.5, -0.1, 10.0, 0.9, DataSource::Internal) })
        }
    }

    #[tokio::test]
    async fn orchestrator_terminates_early_once_satisfied() {
        let query = Query::new(QueryParams {
            ip: None,
            cell: vec![],
            wifi: vec![],
            fallback_lacf: None,
            fallback_ipf: None,
            api_key: ApiKey::new("test", true, true),
            api_type: ApiType::Locate,
            geoip_db: None,
            station_store: None,
            http_client: None,
            stats_client: Arc::new(LoggingStatsClient),
        });

        let sources: Vec<Box<dyn Source>> =
            vec![Box::new(AlwaysHit(DataSource::Internal)), Box::new(AlwaysEmpty(DataSource::GeoIp))];
        let results = run(&sources, &query).await;
        let best = results.best();
        assert_eq!(best.source, Some(DataSource::Internal));
    }
}
