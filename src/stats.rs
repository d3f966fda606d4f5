//! Metrics emission (spec §4.3 "Metrics"). No dedicated metrics crate is in
//! the dependency stack, so the ambient observability concern is carried
//! the same way logging is: through `log`, one structured line per
//! emission, tagged the way a StatsD/Datadog counter would be. A real
//! deployment swaps this for a `StatsClient` backed by whatever metrics
//! sink it runs (unchanged interface).
use log::info;

use crate::constants::ApiType;
use crate::result::{DataAccuracy, Result as LocateResult};

pub trait StatsClient: Send + Sync {
    fn emit_query_stats(&self, region: Option<&str>, api_key: &str, has_geoip: bool, cell_count: usize, wifi_count: usize);
    fn emit_result_stats(&self, fallback_allowed: bool, expected_accuracy: DataAccuracy, hit: bool, winning_source: Option<&str>);
    fn emit_source_stats(&self, source: &str, hit: bool);
}

fn bucket(count: usize) -> &'static str {
    match count {
        0 => "none",
        1 => "one",
        _ => "many",
    }
}

/// `log`-backed default implementation; counters become structured `info!`
/// lines instead of being pushed to a metrics backend.
pub struct LoggingStatsClient;

impl StatsClient for LoggingStatsClient {
    fn emit_query_stats(&self, region: Option<&str>, api_key: &str, has_geoip: bool, cell_count: usize, wifi_count: usize) {
        info!(
            "query_stats region={} api_key={} geoip={} cell={} wifi={}",
            region.unwrap_or("none"),
            api_key,
            has_geoip,
            bucket(cell_count),
            bucket(wifi_count),
        );
    }

    fn emit_result_stats(&self, fallback_allowed: bool, expected_accuracy: DataAccuracy, hit: bool, winning_source: Option<&str>) {
        info!(
            "result_stats fallback_allowed={} expected_accuracy={} status={} source={}",
            fallback_allowed,
            expected_accuracy,
            if hit { "hit" } else { "miss" },
            winning_source.unwrap_or("-"),
        );
    }

    fn emit_source_stats(&self, source: &str, hit: bool) {
        info!("source_stats source={} status={}", source, if hit { "hit" } else { "miss" });
    }
}

pub fn result_status_is_hit(result: &LocateResult, expected_accuracy: DataAccuracy) -> bool {
    result.data_accuracy() <= expected_accuracy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DataSource;

    #[test]
    fn hit_iff_accuracy_meets_expectation() {
        let result = LocateResult::position(51.5, -0.1, 25_000.0, 0.6, DataSource::GeoIp);
        assert!(result_status_is_hit(&result, DataAccuracy::Low));
        assert!(!result_status_is_hit(&result, DataAccuracy::High));
    }
}
