//! HTTP surface (spec §6): the locate/country endpoints plus the
//! operational endpoints (`/__heartbeat__`, `/__monitor__`, `/__version__`).
//! Wires the Query/Source/Geocoder core to `actix-web`.
pub mod geolocate;
pub mod ops;
pub mod schema;

use std::sync::Arc;

use crate::apikey::ApiKeyRegistry;
use crate::geocode::Geocoder;
use crate::geoip::SharedGeoIpDatabase;
use crate::ratelimit::{RedisFallbackCache, RedisRateLimiter};
use crate::source::Source;
use crate::station::StationStore;
use crate::stats::StatsClient;

/// Everything a request handler needs, shared read-mostly across
/// concurrently-served requests (spec §5).
pub struct AppState {
    pub geocoder: Arc<Geocoder>,
    pub geoip_db: Option<SharedGeoIpDatabase>,
    pub station_store: Option<Arc<dyn StationStore>>,
    pub api_keys: Arc<ApiKeyRegistry>,
    pub stats_client: Arc<dyn StatsClient>,
    pub rate_limiter: Arc<RedisRateLimiter>,
    pub fallback_cache: Option<Arc<RedisFallbackCache>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// The three-source cascade in declared order, spec §4.4.
    pub fn build_sources(&self, fallback_enabled: bool, fallback_url: &str, fallback_timeout: std::time::Duration, fallback_retries: u32) -> Vec<Box<dyn Source>> {
        let mut sources: Vec<Box<dyn Source>> = vec![Box::new(crate::source::internal::InternalSource { geocoder: self.geocoder.clone() })];
        if fallback_enabled {
            sources.push(Box::new(crate::source::fallback::FallbackSource {
                url: fallback_url.to_string(),
                timeout: fallback_timeout,
                retries: fallback_retries,
                cache: self.fallback_cache.clone().map(|c| -> Arc<dyn crate::source::fallback::FallbackCache> { c }),
            }));
        }
        sources.push(Box::new(crate::source::geoip_source::GeoIPSource));
        sources
    }
}
