mod apikey;
mod config;
mod constants;
mod error;
mod geocode;
mod geoip;
mod http;
mod lookup;
mod query;
mod ratelimit;
mod result;
mod source;
mod station;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, http::Method, middleware::Logger, web};
use anyhow::Result;
use clap::Parser;
use log::info;

use crate::apikey::ApiKeyRegistry;
use crate::geocode::Geocoder;
use crate::http::AppState;
use crate::ratelimit::{RedisFallbackCache, RedisRateLimiter};
use crate::stats::LoggingStatsClient;

/// Command line interface for the locator core's HTTP server.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to the TOML config file (spec SPEC_FULL.md §A.3).
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init(&cli.config)?;
    let cfg = config::config();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&cfg.server.log_level));

    let geocoder = Arc::new(match &cfg.geocoder.region_dataset_path {
        Some(path) => {
            // GENC-valid region filtering (spec §4.1) is opt-in: a deployment
            // that tracks the GENC list separately would pass it here instead
            // of `None` (accept every region the dataset ships).
            Geocoder::load_from_gzip_file(std::path::Path::new(path), None)?
        }
        None => {
            info!("no geocoder.region_dataset_path configured, using the embedded test region set");
            Geocoder::load_embedded_test_dataset()
        }
    });

    // GeoIP database loading is an out-of-scope external collaborator (spec
    // §1); the static fixture here stands in for a production MaxMind/DB-IP
    // reader behind the same `GeoIpDatabase` trait.
    let geoip_db: Option<crate::geoip::SharedGeoIpDatabase> = Some(Arc::new(crate::geoip::StaticGeoIpDatabase::test_fixture()));

    // The crowd-sourced station store (SQL data layer) is likewise out of
    // scope (spec §1); `station_store: None` degrades `InternalSource`'s
    // wifi/cell steps to "no stored fixes", leaving GeoIP/fallback to carry
    // the query, exactly as spec §4.4's `should_search` gating allows.
    let station_store: Option<Arc<dyn crate::station::StationStore>> = None;

    let api_keys = Arc::new(ApiKeyRegistry::from_config(cfg));
    let stats_client: Arc<dyn crate::stats::StatsClient> = Arc::new(LoggingStatsClient);
    let rate_limiter = Arc::new(RedisRateLimiter::new(&cfg.redis.url, Duration::from_millis(cfg.redis.call_timeout_ms))?);
    let fallback_cache = if cfg.fallback.enabled {
        Some(Arc::new(RedisFallbackCache::new(&cfg.redis.url, cfg.redis.fallback_cache_ttl_seconds)?))
    } else {
        None
    };

    let app_state = web::Data::new(AppState {
        geocoder,
        geoip_db,
        station_store,
        api_keys,
        stats_client,
        rate_limiter,
        fallback_cache,
        http_client: reqwest::Client::new(),
    });

    let http_port = cfg.server.http_port;
    let num_http_workers = cfg.server.num_http_workers;
    let max_payload_mb = cfg.server.max_payload_mb;

    info!("locator core listening on 0.0.0.0:{http_port}");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(max_payload_mb * 1024 * 1024))
            .wrap(Logger::new("%a %{User-Agent}i"))
            .service(web::scope("/v1").service(http::geolocate::geolocate).service(http::geolocate::country))
            .service(http::ops::monitor)
            .service(http::ops::version)
            .service(
                web::resource("/__heartbeat__")
                    .route(web::get().to(http::ops::heartbeat))
                    .route(web::head().to(http::ops::heartbeat))
                    .route(web::post().to(http::ops::heartbeat))
                    .route(web::method(Method::OPTIONS).to(http::ops::heartbeat)),
            )
    })
    .bind(("0.0.0.0", http_port))?
    .workers(num_http_workers)
    .shutdown_timeout(30)
    .run()
    .await?;

    Ok(())
}
