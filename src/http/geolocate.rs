//! `POST /v1/geolocate` and `POST /v1/country` (spec §6). Builds a `Query`
//! from the documented request schema, runs the source pipeline, and
//! formats the documented success/error response shapes.
//!
//! Grounded in `services/locate/geolocate_public.rs` for the
//! actix handler shape (`#[post(...)]`, `web::Json<T>` with a `None` arm for
//! "deserialization failed" returning the aggregated 400 error document),
//! generalized from a bespoke submission schema to the documented
//! MLS-style geolocation schema.
use actix_web::{HttpRequest, HttpResponse, ResponseError, post, web};
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::apikey::ApiKey;
use crate::constants::ApiType;
use crate::error::ApiError;
use crate::http::AppState;
use crate::http::schema::LocateRequest;
use crate::query::{Query, QueryParams};
use crate::ratelimit::RateLimitOutcome;

#[derive(Debug, Deserialize)]
pub struct KeyParam {
    pub key: Option<String>,
}

fn invalid_request_response() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": {
            "domain": "geolocation",
            "reason": "invalid request",
            "message": "request deserialization error",
            "code": 400,
        }
    }))
}

/// Looks up the API key, enforces the daily cap, and returns the resolved
/// `ApiKey` or the error response to send back (spec §7: rate-limit and
/// API-key errors abort before the pipeline runs).
async fn authorize(state: &AppState, key_param: &KeyParam, path: &str) -> Result<ApiKey, ApiError> {
    let Some(raw_key) = key_param.key.as_deref().filter(|k| !k.is_empty()) else {
        return Err(ApiError::InvalidApiKey);
    };
    let Some(api_key) = state.api_keys.lookup(raw_key) else {
        return Err(ApiError::InvalidApiKey);
    };
    let daily_limit = state.api_keys.daily_limit(raw_key).unwrap_or(u64::MAX);

    let today = Utc::now().format("%Y%m%d").to_string();
    match state.rate_limiter.check_and_increment(raw_key, path, &today, daily_limit).await {
        Ok(RateLimitOutcome::Allowed) => Ok(api_key.clone()),
        Ok(RateLimitOutcome::Exceeded) => Err(ApiError::RateLimited),
        Err(err) => {
            warn!("rate limiter unreachable, failing closed on {path}: {err}");
            Err(ApiError::BackendUnavailable(err.to_string()))
        }
    }
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info().realip_remote_addr().map(|s| s.to_string())
}

async fn run_query(state: &web::Data<AppState>, api_key: ApiKey, api_type: ApiType, req: &HttpRequest, body: LocateRequest) -> crate::result::Result {
    let resolved = body.resolved_fallbacks();
    let wifi = LocateRequest::raw_wifis(body.wifi_access_points);
    let cell = body.cell_towers.into_iter().filter_map(|t| t.into_raw(body.radio_type.as_deref())).collect();

    let query = Query::new(QueryParams {
        ip: client_ip(req),
        cell,
        wifi,
        fallback_lacf: Some(resolved.lacf),
        fallback_ipf: Some(resolved.ipf),
        api_key,
        api_type,
        geoip_db: state.geoip_db.clone(),
        station_store: state.station_store.clone(),
        http_client: Some(state.http_client.clone()),
        stats_client: state.stats_client.clone(),
    });

    query.emit_query_stats();

    if let Some(ip) = client_ip(req) {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        state.rate_limiter.record_apiuser(api_type.as_ref(), &query.api_key.name, &today, &ip).await;
    }

    let fallback_enabled = crate::config::config().fallback.enabled && query.api_key.allow_fallback;
    let fallback_url = crate::config::config().fallback.url.clone();
    let fallback_timeout = std::time::Duration::from_millis(crate::config::config().fallback.timeout_ms);
    let fallback_retries = crate::config::config().fallback.retries;
    let sources = state.build_sources(fallback_enabled, &fallback_url, fallback_timeout, fallback_retries);

    crate::source::run(&sources, &query).await.best()
}

#[derive(Debug, Serialize)]
struct PositionResponse {
    location: LatLng,
    accuracy: i64,
}

#[derive(Debug, Serialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Serialize)]
struct CountryResponse {
    country_code: String,
    country_name: Option<String>,
}

fn not_found_response() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": {
            "domain": "geolocation",
            "reason": "not found",
            "message": "no location could be estimated based on the data provided",
            "code": 404,
        }
    }))
}

#[post("/geolocate")]
pub async fn geolocate(body: Option<web::Json<LocateRequest>>, key: web::Query<KeyParam>, req: HttpRequest, state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let Some(body) = body else { return Ok(invalid_request_response()) };

    let api_key = match authorize(&state, &key, "/v1/geolocate").await {
        Ok(key) => key,
        Err(err) => return Ok(err.error_response()),
    };

    let result = run_query(&state, api_key, ApiType::Locate, &req, body.into_inner()).await;

    let (Some(lat), Some(lon), Some(accuracy)) = (result.lat, result.lon, result.accuracy) else {
        return Ok(not_found_response());
    };
    Ok(HttpResponse::Ok().json(PositionResponse { location: LatLng { lat, lng: lon }, accuracy: accuracy.round() as i64 }))
}

#[post("/country")]
pub async fn country(body: Option<web::Json<LocateRequest>>, key: web::Query<KeyParam>, req: HttpRequest, state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let Some(body) = body else { return Ok(invalid_request_response()) };

    let api_key = match authorize(&state, &key, "/v1/country").await {
        Ok(key) => key,
        Err(err) => return Ok(err.error_response()),
    };

    let result = run_query(&state, api_key, ApiType::Region, &req, body.into_inner()).await;

    let Some(country_code) = result.region_code else { return Ok(not_found_response()) };
    Ok(HttpResponse::Ok().json(CountryResponse { country_code, country_name: result.region_name }))
}
