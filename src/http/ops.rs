//! Operational endpoints (spec §6): `/__heartbeat__`, `/__monitor__`,
//! `/__version__`. Grounded in `services/health.rs`'s shape
//! (`#[get(...)]` returning a small `json!({...})` body), generalized to
//! the three documented ambient endpoints instead of a single
//! `/health`.
use actix_web::{HttpResponse, get, http::header, web};
use serde_json::json;

use crate::http::AppState;

/// Bound to GET/HEAD/POST/OPTIONS in `main.rs` (spec §6) — a plain fn
/// rather than `#[get(...)]` since the per-method macro only
/// covers one verb.
pub async fn heartbeat() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header(("Access-Control-Max-Age", "2592000"))
        .json(json!({"status": "OK"}))
}

#[get("/__monitor__")]
pub async fn monitor(state: web::Data<AppState>) -> HttpResponse {
    let geoip_up = state.geoip_db.is_some();
    let geoip_age_days = state.geoip_db.as_ref().map(|db| db.age_in_days());

    let redis_up = state.rate_limiter.ping().await;

    let all_up = geoip_up && redis_up;

    let mut body = json!({
        "geoip": {"up": geoip_up, "time": 0, "age_in_days": geoip_age_days},
        "redis": {"up": redis_up, "time": 0},
    });
    if let Some(map) = body.as_object_mut() {
        map.insert("status".to_string(), json!(if all_up { "OK" } else { "FAIL" }));
    }

    if all_up {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

#[get("/__version__")]
pub async fn version() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "commit": option_env!("GIT_COMMIT").unwrap_or("unknown"),
        "tag": option_env!("GIT_TAG").unwrap_or("unknown"),
        "version": env!("CARGO_PKG_VERSION"),
        "source": "https://github.com/",
    }))
}
