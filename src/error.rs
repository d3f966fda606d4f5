//! Error taxonomy (spec §7): a `thiserror`-derived enum plus an
//! `actix_web::ResponseError` impl, in the shape of
//! `error/error.rs` (`name()`, a `status_code()` match, an
//! `error_response()` serializing a documented JSON shape). Variants cover
//! exactly the five taxonomy kinds plus the internal variants `?`-propagated
//! from `serde_json`, `redis`, and `reqwest`.
//!
//! Per-source failures (§7 "source-level failure") are deliberately *not*
//! represented here — they're caught inside `Source::search` and folded
//! into an empty `Result`, never bubbling past the source boundary.
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request body")]
    InvalidInput(String),
    #[error("invalid or missing API key")]
    InvalidApiKey,
    #[error("daily API key limit exceeded")]
    RateLimited,
    #[error("backend unavailable")]
    BackendUnavailable(String),
    #[error("no location could be estimated")]
    NotFound,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid request",
            Self::InvalidApiKey => "invalid API key",
            Self::RateLimited => "daily limit exceeded",
            Self::BackendUnavailable(_) => "backend unavailable",
            Self::NotFound => "not found",
            Self::Json(_) => "invalid request",
            Self::Redis(_) | Self::Http(_) => "backend unavailable",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::InvalidApiKey => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::FORBIDDEN,
            Self::BackendUnavailable(_) | Self::Redis(_) | Self::Http(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        HttpResponse::build(status_code).json(json!({
            "error": {
                "domain": "geolocation",
                "reason": self.name(),
                "message": self.to_string(),
                "code": status_code.as_u16(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec_taxonomy() {
        assert_eq!(ApiError::InvalidInput("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidApiKey.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::BackendUnavailable("redis".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }
}
