//! FallbackSource: an external HTTP geolocation service consulted when the
//! API key and fallback flags allow it. Grounded in
//! `lbs/altergeo.rs` (`reqwest::Client::post(..).form(..)` request shape)
//! and `services/helper/rate_limiter.rs` (bounded timeout + retry).
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::DataSource;
use crate::query::Query;
use crate::result::{Result as LocateResult, ResultList};
use crate::source::Source;

/// Cache for fallback responses, keyed by a stable fingerprint of the
/// query's canonical beacon set (spec §4.4: "cache by fingerprint ... cache
/// writes happen on success and on a small set of definitely-empty
/// responses; errors are not cached").
pub trait FallbackCache: Send + Sync {
    /// `None` means "no cache entry"; `Some(None)` means a cached
    /// definitely-empty response.
    fn get<'a>(&'a self, fingerprint: &'a str) -> BoxFuture<'a, Option<Option<FallbackResponse>>>;
    fn set<'a>(&'a self, fingerprint: &'a str, value: Option<FallbackResponse>) -> BoxFuture<'a, ()>;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackResponse {
    pub location: FallbackLocation,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackLocation {
    pub lat: f64,
    pub lng: f64,
}

pub struct FallbackSource {
    pub url: String,
    pub timeout: Duration,
    pub retries: u32,
    pub cache: Option<Arc<dyn FallbackCache>>,
}

fn fingerprint(query: &Query) -> String {
    let internal = query.internal_query();
    let mut macs: Vec<&str> = internal.wifi.iter().map(|w| w.mac.as_str()).collect();
    macs.sort_unstable();
    let mut cells: Vec<String> = internal.cell.iter().map(|c| format!("{}:{}:{}:{:?}:{:?}", c.radio, c.mcc, c.mnc, c.lac, c.cid)).collect();
    cells.sort_unstable();
    format!("wifi={}|cell={}", macs.join(","), cells.join(","))
}

impl FallbackSource {
    async fn attempt_call(&self, query: &Query) -> anyhow::Result<Option<FallbackResponse>> {
        let Some(client) = query.http_client.clone() else {
            anyhow::bail!("no http client configured for FallbackSource");
        };
        let body = query.internal_query();
        let response = tokio::time::timeout(self.timeout, client.post(&self.url).json(&body).send()).await??;

        if response.status().is_server_error() {
            anyhow::bail!("fallback service returned {}", response.status());
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let parsed: FallbackResponse = response.json().await?;
        Ok(Some(parsed))
    }

    /// Retries transport/5xx failures up to `self.retries` times; a
    /// definitive 404 ("no data") is not an error and is never retried.
    async fn call(&self, query: &Query) -> anyhow::Result<Option<FallbackResponse>> {
        let mut last_err = None;
        for attempt in 0..=self.retries {
            match self.attempt_call(query).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if attempt < self.retries {
                        warn!("fallback source call failed, retrying (attempt {attempt}): {err}");
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }
}

impl Source for FallbackSource {
    fn tag(&self) -> DataSource {
        DataSource::Fallback
    }

    fn should_search(&self, query: &Query, _accumulated: &ResultList) -> bool {
        query.api_key.allow_fallback && (query.fallback.lacf || query.fallback.ipf || !query.cell.is_empty() || !query.wifi.is_empty())
    }

    fn search<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, LocateResult> {
        Box::pin(async move {
            let key = fingerprint(query);

            if let Some(cache) = &self.cache {
                if let Some(cached) = cache.get(&key).await {
                    return cached
                        .map(|r| LocateResult::position(r.location.lat, r.location.lng, r.accuracy, 0.7, DataSource::Fallback).with_fallback_tag("cache"))
                        .unwrap_or_else(LocateResult::empty);
                }
            }

            match self.call(query).await {
                Ok(Some(response)) => {
                    if let Some(cache) = &self.cache {
                        cache.set(&key, Some(response.clone())).await;
                    }
                    LocateResult::position(response.location.lat, response.location.lng, response.accuracy, 0.7, DataSource::Fallback).with_fallback_tag("live")
                }
                Ok(None) => {
                    if let Some(cache) = &self.cache {
                        cache.set(&key, None).await;
                    }
                    LocateResult::empty()
                }
                Err(err) => {
                    // Source-level failure: absorbed locally per spec §7, never
                    // surfaced to the client, not cached.
                    warn!("fallback source call failed: {err}");
                    LocateResult::empty()
                }
            }
        })
    }
}
