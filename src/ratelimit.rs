//! Redis-backed daily API-key cap and per-day apiuser tracking (spec §5,
//! §6). Grounded in `services/helper/rate_limiter.rs` for the
//! retry/backoff shape and `db/t38/cmd.rs` for the "never let a broken
//! Redis fail the query" discipline, adapted from an in-memory sliding
//! window to the persistent Redis counters spec §6 documents.
use std::time::Duration;

use anyhow::Context;
use log::warn;
use redis::AsyncCommands;

pub enum RateLimitOutcome {
    Allowed,
    Exceeded,
}

pub struct RedisRateLimiter {
    client: redis::Client,
    call_timeout: Duration,
}

impl RedisRateLimiter {
    pub fn new(redis_url: &str, call_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self { client: redis::Client::open(redis_url).context("building redis client")?, call_timeout })
    }

    fn apilimit_key(api_key: &str, path: &str, yyyymmdd: &str) -> String {
        format!("apilimit:{api_key}:{path}:{yyyymmdd}")
    }

    fn apiuser_key(api_type: &str, api_name: &str, yyyy_mm_dd: &str) -> String {
        format!("apiuser:{api_type}:{api_name}:{yyyy_mm_dd}")
    }

    /// `INCR` + `EXPIRE` pipelined atomically (spec §5). A broken Redis
    /// never fails the query's locate pipeline, only rate limiting itself;
    /// callers that cannot reach Redis for a *mandatory* rate-limit check
    /// should treat that failure as the distinct 503 in spec §7, which this
    /// function surfaces as an `Err`.
    pub async fn check_and_increment(&self, api_key: &str, path: &str, yyyymmdd: &str, daily_cap: u64) -> anyhow::Result<RateLimitOutcome> {
        let key = Self::apilimit_key(api_key, path, yyyymmdd);
        let mut conn = tokio::time::timeout(self.call_timeout, self.client.get_multiplexed_async_connection())
            .await
            .context("redis connect timed out")??;

        let count: u64 = tokio::time::timeout(self.call_timeout, async {
            let mut pipe = redis::pipe();
            pipe.atomic().incr(&key, 1).expire(&key, crate::config::rate_limit_ttl_seconds());
            let (count, _): (u64, ()) = pipe.query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(count)
        })
        .await
        .context("redis rate-limit call timed out")??;

        if count > daily_cap { Ok(RateLimitOutcome::Exceeded) } else { Ok(RateLimitOutcome::Allowed) }
    }

    /// Bare connectivity probe for `/__monitor__` (spec §6); doesn't touch
    /// any rate-limit counter.
    pub async fn ping(&self) -> bool {
        let Ok(Ok(mut conn)) = tokio::time::timeout(self.call_timeout, self.client.get_multiplexed_async_connection()).await else {
            return false;
        };
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }

    /// HyperLogLog of client IPs per (api_type, api_name, day), 8-day TTL.
    /// Best-effort: a failure here must never fail the request (spec §5).
    pub async fn record_apiuser(&self, api_type: &str, api_name: &str, yyyy_mm_dd: &str, client_ip: &str) {
        let key = Self::apiuser_key(api_type, api_name, yyyy_mm_dd);
        let result: anyhow::Result<()> = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let mut pipe = redis::pipe();
            pipe.atomic().pfadd(&key, client_ip).expire(&key, crate::config::apiuser_ttl_seconds());
            let _: () = pipe.query_async(&mut conn).await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            warn!("apiuser tracking failed (non-fatal): {err}");
        }
    }
}

/// Redis-backed `FallbackCache`, keyed by the fingerprint `FallbackSource`
/// computes, `SETEX`'d with a configurable TTL per spec §5.
pub struct RedisFallbackCache {
    client: redis::Client,
    ttl_seconds: i64,
}

impl RedisFallbackCache {
    pub fn new(redis_url: &str, ttl_seconds: i64) -> anyhow::Result<Self> {
        Ok(Self { client: redis::Client::open(redis_url).context("building redis client")?, ttl_seconds })
    }
}

impl crate::source::fallback::FallbackCache for RedisFallbackCache {
    fn get<'a>(&'a self, fingerprint: &'a str) -> futures::future::BoxFuture<'a, Option<Option<crate::source::fallback::FallbackResponse>>> {
        Box::pin(async move {
            let result: anyhow::Result<Option<String>> = async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                let value: Option<String> = conn.get(format!("fallback:{fingerprint}")).await?;
                Ok(value)
            }
            .await;

            match result {
                Ok(Some(raw)) if raw == "null" => Some(None),
                Ok(Some(raw)) => serde_json::from_str(&raw).ok().map(Some),
                Ok(None) => None,
                Err(err) => {
                    warn!("fallback cache read failed (treated as miss): {err}");
                    None
                }
            }
        })
    }

    fn set<'a>(&'a self, fingerprint: &'a str, value: Option<crate::source::fallback::FallbackResponse>) -> futures::future::BoxFuture<'a, ()> {
        Box::pin(async move {
            let payload = match &value {
                Some(response) => serde_json::to_string(response).unwrap_or_else(|_| "null".to_string()),
                None => "null".to_string(),
            };
            let result: anyhow::Result<()> = async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                let _: () = conn.set_ex(format!("fallback:{fingerprint}"), payload, self.ttl_seconds as u64).await?;
                Ok(())
            }
            .await;
            if let Err(err) = result {
                warn!("fallback cache write failed (non-fatal): {err}");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats_match_spec() {
        assert_eq!(RedisRateLimiter::apilimit_key("abc123", "/v1/geolocate", "20260729"), "apilimit:abc123:/v1/geolocate:20260729");
        assert_eq!(RedisRateLimiter::apiuser_key("locate", "abc123", "2026-07-29"), "apiuser:locate:abc123:2026-07-29");
    }
}
