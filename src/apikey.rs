//! The API key object referenced throughout §4.3/§4.4. Its persistent store
//! (lookup by key string, daily usage counters) is the Redis-backed
//! external collaborator described in spec §5/§6 (`src/ratelimit.rs`); this
//! module holds the in-memory shape `Query` and the Source pipeline consult.
use std::collections::HashMap;

use crate::config::{ApiKeyEntry, Config};
use crate::constants::ApiType;

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub name: String,
    pub allow_fallback: bool,
    /// When false, none of this key's queries are ever logged/counted in
    /// metrics, independent of `expected_accuracy`.
    log_enabled: bool,
}

impl ApiKey {
    pub fn new(name: impl Into<String>, allow_fallback: bool, log_enabled: bool) -> Self {
        Self { name: name.into(), allow_fallback, log_enabled }
    }

    /// `api_key.should_log(api_type)`: every known api_type may be logged
    /// as long as the key itself allows logging. `ApiType::None` never is.
    pub fn should_log(&self, api_type: ApiType) -> bool {
        self.log_enabled && api_type != ApiType::None
    }
}

/// In-memory lookup from the raw `?key=` query string to the validated
/// `ApiKey` plus its daily cap, built once from `Config::server::api_keys`
/// at startup. The 403 "invalid or missing API key" response (spec §7) is
/// produced by `Registry::lookup` returning `None`.
pub struct ApiKeyRegistry {
    by_key: HashMap<String, (ApiKey, u64)>,
}

impl ApiKeyRegistry {
    pub fn from_config(config: &Config) -> Self {
        let by_key = config
            .server
            .api_keys
            .iter()
            .map(|entry: &ApiKeyEntry| (entry.key.clone(), (ApiKey::new(entry.name.clone(), entry.allow_fallback, entry.log_enabled), entry.daily_limit)))
            .collect();
        Self { by_key }
    }

    pub fn lookup(&self, key: &str) -> Option<&ApiKey> {
        self.by_key.get(key).map(|(api_key, _)| api_key)
    }

    pub fn daily_limit(&self, key: &str) -> Option<u64> {
        self.by_key.get(key).map(|(_, limit)| *limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_log_respects_both_key_and_api_type() {
        let key = ApiKey::new("test", true, true);
        assert!(key.should_log(ApiType::Locate));
        assert!(!key.should_log(ApiType::None));

        let silent_key = ApiKey::new("silent", true, false);
        assert!(!silent_key.should_log(ApiType::Locate));
    }

    #[test]
    fn registry_looks_up_by_raw_key_string() {
        let config: Config = toml::from_str(
            r#"
[server]
http_port = 8080
num_http_workers = 1
max_payload_mb = 1
log_level = "info"
api_keys = [{ key = "abc123", name = "test", allow_fallback = true, daily_limit = 1000 }]

[redis]
url = "redis://127.0.0.1/"

[fallback]
enabled = false
url = "https://example.invalid/geolocate"

[locator]

[geocoder]
"#,
        )
        .unwrap();
        let registry = ApiKeyRegistry::from_config(&config);
        assert!(registry.lookup("abc123").is_some());
        assert!(registry.lookup("nope").is_none());
        assert_eq!(registry.daily_limit("abc123"), Some(1000));
    }
}
