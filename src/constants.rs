use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Defaults for the `[locator]`/`[redis]` config sections (SPEC_FULL.md
/// §A.3) — used both as `serde(default = ...)` fallbacks in `config.rs` and
/// as the fallback `crate::config::*` accessors read when no config has
/// been loaded (e.g. unit tests that build a `Query`/station fixture
/// directly, without calling `config::init`).
///
/// Minimum number of distinct valid Wi-Fi APs a query must carry before the
/// Wi-Fi list is allowed to be used at all (privacy-preserving floor).
pub const DEFAULT_MIN_WIFIS_IN_QUERY: usize = 2;

/// Maximum great-circle spread, in kilometers, for two APs to join the same
/// position-fusion cluster.
pub const DEFAULT_MAX_WIFI_CLUSTER_KM: f64 = 0.5;

/// Station fixes older than this (seconds) are dropped before fusion.
pub const DEFAULT_STATION_STALENESS_SECONDS: i64 = 60 * 60 * 24 * 365;

/// `apilimit:*` counter TTL (spec §6), one day.
pub const DEFAULT_RATE_LIMIT_TTL_SECONDS: i64 = 60 * 60 * 24;

/// `apiuser:*` HyperLogLog TTL (spec §6), eight days.
pub const DEFAULT_APIUSER_TTL_SECONDS: i64 = 60 * 60 * 24 * 8;

/// RSSI at 1m from an AP, used to turn signal strength into a fusion weight.
pub const BASE_RSSI: f64 = -30.0;
pub const SIGNAL_DROP_COEFFICIENT: f64 = 3.0;

/// Buffer applied to region polygons for coastal/border slack, in degrees.
pub const REGION_BUFFER_DEGREES: f64 = 0.5;

/// `DataAccuracy` banding thresholds, in meters.
pub const ACCURACY_HIGH_MAX_METERS: f64 = 500.0;
pub const ACCURACY_MEDIUM_MAX_METERS: f64 = 40_000.0;
pub const ACCURACY_LOW_MAX_METERS: f64 = 20_037_000.0; // ~ half Earth's circumference

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, IntoStaticStr, AsRefStr)]
pub enum RadioType {
    #[strum(serialize = "gsm")]
    Gsm,
    #[strum(serialize = "cdma")]
    Cdma,
    #[strum(serialize = "wcdma")]
    Wcdma,
    #[strum(serialize = "lte")]
    Lte,
}

/// Coarse source tag used on `Result`/stats, mirroring the `Collection`
/// enum's shape in `constants.rs` but naming the three locate sources
/// instead of storage collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, AsRefStr)]
pub enum DataSource {
    #[strum(serialize = "internal")]
    Internal,
    #[strum(serialize = "fallback")]
    Fallback,
    #[strum(serialize = "geoip")]
    GeoIp,
}

/// Query api_type, see spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, AsRefStr)]
pub enum ApiType {
    #[strum(serialize = "none")]
    None,
    #[strum(serialize = "locate")]
    Locate,
    #[strum(serialize = "region")]
    Region,
}
