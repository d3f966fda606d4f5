//! GeoIP lookup handle. Spec §1 lists "the GeoIP database file loader" as an
//! out-of-scope external collaborator — this module defines the contract
//! the Query/Source layers consume (`GeoIpDatabase`), plus a minimal
//! in-memory implementation for tests and small deployments. A production
//! deployment swaps in a real MaxMind/DB-IP-backed implementation without
//! touching `Query` or `GeoIPSource`.
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct GeoIpRecord {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f64,
    pub region_code: String,
    pub region_name: Option<String>,
    /// Confidence the database assigns this record (spec §4.4's GeoIP
    /// source passes this straight through as the result's score).
    pub score: f64,
}

/// Read-only lookup handle. Reload/hot-swap (spec §5: "reloading is done by
/// atomic pointer replacement; in-flight queries hold a reference until they
/// finish") is modeled by callers holding an `Arc<dyn GeoIpDatabase>` cloned
/// out of a `arc_swap`-free `std::sync::RwLock<Arc<dyn GeoIpDatabase>>` at
/// the wiring layer; this trait itself only needs to be `Send + Sync`.
pub trait GeoIpDatabase: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoIpRecord>;
    /// Age of the underlying database file, used by `/__monitor__`.
    fn age_in_days(&self) -> u32;
}

/// A tiny fixed table sufficient for spec §8 scenarios 1-4 and tests.
pub struct StaticGeoIpDatabase {
    entries: Vec<(IpAddr, GeoIpRecord)>,
    age_in_days: u32,
}

impl StaticGeoIpDatabase {
    pub fn test_fixture() -> Self {
        Self {
            entries: vec![
                (
                    "81.2.69.160".parse().unwrap(),
                    GeoIpRecord {
                        lat: 51.5,
                        lon: -0.1,
                        accuracy: 25_000.0,
                        region_code: "GB".to_string(),
                        region_name: Some("United Kingdom".to_string()),
                        score: 0.6,
                    },
                ),
                (
                    "67.43.156.1".parse().unwrap(),
                    GeoIpRecord {
                        lat: 27.5,
                        lon: 90.4,
                        accuracy: 130_000.0,
                        region_code: "BT".to_string(),
                        region_name: Some("Bhutan".to_string()),
                        score: 0.6,
                    },
                ),
            ],
            age_in_days: 1,
        }
    }
}

impl GeoIpDatabase for StaticGeoIpDatabase {
    fn lookup(&self, ip: IpAddr) -> Option<GeoIpRecord> {
        self.entries.iter().find(|(entry_ip, _)| *entry_ip == ip).map(|(_, record)| record.clone())
    }

    fn age_in_days(&self) -> u32 {
        self.age_in_days
    }
}

pub type SharedGeoIpDatabase = Arc<dyn GeoIpDatabase>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn london_ip_resolves_to_gb() {
        let db = StaticGeoIpDatabase::test_fixture();
        let record = db.lookup("81.2.69.160".parse().unwrap()).unwrap();
        assert_eq!(record.region_code, "GB");
    }

    #[test]
    fn loopback_misses() {
        let db = StaticGeoIpDatabase::test_fixture();
        assert!(db.lookup("127.0.0.1".parse().unwrap()).is_none());
    }
}
