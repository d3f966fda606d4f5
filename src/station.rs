//! Station search fusion (spec §4.5), abstracted over a storage layer the
//! spec treats as an external collaborator (§1 "the SQL data layer"). The
//! weighted-centroid math is lifted directly from
//! `db/transmitter.rs` (`TransmitterLocation::update`'s weighted average,
//! and the `10f64.powf(signal/(10*SIGNAL_DROP_COEFFICIENT))` weighting from
//! `services/locate/geolocate.rs`), generalized from "one AP accumulating
//! many reports" to "many APs fused into one position".
use std::collections::HashMap;

use geo::{Distance, Haversine, Point};

use crate::constants::{BASE_RSSI, SIGNAL_DROP_COEFFICIENT};
use crate::lookup::{CellIdentity, WifiLookup};

#[derive(Debug, Clone, Copy)]
pub struct StationFix {
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
    pub samples: u32,
    pub last_seen: i64,
}

/// Bulk-lookup contract for the crowd-sourced cell/Wi-Fi store. Spec §1
/// explicitly places the SQL data layer out of scope; this trait is the
/// seam a real Postgres/Tile38-backed store plugs into (compare
/// `db::t38::cmd::query_pipeline`'s bulk-fetch shape).
pub trait StationStore: Send + Sync {
    fn load_cells(&self, identities: &[CellIdentity]) -> HashMap<CellIdentity, StationFix>;
    fn load_wifis(&self, macs: &[String]) -> HashMap<String, StationFix>;
}

fn signal_weight(signal: Option<i32>) -> f64 {
    let signal = signal.unwrap_or(BASE_RSSI as i32) as f64;
    10f64.powf(signal / (10.0 * SIGNAL_DROP_COEFFICIENT))
}

fn is_stale(fix: &StationFix, now: i64) -> bool {
    now - fix.last_seen > crate::config::station_staleness_seconds()
}

pub struct FusedPosition {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f64,
    pub cluster_size: usize,
}

impl FusedPosition {
    /// Monotone, diminishing-returns function of cluster size (spec §4.5.5).
    pub fn score(&self) -> f64 {
        1.0 - 1.0 / (self.cluster_size as f64 + 1.0)
    }
}

/// Wi-Fi position fusion, spec §4.5 steps 1-6.
pub fn search_wifi(lookups: &[WifiLookup], store: &dyn StationStore, now: i64) -> Option<FusedPosition> {
    let macs: Vec<String> = lookups.iter().map(|l| l.mac.clone()).collect();
    let fixes = store.load_wifis(&macs);

    let mut members: Vec<(&WifiLookup, StationFix)> = lookups
        .iter()
        .filter_map(|lookup| fixes.get(&lookup.mac).copied().map(|fix| (lookup, fix)))
        .filter(|(_, fix)| !is_stale(fix, now))
        .collect();

    if members.is_empty() {
        return None;
    }

    // Seed the cluster on the strongest-signal AP, then greedily add every
    // other AP within the configured cluster radius of the seed.
    members.sort_by(|(a, _), (b, _)| b.signal.unwrap_or(i32::MIN).cmp(&a.signal.unwrap_or(i32::MIN)));
    let seed_point = Point::new(members[0].1.lon, members[0].1.lat);
    let max_distance_m = crate::config::max_wifi_cluster_km() * 1000.0;

    let cluster: Vec<(&WifiLookup, StationFix)> = members
        .into_iter()
        .filter(|(_, fix)| Haversine::distance(seed_point, Point::new(fix.lon, fix.lat)) <= max_distance_m)
        .collect();

    if cluster.len() < crate::config::min_wifis_in_query() {
        return None;
    }

    let mut weighted_lat = 0.0;
    let mut weighted_lon = 0.0;
    let mut total_weight = 0.0;
    for (lookup, fix) in &cluster {
        let weight = signal_weight(lookup.signal);
        weighted_lat += fix.lat * weight;
        weighted_lon += fix.lon * weight;
        total_weight += weight;
    }
    let centroid_lat = weighted_lat / total_weight;
    let centroid_lon = weighted_lon / total_weight;
    let centroid = Point::new(centroid_lon, centroid_lat);

    let max_member_distance = cluster
        .iter()
        .map(|(_, fix)| Haversine::distance(centroid, Point::new(fix.lon, fix.lat)))
        .fold(0.0_f64, f64::max);
    let weakest_radius = cluster
        .iter()
        .min_by(|(a, _), (b, _)| a.signal.unwrap_or(i32::MIN).cmp(&b.signal.unwrap_or(i32::MIN)))
        .map(|(_, fix)| fix.radius)
        .unwrap_or(0.0);

    Some(FusedPosition {
        lat: centroid_lat,
        lon: centroid_lon,
        accuracy: max_member_distance.max(weakest_radius),
        cluster_size: cluster.len(),
    })
}

/// Cell fusion: single-best-by-signal selection, spec §4.5 header ("cell is
/// analogous with single-best selection").
pub fn search_cell(identities: &[CellIdentity], store: &dyn StationStore, signals: &HashMap<CellIdentity, Option<i32>>) -> Option<(StationFix, f64)> {
    let fixes = store.load_cells(identities);
    identities
        .iter()
        .filter_map(|id| fixes.get(id).map(|fix| (id, fix)))
        .max_by_key(|(id, _)| signals.get(*id).copied().flatten().unwrap_or(i32::MIN))
        .map(|(_, fix)| (*fix, 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore {
        wifis: HashMap<String, StationFix>,
    }

    impl StationStore for FixedStore {
        fn load_cells(&self, _identities: &[CellIdentity]) -> HashMap<CellIdentity, StationFix> {
            HashMap::new()
        }

        fn load_wifis(&self, macs: &[String]) -> HashMap<String, StationFix> {
            macs.iter().filter_map(|m| self.wifis.get(m).copied().map(|fix| (m.clone(), fix))).collect()
        }
    }

    #[test]
    fn cluster_below_minimum_yields_empty() {
        let store = FixedStore {
            wifis: HashMap::from([("aabbccddeeff".to_string(), StationFix { lat: 51.5, lon: -0.1, radius: 30.0, samples: 3, last_seen: 100 })]),
        };
        let lookup = WifiLookup::create("aabbccddeeff", Some(-60), None, None, None, None, None).unwrap();
        assert!(search_wifi(&[lookup], &store, 100).is_none());
    }

    #[test]
    fn two_nearby_aps_fuse_into_weighted_centroid() {
        let store = FixedStore {
            wifis: HashMap::from([
                ("aaaaaaaaaaaa".to_string(), StationFix { lat: 51.5, lon: -0.1, radius: 30.0, samples: 5, last_seen: 100 }),
                ("bbbbbbbbbbbb".to_string(), StationFix { lat: 51.5001, lon: -0.1001, radius: 25.0, samples: 5, last_seen: 100 }),
            ]),
        };
        let lookups = vec![
            WifiLookup::create("aaaaaaaaaaaa", Some(-60), None, None, None, None, None).unwrap(),
            WifiLookup::create("bbbbbbbbbbbb", Some(-70), None, None, None, None, None).unwrap(),
        ];
        let fused = search_wifi(&lookups, &store, 100).unwrap();
        assert_eq!(fused.cluster_size, 2);
        assert!((fused.lat - 51.5).abs() < 0.01);
        assert!(fused.accuracy > 0.0);
    }

    #[test]
    fn stale_fixes_are_dropped() {
        let store = FixedStore {
            wifis: HashMap::from([
                ("aaaaaaaaaaaa".to_string(), StationFix { lat: 51.5, lon: -0.1, radius: 30.0, samples: 5, last_seen: 0 }),
                ("bbbbbbbbbbbb".to_string(), StationFix { lat: 51.5001, lon: -0.1001, radius: 25.0, samples: 5, last_seen: 0 }),
            ]),
        };
        let lookups = vec![
            WifiLookup::create("aaaaaaaaaaaa", Some(-60), None, None, None, None, None).unwrap(),
            WifiLookup::create("bbbbbbbbbbbb", Some(-70), None, None, None, None, None).unwrap(),
        ];
        let now = crate::config::station_staleness_seconds() + 1_000_000;
        assert!(search_wifi(&lookups, &store, now).is_none());
    }
}
