//! Reverse-geocoder: point → region code, and region-related helpers.
//!
//! Grounded in Ichnaea's `geocode.py` for the exact `region()` tie-break
//! algorithm, `rstar` usage adapted from `meilisearch`'s `geo_sort.rs` for
//! the spatial index, and `geo`'s `Contains`/`Haversine` traits (already
//! pulled in via `db/transmitter.rs`) for point-in-polygon and distance.
//!
//! See DESIGN.md for why "buffered shape" containment here is computed as
//! exact containment OR a boundary-distance threshold, rather than by
//! materializing an enlarged polygon: no buffering crate is available.
pub mod data;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use geo::{Contains, Distance, Haversine, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};

use crate::constants::REGION_BUFFER_DEGREES;

const METERS_PER_DEGREE: f64 = 111_320.0;

/// `PS -> XW` per `ichnaea/geocode.py`'s `MCC_GENC_SHAPEFILE_MAP`: the West
/// Bank/Gaza MCC range reports under the GENC alias `XW`, not the ISO code
/// `PS`.
fn genc_alias(code: &str) -> &str {
    match code {
        "PS" => "XW",
        other => other,
    }
}

/// A tiny slice of the ITU MCC table, enough to resolve the MCCs exercised
/// by spec §8's scenarios. A production deployment would load the full
/// `mobile_codes`-equivalent table; this core treats that table as static
/// data, not a dependency of the algorithm.
fn mcc_table(mcc: u16) -> &'static [&'static str] {
    match mcc {
        234 | 235 => &["GB"],
        402 => &["BT"],
        208 | 340 => &["FR"],
        _ => &[],
    }
}

struct RegionEnvelope {
    min: [f64; 2],
    max: [f64; 2],
    code: String,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

pub struct Geocoder {
    shapes: HashMap<String, MultiPolygon<f64>>,
    radii: HashMap<String, f64>,
    tree: RTree<RegionEnvelope>,
    valid_regions: HashSet<String>,
}

impl Geocoder {
    pub fn from_table(table: data::RegionTable) -> Self {
        let mut shapes = HashMap::new();
        let mut radii = HashMap::new();
        let mut envelopes = Vec::new();

        for (code, (shape, radius)) in table {
            for polygon in &shape.0 {
                let (min, max) = polygon_envelope(polygon);
                envelopes.push(RegionEnvelope {
                    min: [min.0 - REGION_BUFFER_DEGREES, min.1 - REGION_BUFFER_DEGREES],
                    max: [max.0 + REGION_BUFFER_DEGREES, max.1 + REGION_BUFFER_DEGREES],
                    code: code.clone(),
                });
            }
            radii.insert(code.clone(), radius);
            shapes.insert(code.clone(), shape);
        }

        let valid_regions = shapes.keys().cloned().collect();
        Self { shapes, radii, tree: RTree::bulk_load(envelopes), valid_regions }
    }

    pub fn load_embedded_test_dataset() -> Self {
        let table = data::load_from_geojson_str(data::EMBEDDED_TEST_REGIONS, None)
            .expect("embedded region dataset must parse");
        Self::from_table(table)
    }

    pub fn load_from_gzip_file(path: &Path, valid_regions: Option<&HashSet<String>>) -> Result<Self> {
        let table = data::load_from_gzip_file(path, valid_regions)?;
        Ok(Self::from_table(table))
    }

    pub fn valid_regions(&self) -> &HashSet<String> {
        &self.valid_regions
    }

    fn candidates(&self, lon: f64, lat: f64) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for envelope in self.tree.locate_in_envelope_intersecting(&AABB::from_point([lon, lat])) {
            if seen.insert(envelope.code.clone()) {
                ordered.push(envelope.code.clone());
            }
        }
        ordered
    }

    fn contains_exact(&self, code: &str, point: Point<f64>) -> bool {
        self.shapes.get(code).is_some_and(|shape| shape.contains(&point))
    }

    fn contains_buffered(&self, code: &str, point: Point<f64>) -> bool {
        let Some(shape) = self.shapes.get(code) else { return false };
        if shape.contains(&point) {
            return true;
        }
        boundary_distance_meters(shape, point) <= REGION_BUFFER_DEGREES * METERS_PER_DEGREE
    }

    /// Reverse-geocode a point to a region code. See
    /// `ichnaea/geocode.py::region` for the exact tie-break this mirrors.
    pub fn region(&self, lat: f64, lon: f64) -> Option<String> {
        let point = Point::new(lon, lat);
        let candidates = self.candidates(lon, lat);

        let survivors: Vec<String> = candidates.into_iter().filter(|c| self.contains_buffered(c, point)).collect();

        match survivors.len() {
            0 => return None,
            1 => return Some(survivors[0].clone()),
            _ => {}
        }

        let exact_matches: Vec<String> = survivors.iter().filter(|c| self.contains_exact(c, point)).cloned().collect();

        if exact_matches.len() == 1 {
            return Some(exact_matches[0].clone());
        }

        if exact_matches.is_empty() {
            self.nearest_by_boundary_distance(&survivors, point, true)
        } else {
            self.nearest_by_boundary_distance(&exact_matches, point, false)
        }
    }

    /// `take_min`: true picks the nearest boundary (outside case), false
    /// picks the farthest (inside / "most inside" case). Ties on the exact
    /// distance value resolve to the last candidate encountered, matching
    /// the Python dict's "later write wins" behavior (spec §9).
    fn nearest_by_boundary_distance(&self, candidates: &[String], point: Point<f64>, take_min: bool) -> Option<String> {
        let mut distances: Vec<(f64, String)> = Vec::new();
        for code in candidates {
            let Some(shape) = self.shapes.get(code) else { continue };
            let distance = boundary_distance_meters(shape, point);
            if let Some(entry) = distances.iter_mut().find(|(d, _)| *d == distance) {
                entry.1 = code.clone();
            } else {
                distances.push((distance, code.clone()));
            }
        }
        let picked = if take_min {
            distances.into_iter().min_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
        } else {
            distances.into_iter().max_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
        };
        picked.map(|(_, code)| code)
    }

    pub fn any_region(&self, lat: f64, lon: f64) -> bool {
        let point = Point::new(lon, lat);
        self.candidates(lon, lat).iter().any(|c| self.contains_buffered(c, point))
    }

    pub fn in_region(&self, lat: f64, lon: f64, code: &str) -> bool {
        self.contains_buffered(code, Point::new(lon, lat))
    }

    pub fn regions_for_mcc(&self, mcc: u16) -> Vec<String> {
        mcc_table(mcc)
            .iter()
            .map(|code| genc_alias(code).to_string())
            .filter(|code| self.valid_regions.contains(code))
            .collect()
    }

    pub fn region_for_cell(&self, lat: f64, lon: f64, mcc: u16) -> Option<String> {
        let point = Point::new(lon, lat);
        let candidates: Vec<String> =
            self.regions_for_mcc(mcc).into_iter().filter(|code| self.contains_buffered(code, point)).collect();

        match candidates.len() {
            1 => Some(candidates[0].clone()),
            _ => self.region(lat, lon),
        }
    }

    pub fn region_max_radius(&self, code: &str) -> Option<f64> {
        self.radii.get(code).copied()
    }
}

fn polygon_envelope(polygon: &geo::Polygon<f64>) -> ((f64, f64), (f64, f64)) {
    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for coord in polygon.exterior().coords() {
        min.0 = min.0.min(coord.x);
        min.1 = min.1.min(coord.y);
        max.0 = max.0.max(coord.x);
        max.1 = max.1.max(coord.y);
    }
    (min, max)
}

fn boundary_distance_meters(shape: &MultiPolygon<f64>, point: Point<f64>) -> f64 {
    let mut min_distance = f64::INFINITY;
    for polygon in &shape.0 {
        for coord in polygon.exterior().coords() {
            let boundary_point = Point::new(coord.x, coord.y);
            min_distance = min_distance.min(Haversine::distance(point, boundary_point));
        }
        for interior in polygon.interiors() {
            for coord in interior.coords() {
                let boundary_point = Point::new(coord.x, coord.y);
                min_distance = min_distance.min(Haversine::distance(point, boundary_point));
            }
        }
    }
    min_distance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_resolves_london_to_gb() {
        let geocoder = Geocoder::load_embedded_test_dataset();
        assert_eq!(geocoder.region(51.5, -0.1), Some("GB".to_string()));
    }

    #[test]
    fn region_returns_none_in_gulf_of_guinea() {
        let geocoder = Geocoder::load_embedded_test_dataset();
        assert_eq!(geocoder.region(0.0, 0.0), None);
    }

    #[test]
    fn in_region_is_true_whenever_region_returns_it() {
        let geocoder = Geocoder::load_embedded_test_dataset();
        for &(lat, lon) in &[(51.5, -0.1), (27.5, 90.4), (46.0, 2.0)] {
            if let Some(code) = geocoder.region(lat, lon) {
                assert!(geocoder.in_region(lat, lon, &code));
            }
        }
    }

    #[test]
    fn region_max_radius_is_positive_for_all_valid_regions() {
        let geocoder = Geocoder::load_embedded_test_dataset();
        for code in geocoder.valid_regions().clone() {
            assert!(geocoder.region_max_radius(&code).unwrap() > 0.0);
        }
    }

    #[test]
    fn regions_for_mcc_contains_gb_for_uk_mcc() {
        let geocoder = Geocoder::load_embedded_test_dataset();
        assert!(geocoder.regions_for_mcc(234).contains(&"GB".to_string()));
    }

    #[test]
    fn region_for_cell_falls_back_to_region_when_mcc_hint_empty() {
        let geocoder = Geocoder::load_embedded_test_dataset();
        // mcc 999 has no table entry, so region_for_cell must fall back to region().
        assert_eq!(geocoder.region_for_cell(51.5, -0.1, 999), Some("GB".to_string()));
    }
}
