//! Best-effort locate results and their ordered accumulation. Mirrors
//! `db/transmitter.rs`'s `TransmitterLocation` weighted-accumulation idiom,
//! but for whole-pipeline results instead of single station fixes.
use strum_macros::{AsRefStr, Display, EnumString};

use crate::constants::{ACCURACY_HIGH_MAX_METERS, ACCURACY_LOW_MAX_METERS, ACCURACY_MEDIUM_MAX_METERS, DataSource};

/// Coarse accuracy band, totally ordered `High < Medium < Low < None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, AsRefStr)]
pub enum DataAccuracy {
    #[strum(serialize = "high")]
    High,
    #[strum(serialize = "medium")]
    Medium,
    #[strum(serialize = "low")]
    Low,
    #[strum(serialize = "none")]
    None,
}

impl DataAccuracy {
    /// Bucket a position accuracy in meters into a band.
    pub fn from_meters(accuracy: f64) -> Self {
        if accuracy <= ACCURACY_HIGH_MAX_METERS {
            DataAccuracy::High
        } else if accuracy <= ACCURACY_MEDIUM_MAX_METERS {
            DataAccuracy::Medium
        } else if accuracy <= ACCURACY_LOW_MAX_METERS {
            DataAccuracy::Low
        } else {
            DataAccuracy::None
        }
    }

    /// Region results never claim better than `Low`.
    pub fn region_band(found: bool) -> Self {
        if found { DataAccuracy::Low } else { DataAccuracy::None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Result {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub accuracy: Option<f64>,
    pub region_code: Option<String>,
    pub region_name: Option<String>,
    pub score: f64,
    pub source: Option<DataSource>,
    pub fallback: Option<String>,
}

impl Result {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn position(lat: f64, lon: f64, accuracy: f64, score: f64, source: DataSource) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            accuracy: Some(accuracy),
            region_code: None,
            region_name: None,
            score,
            source: Some(source),
            fallback: None,
        }
    }

    pub fn region(code: impl Into<String>, name: Option<String>, score: f64, source: DataSource) -> Self {
        Self {
            lat: None,
            lon: None,
            accuracy: None,
            region_code: Some(code.into()),
            region_name: name,
            score,
            source: Some(source),
            fallback: None,
        }
    }

    /// Tags a result with how it was obtained, e.g. `FallbackSource`
    /// distinguishing a cache hit from a live call to the external service
    /// (spec §4.4's cache lifecycle). `None` for sources that don't need it.
    pub fn with_fallback_tag(mut self, tag: impl Into<String>) -> Self {
        self.fallback = Some(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_none() && self.region_code.is_none()
    }

    pub fn data_accuracy(&self) -> DataAccuracy {
        if self.is_empty() {
            return DataAccuracy::None;
        }
        if let Some(accuracy) = self.accuracy {
            DataAccuracy::from_meters(accuracy)
        } else {
            DataAccuracy::region_band(self.region_code.is_some())
        }
    }
}

/// Insertion-ordered collection of `Result`s. `best()` picks the
/// highest-score non-empty result, breaking ties by earliest insertion
/// (stable, per spec §5 "Ordering guarantees").
#[derive(Debug, Clone, Default)]
pub struct ResultList {
    results: Vec<Result>,
}

impl ResultList {
    pub fn new() -> Self {
        Self { results: Vec::new() }
    }

    pub fn add(&mut self, result: Result) {
        self.results.push(result);
    }

    pub fn best(&self) -> Result {
        self.results
            .iter()
            .filter(|r| !r.is_empty())
            .fold(None, |acc: Option<&Result>, r| match acc {
                None => Some(r),
                Some(best) if r.score > best.score => Some(r),
                Some(best) => Some(best),
            })
            .cloned()
            .unwrap_or_else(Result::empty)
    }

    pub fn satisfies(&self, expected_accuracy: DataAccuracy) -> bool {
        self.best().data_accuracy() <= expected_accuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_bands_match_thresholds() {
        assert_eq!(DataAccuracy::from_meters(10.0), DataAccuracy::High);
        assert_eq!(DataAccuracy::from_meters(500.0), DataAccuracy::High);
        assert_eq!(DataAccuracy::from_meters(25_000.0), DataAccuracy::Medium);
        assert_eq!(DataAccuracy::from_meters(1_000_000.0), DataAccuracy::Low);
        assert_eq!(DataAccuracy::from_meters(50_000_000.0), DataAccuracy::None);
    }

    #[test]
    fn ordering_is_high_best() {
        assert!(DataAccuracy::High < DataAccuracy::Medium);
        assert!(DataAccuracy::Medium < DataAccuracy::Low);
        assert!(DataAccuracy::Low < DataAccuracy::None);
    }

    #[test]
    fn best_picks_highest_score_ignoring_empties() {
        let mut list = ResultList::new();
        list.add(Result::empty());
        list.add(Result::position(51.5, -0.1, 25_000.0, 0.6, DataSource::GeoIp));
        list.add(Result::position(51.6, -0.2, 5_000.0, 0.4, DataSource::Fallback));
        let best = list.best();
        assert_eq!(best.source, Some(DataSource::GeoIp));
    }

    #[test]
    fn satisfies_compares_against_expected_accuracy() {
        let mut list = ResultList::new();
        list.add(Result::position(51.5, -0.1, 25_000.0, 0.6, DataSource::GeoIp));
        assert!(list.satisfies(DataAccuracy::Low));
        assert!(!list.satisfies(DataAccuracy::High));
    }
}
