//! Canonical, validated beacon identifiers with a total "better-than" order.
//!
//! Grounded in `db/model.rs`'s `Transmitter` enum (tagged variant
//! over Cell/Wifi/Bluetooth) and `services/helper/macaddr.rs` (MAC parsing),
//! generalized to the four lookup shapes spec §3 describes plus their
//! `better()` dedup relation (§4.2, §9 "tagged-variant Lookup").
use std::collections::HashMap;

use crate::constants::RadioType;

fn in_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    value >= min && value <= max
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIdentity {
    pub radio: RadioTypeKey,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub cid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAreaIdentity {
    pub radio: RadioTypeKey,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
}

/// `RadioType` is not `Hash` via strum derives alone on this version of the
/// crate's dependency surface, so lookups key on this small mirror instead of
/// deriving `Hash` on the public display enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioTypeKey {
    Gsm,
    Cdma,
    Wcdma,
    Lte,
}

impl From<RadioType> for RadioTypeKey {
    fn from(r: RadioType) -> Self {
        match r {
            RadioType::Gsm => RadioTypeKey::Gsm,
            RadioType::Cdma => RadioTypeKey::Cdma,
            RadioType::Wcdma => RadioTypeKey::Wcdma,
            RadioType::Lte => RadioTypeKey::Lte,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellLookup {
    pub radio: RadioType,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub cid: u32,
    pub psc: Option<u16>,
    pub signal: Option<i32>,
    pub ta: Option<u32>,
    pub age: Option<i64>,
}

impl CellLookup {
    pub fn create(
        radio: RadioType,
        mcc: u16,
        mnc: u16,
        lac: u32,
        cid: u32,
        psc: Option<u16>,
        signal: Option<i32>,
        ta: Option<u32>,
        age: Option<i64>,
    ) -> Option<Self> {
        if !in_range(mcc, 200, 999) || !in_range(mnc, 0, 999) {
            return None;
        }
        if !in_range(lac, 1, 65535) || !in_range(cid, 0, 268_435_455) {
            return None;
        }
        if let Some(psc) = psc {
            if !in_range(psc, 0, 511) {
                return None;
            }
        }
        Some(Self { radio, mcc, mnc, lac, cid, psc, signal, ta, age })
    }

    pub fn identity(&self) -> CellIdentity {
        CellIdentity { radio: self.radio.into(), mcc: self.mcc, mnc: self.mnc, lac: self.lac, cid: self.cid }
    }

    pub fn better(&self, other: &Self) -> bool {
        better_by_signal_age_ta(self.signal, other.signal, self.age, other.age, self.ta, other.ta)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellAreaLookup {
    pub radio: RadioType,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub signal: Option<i32>,
    pub age: Option<i64>,
}

impl CellAreaLookup {
    pub fn create(radio: RadioType, mcc: u16, mnc: u16, lac: u32, signal: Option<i32>, age: Option<i64>) -> Option<Self> {
        if !in_range(mcc, 200, 999) || !in_range(mnc, 0, 999) || !in_range(lac, 1, 65535) {
            return None;
        }
        Some(Self { radio, mcc, mnc, lac, signal, age })
    }

    pub fn identity(&self) -> CellAreaIdentity {
        CellAreaIdentity { radio: self.radio.into(), mcc: self.mcc, mnc: self.mnc, lac: self.lac }
    }

    pub fn better(&self, other: &Self) -> bool {
        better_by_signal_age_ta(self.signal, other.signal, self.age, other.age, None, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WifiLookup {
    pub mac: String,
    pub signal: Option<i32>,
    pub snr: Option<i32>,
    pub channel: Option<u16>,
    pub frequency: Option<u32>,
    pub age: Option<i64>,
    pub ssid: Option<String>,
}

impl WifiLookup {
    /// Normalizes `mac` (colon-optional, any case) to lowercase 12 hex
    /// digits, matching `custom_deserialize::mac_address`
    /// normalization. Returns `None` if the result isn't exactly 12 hex
    /// digits.
    pub fn create(
        mac: &str,
        signal: Option<i32>,
        snr: Option<i32>,
        channel: Option<u16>,
        frequency: Option<u32>,
        age: Option<i64>,
        ssid: Option<String>,
    ) -> Option<Self> {
        let cleaned: String = mac.chars().filter(|c| *c != ':' && *c != '-').collect();
        if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let mac = cleaned.to_lowercase();
        Some(Self { mac, signal, snr, channel, frequency, age, ssid })
    }

    pub fn identity(&self) -> &str {
        &self.mac
    }

    pub fn better(&self, other: &Self) -> bool {
        better_by_signal_age_ta(self.signal, other.signal, self.age, other.age, None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FallbackLookup {
    pub lacf: bool,
    pub ipf: bool,
}

impl FallbackLookup {
    /// `considerIp` defaults `ipf` to true; unknown keys are silently
    /// dropped by whoever builds this from a raw map (the HTTP schema
    /// layer), not here.
    pub fn with_defaults(lacf: bool, ipf: bool) -> Self {
        Self { lacf, ipf }
    }
}

fn better_by_signal_age_ta(
    signal: Option<i32>,
    other_signal: Option<i32>,
    age: Option<i64>,
    other_age: Option<i64>,
    ta: Option<u32>,
    other_ta: Option<u32>,
) -> bool {
    match (signal, other_signal) {
        (Some(a), Some(b)) if a != b => return a > b,
        (Some(_), None) => return true,
        (None, Some(_)) => return false,
        _ => {}
    }
    match (age, other_age) {
        (Some(a), Some(b)) if a != b => return a < b,
        (Some(_), None) => return true,
        (None, Some(_)) => return false,
        _ => {}
    }
    match (ta, other_ta) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Insertion-order-preserving dedup map: a later lookup replaces the stored
/// one only if strictly `better`, matching
/// `OrderedDict`-replacement idiom from spec §9.
pub struct OrderedDedup<K, V> {
    order: Vec<K>,
    by_key: HashMap<K, V>,
}

impl<K: std::hash::Hash + Eq + Clone, V> OrderedDedup<K, V> {
    pub fn new() -> Self {
        Self { order: Vec::new(), by_key: HashMap::new() }
    }

    /// Inserts `value` under `key`; if an entry already exists, keeps it
    /// unless `is_better(&value, &existing)` is true.
    pub fn insert_or_replace(&mut self, key: K, value: V, is_better: impl Fn(&V, &V) -> bool) {
        match self.by_key.get(&key) {
            None => {
                self.order.push(key.clone());
                self.by_key.insert(key, value);
            }
            Some(existing) => {
                if is_better(&value, existing) {
                    self.by_key.insert(key, value);
                }
            }
        }
    }

    pub fn into_values(self) -> Vec<V> {
        self.order.into_iter().filter_map(|k| self.by_key.get(&k).cloned()).collect()
    }
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> Default for OrderedDedup<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_lookup_normalizes_mac() {
        let lookup = WifiLookup::create("AA:BB:CC:DD:EE:FF", Some(-60), None, None, None, None, None).unwrap();
        assert_eq!(lookup.mac, "aabbccddeeff");
        let lookup2 = WifiLookup::create("aabbccddeeff", Some(-60), None, None, None, None, None).unwrap();
        assert_eq!(lookup.mac, lookup2.mac);
    }

    #[test]
    fn wifi_lookup_rejects_malformed_mac() {
        assert!(WifiLookup::create("not-a-mac", None, None, None, None, None, None).is_none());
    }

    #[test]
    fn better_prefers_higher_signal() {
        let a = CellLookup::create(RadioType::Lte, 234, 15, 1000, 1, None, Some(-70), None, None).unwrap();
        let b = CellLookup::create(RadioType::Lte, 234, 15, 1000, 1, None, Some(-90), None, None).unwrap();
        assert!(a.better(&b));
        assert!(!b.better(&a));
    }

    #[test]
    fn better_falls_back_to_age_then_ta() {
        let a = CellLookup::create(RadioType::Lte, 234, 15, 1000, 1, None, None, Some(5), Some(10)).unwrap();
        let b = CellLookup::create(RadioType::Lte, 234, 15, 1000, 1, None, None, Some(2), Some(20)).unwrap();
        assert!(a.better(&b)); // lower age wins when signal ties (both none)
    }

    #[test]
    fn cell_validation_rejects_out_of_range() {
        assert!(CellLookup::create(RadioType::Gsm, 50, 1, 1, 1, None, None, None, None).is_none());
        assert!(CellAreaLookup::create(RadioType::Gsm, 234, 15, 0, None, None).is_none());
    }

    #[test]
    fn ordered_dedup_keeps_first_unless_better() {
        let mut dedup = OrderedDedup::new();
        dedup.insert_or_replace("k", 1i32, |a, b| a > b);
        dedup.insert_or_replace("k", 5i32, |a, b| a > b);
        dedup.insert_or_replace("k", 3i32, |a, b| a > b);
        assert_eq!(dedup.into_values(), vec![5]);
    }
}
