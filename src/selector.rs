use serde::Serialize;
use std::collections::BTreeMap;

use crate::decoder::TableValue;

pub const BUYOUT_FIELD: &str = "buyoutAmount";

/// One auction listing from the latest scan. Fields are passed through as decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Item {
    fields: BTreeMap<String, TableValue>,
}

impl Item {
    pub fn new(fields: BTreeMap<String, TableValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&TableValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, TableValue> {
        &self.fields
    }

    pub fn buyout_amount(&self) -> Option<f64> {
        self.get(BUYOUT_FIELD).and_then(TableValue::as_f64)
    }

    pub fn is_sellable(&self) -> bool {
        self.buyout_amount().map_or(false, |amount| amount > 0.0)
    }
}

/// Pick the sellable items of the most recent scan.
///
/// Walks `auctions[max date key].scans[max timestamp].items[]` and keeps items
/// with a positive `buyoutAmount`, in their original order. Any missing key or
/// unexpected shape yields an empty result.
pub fn select_latest_items(tree: &TableValue) -> Vec<Item> {
    let Some(scan) = latest_date_bucket(tree).and_then(latest_scan) else {
        return Vec::new();
    };

    let Some(items) = scan.get("items").and_then(TableValue::as_sequence) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(TableValue::as_map)
        .map(|fields| Item::new(fields.clone()))
        .filter(Item::is_sellable)
        .collect()
}

/// The bucket under the lexicographically greatest date key.
///
/// Keys are compared as strings, which matches chronological order only for
/// zero-padded `YYYY-MM-DD` style keys.
pub fn latest_date_bucket(tree: &TableValue) -> Option<&TableValue> {
    // BTreeMap<String, _> iterates in byte-wise key order
    tree.get("auctions")?.as_map()?.values().next_back()
}

/// The scan with the greatest `timestamp`; the first one wins a tie.
/// A missing or non-numeric timestamp counts as zero.
pub fn latest_scan(bucket: &TableValue) -> Option<&TableValue> {
    let scans = bucket.get("scans")?.as_sequence()?;

    let mut latest: Option<(&TableValue, ScanTime)> = None;
    for scan in scans.iter().filter(|scan| scan.as_map().is_some()) {
        let timestamp = ScanTime::of(scan);
        match latest {
            Some((_, best)) if !timestamp.is_after(best) => {}
            _ => latest = Some((scan, timestamp)),
        }
    }

    latest.map(|(scan, _)| scan)
}

#[derive(Debug, Clone, Copy)]
enum ScanTime {
    Integer(i64),
    Float(f64),
}

impl ScanTime {
    fn of(scan: &TableValue) -> Self {
        match scan.get("timestamp") {
            Some(TableValue::Integer(n)) => ScanTime::Integer(*n),
            Some(TableValue::Float(f)) => ScanTime::Float(*f),
            _ => ScanTime::Integer(0),
        }
    }

    // Integers compare exactly; f64 only once a float is involved.
    fn is_after(self, other: ScanTime) -> bool {
        match (self, other) {
            (ScanTime::Integer(a), ScanTime::Integer(b)) => a > b,
            (a, b) => a.as_f64() > b.as_f64(),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            ScanTime::Integer(n) => n as f64,
            ScanTime::Float(f) => f,
        }
    }
}
