//! Deduplication fingerprint for nutrient foods.
//!
//! Natural keys (upc, ndb_no, nix ids) are frequently absent from
//! upstream payloads, so rows are keyed by a deterministic hash over
//! the identifying field subset instead. Two payloads that normalize
//! to the same fingerprint are the same logical food.

use sha2::{Digest, Sha256};

/// The identifying field subset, in hashing order.
#[derive(Debug, Default, Clone)]
pub struct FingerprintInput<'a> {
    pub food_name: Option<&'a str>,
    pub brand_name: Option<&'a str>,
    pub serving_unit: Option<&'a str>,
    pub serving_qty: Option<f64>,
    pub upc: Option<&'a str>,
    pub ndb_no: Option<i64>,
}

/// Lower-cased, trimmed fields joined with `|`, SHA-256, hex digest.
/// Absent fields contribute an empty string so the shape is stable.
pub fn compute(input: &FingerprintInput<'_>) -> String {
    let base = [
        norm_text(input.food_name),
        norm_text(input.brand_name),
        norm_text(input.serving_unit),
        input.serving_qty.map(fmt_qty).unwrap_or_default(),
        norm_text(input.upc),
        input.ndb_no.map(|n| n.to_string()).unwrap_or_default(),
    ]
    .join("|");

    hex::encode(Sha256::digest(base.as_bytes()))
}

fn norm_text(v: Option<&str>) -> String {
    v.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

// Integral quantities render without a trailing ".0" so that 2 and 2.0
// in the payload agree.
fn fmt_qty(q: f64) -> String {
    q.to_string()
}
