//! Byte-size constants and human data-size strings ("20GiB", "512 MB")

use crate::utils::error::{LayoutError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer, Visitor};
use std::fmt;

pub const KILOBYTE: u64 = 1000;
pub const MEGABYTE: u64 = KILOBYTE * 1000;
pub const GIGABYTE: u64 = MEGABYTE * 1000;
pub const TERABYTE: u64 = GIGABYTE * 1000;

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+)\s*([A-Za-z]*)\s*$").expect("data size regex is valid")
});

static DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("digits regex is valid"));

fn unit_multiple(unit: &str) -> Option<u64> {
    let multiple = match unit {
        "" => 1,
        "kB" => KILOBYTE,
        "KiB" => KIB,
        "MB" => MEGABYTE,
        "MiB" => MIB,
        "GB" => GIGABYTE,
        "GiB" => GIB,
        "TB" => TERABYTE,
        "TiB" => TIB,
        _ => return None,
    };
    Some(multiple)
}

/// Parse a data size string into a byte count.
///
/// Units are case sensitive; a bare number is taken as bytes.
pub fn parse_data_size(size: &str) -> Result<u64> {
    if !DIGITS_RE.is_match(size) {
        return Err(LayoutError::DataSize(format!(
            "the size string doesn't contain any number: {}",
            size
        )));
    }

    let unknown_unit =
        || LayoutError::DataSize(format!("unknown data size units in string: {}", size));

    let caps = SIZE_RE.captures(size).ok_or_else(unknown_unit)?;
    let multiple = unit_multiple(&caps[2]).ok_or_else(unknown_unit)?;

    let number: u64 = caps[1].parse().map_err(|_| {
        LayoutError::DataSize(format!("data size is out of range: {}", size))
    })?;

    number
        .checked_mul(multiple)
        .ok_or_else(|| LayoutError::DataSize(format!("data size is out of range: {}", size)))
}

/// Round `value` up to the next multiple of `grain`.
///
/// `None` when the result does not fit in a `u64` or `grain` is zero.
pub fn align_up(value: u64, grain: u64) -> Option<u64> {
    value.checked_next_multiple_of(grain)
}

pub(crate) fn is_zero(value: &u64) -> bool {
    *value == 0
}

struct DataSizeVisitor;

impl<'de> Visitor<'de> for DataSizeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a byte count or a data size string such as \"20GiB\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("minsize cannot be negative: {}", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<u64, E> {
        if v < 0.0 || v.fract() != 0.0 || v >= u64::MAX as f64 {
            return Err(E::custom(format!("minsize must be a whole byte count: {}", v)));
        }
        Ok(v as u64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u64, E> {
        parse_data_size(v).map_err(E::custom)
    }
}

/// `deserialize_with` helper accepting either an integer or a size string
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DataSizeVisitor)
}
