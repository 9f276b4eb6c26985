// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration formatting and tolerant timestamp (de)serialization.

use chrono::DateTime;
use serde::{Deserialize, Deserializer};

/// Format a millisecond duration for logs and error text: `850ms`, `42s`, `3m 5s`, `2h 10m`.
pub fn format_elapsed_ms(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{ms}ms");
    }
    let secs = ms / 1_000;
    if secs < 60 {
        return format!("{secs}s");
    }
    let (mins, rem_secs) = (secs / 60, secs % 60);
    if mins < 60 {
        return if rem_secs == 0 { format!("{mins}m") } else { format!("{mins}m {rem_secs}s") };
    }
    let (hours, rem_mins) = (mins / 60, mins % 60);
    if rem_mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {rem_mins}m")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(u64),
    Float(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

impl RawTimestamp {
    fn into_ms(self) -> Option<u64> {
        match self {
            RawTimestamp::Millis(ms) => Some(ms),
            RawTimestamp::Float(f) if f.is_finite() && f >= 0.0 => Some(f as u64),
            RawTimestamp::Float(_) => None,
            RawTimestamp::Text(s) => {
                DateTime::parse_from_rfc3339(s.trim()).ok().map(|dt| dt.timestamp_millis().max(0) as u64)
            }
            RawTimestamp::Other(_) => None,
        }
    }
}

/// Deserialize an epoch-millisecond timestamp that may also be written as an
/// RFC 3339 string. Unparseable values become `0` (normalized by the loader).
pub fn de_epoch_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(raw.and_then(RawTimestamp::into_ms).unwrap_or(0))
}

/// Optional variant of [`de_epoch_ms`]; `null` and garbage become `None`.
pub fn de_opt_epoch_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(raw.and_then(RawTimestamp::into_ms))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
