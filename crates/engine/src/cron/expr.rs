// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Five-field cron expressions.
//!
//! Fields: minute hour day-of-month month day-of-week. Each accepts `*`,
//! values, `a-b` ranges, `*/n` / `a-b/n` / `a/n` steps and comma lists.
//! Months and weekdays also accept three-letter names. Day-of-week 7 is
//! Sunday. `?` is a wildcard in the two day fields.

use super::zone::MinuteParts;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronParseError {
    #[error("empty expression")]
    Empty,
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("unknown macro '{0}'")]
    UnknownMacro(String),
    #[error("{field}: invalid value '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("{field}: {value} is outside {min}-{max}")]
    OutOfRange { field: &'static str, value: u32, min: u32, max: u32 },
    #[error("{field}: range {start}-{end} is inverted")]
    InvertedRange { field: &'static str, start: u32, end: u32 },
    #[error("{field}: step must be at least 1")]
    ZeroStep { field: &'static str },
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    allow_question: bool,
}

const MONTH_NAMES: &[&str] =
    &["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"];
const DAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

const MINUTE: FieldSpec =
    FieldSpec { name: "minute", min: 0, max: 59, names: &[], allow_question: false };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], allow_question: false };
const DAY_OF_MONTH: FieldSpec =
    FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], allow_question: true };
const MONTH: FieldSpec =
    FieldSpec { name: "month", min: 1, max: 12, names: MONTH_NAMES, allow_question: false };
// 7 is accepted and folded onto 0 (Sunday).
const DAY_OF_WEEK: FieldSpec =
    FieldSpec { name: "day-of-week", min: 0, max: 7, names: DAY_NAMES, allow_question: true };

/// Accepted values of one field as a bitset, plus whether it was a bare wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronField {
    bits: u64,
    wildcard: bool,
}

impl CronField {
    pub fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    /// True only for a bare `*` / `?`; `*/n` counts as a restriction.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..64).filter(|v| self.contains(*v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
}

impl CronExpr {
    pub fn parse(source: &str) -> Result<Self, CronParseError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(CronParseError::Empty);
        }
        let expanded = if trimmed.starts_with('@') { expand_macro(trimmed)? } else { trimmed };
        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(CronParseError::FieldCount(fields.len()));
        };

        let mut day_of_week = parse_field(dow, DAY_OF_WEEK)?;
        if day_of_week.contains(7) {
            day_of_week.bits = (day_of_week.bits & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            minute: parse_field(minute, MINUTE)?,
            hour: parse_field(hour, HOUR)?,
            day_of_month: parse_field(dom, DAY_OF_MONTH)?,
            month: parse_field(month, MONTH)?,
            day_of_week,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the expression fires at the given minute.
    ///
    /// Day-of-month and day-of-week follow the traditional cron rule: when
    /// either is a bare wildcard only the other constrains; when both are
    /// restricted a match on either fires.
    pub fn matches(&self, at: &MinuteParts) -> bool {
        if !(self.minute.contains(at.minute)
            && self.hour.contains(at.hour)
            && self.month.contains(at.month))
        {
            return false;
        }
        let dom = self.day_of_month.contains(at.day_of_month);
        let dow = self.day_of_week.contains(at.day_of_week);
        match (self.day_of_month.is_wildcard(), self.day_of_week.is_wildcard()) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for CronExpr {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn expand_macro(name: &str) -> Result<&'static str, CronParseError> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        _ => return Err(CronParseError::UnknownMacro(name.to_string())),
    })
}

fn parse_field(raw: &str, spec: FieldSpec) -> Result<CronField, CronParseError> {
    if raw == "*" || (spec.allow_question && raw == "?") {
        return Ok(CronField { bits: range_bits(spec.min, spec.max, 1), wildcard: true });
    }
    let mut bits = 0u64;
    for part in raw.split(',') {
        bits |= parse_part(part, spec)?;
    }
    Ok(CronField { bits, wildcard: false })
}

fn parse_part(part: &str, spec: FieldSpec) -> Result<u64, CronParseError> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => {
            let step = step.parse::<u32>().map_err(|_| invalid(spec, part))?;
            if step == 0 {
                return Err(CronParseError::ZeroStep { field: spec.name });
            }
            (base, Some(step))
        }
        None => (part, None),
    };

    let (start, end) = if base == "*" {
        (spec.min, spec.max)
    } else if let Some((a, b)) = base.split_once('-') {
        let (start, end) = (parse_value(a, spec)?, parse_value(b, spec)?);
        if start > end {
            return Err(CronParseError::InvertedRange { field: spec.name, start, end });
        }
        (start, end)
    } else {
        let value = parse_value(base, spec)?;
        // `a/n` runs from a to the end of the field.
        (value, if step.is_some() { spec.max } else { value })
    };

    Ok(range_bits(start, end, step.unwrap_or(1)))
}

fn parse_value(raw: &str, spec: FieldSpec) -> Result<u32, CronParseError> {
    if raw.is_empty() {
        return Err(invalid(spec, raw));
    }
    let value = match raw.parse::<u32>() {
        Ok(v) => v,
        Err(_) => {
            let upper = raw.to_ascii_uppercase();
            let index = spec.names.iter().position(|n| *n == upper).ok_or_else(|| invalid(spec, raw))?;
            // Month names are 1-based, weekday names 0-based.
            index as u32 + if spec.min == 1 { 1 } else { 0 }
        }
    };
    if value < spec.min || value > spec.max {
        return Err(CronParseError::OutOfRange {
            field: spec.name,
            value,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(value)
}

fn invalid(spec: FieldSpec, raw: &str) -> CronParseError {
    CronParseError::InvalidValue { field: spec.name, value: raw.to_string() }
}

fn range_bits(start: u32, end: u32, step: u32) -> u64 {
    (start..=end).step_by(step as usize).fold(0u64, |acc, v| acc | (1 << v))
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
