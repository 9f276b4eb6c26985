// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calendar view of an epoch minute in the configured zone.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

/// Zone cron expressions are evaluated in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CronZone {
    #[default]
    Local,
    Utc,
}

cadence_core::simple_display! {
    CronZone {
        Local => "local",
        Utc => "utc",
    }
}

/// Calendar fields of one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteParts {
    pub minute: u32,
    pub hour: u32,
    pub day_of_month: u32,
    pub month: u32,
    /// 0 = Sunday.
    pub day_of_week: u32,
}

impl CronZone {
    pub fn parts(self, epoch_minute: i64) -> MinuteParts {
        match self {
            CronZone::Local => parts_of(&Local.from_utc_datetime(&utc(epoch_minute).naive_utc())),
            CronZone::Utc => parts_of(&utc(epoch_minute)),
        }
    }

    /// `YYYY-MM-DDTHH:MM` in this zone.
    pub fn minute_key(self, epoch_minute: i64) -> String {
        const FMT: &str = "%Y-%m-%dT%H:%M";
        match self {
            CronZone::Local => {
                Local.from_utc_datetime(&utc(epoch_minute).naive_utc()).format(FMT).to_string()
            }
            CronZone::Utc => utc(epoch_minute).format(FMT).to_string(),
        }
    }
}

/// RFC 3339 timestamp of an epoch minute, in UTC.
pub fn minute_rfc3339(epoch_minute: i64) -> String {
    utc(epoch_minute).to_rfc3339()
}

fn utc(epoch_minute: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch_minute.saturating_mul(60), 0).unwrap_or_default()
}

fn parts_of<Tz: TimeZone>(dt: &DateTime<Tz>) -> MinuteParts {
    MinuteParts {
        minute: dt.minute(),
        hour: dt.hour(),
        day_of_month: dt.day(),
        month: dt.month(),
        day_of_week: dt.weekday().num_days_from_sunday(),
    }
}
