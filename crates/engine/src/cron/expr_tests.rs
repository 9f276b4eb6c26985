// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cron::CronZone;
use proptest::prelude::*;

fn at(minute: u32, hour: u32, day_of_month: u32, month: u32, day_of_week: u32) -> MinuteParts {
    MinuteParts { minute, hour, day_of_month, month, day_of_week }
}

fn expr(s: &str) -> CronExpr {
    CronExpr::parse(s).unwrap()
}

#[test]
fn every_minute_matches_anything() {
    let e = expr("* * * * *");
    assert!(e.matches(&at(0, 0, 1, 1, 0)));
    assert!(e.matches(&at(59, 23, 31, 12, 6)));
}

#[test]
fn weekday_mornings() {
    let e = expr("0 9 * * 1-5");
    assert!(e.matches(&at(0, 9, 15, 6, 1)));
    assert!(e.matches(&at(0, 9, 15, 6, 5)));
    assert!(!e.matches(&at(0, 9, 15, 6, 6)));
    assert!(!e.matches(&at(0, 9, 15, 6, 0)));
    assert!(!e.matches(&at(1, 9, 15, 6, 1)));
    assert!(!e.matches(&at(0, 10, 15, 6, 1)));
}

#[test]
fn restricted_day_fields_combine_with_or() {
    let e = expr("0 0 1 * 1");
    // 1st of the month, a Thursday
    assert!(e.matches(&at(0, 0, 1, 10, 4)));
    // a Monday that is not the 1st
    assert!(e.matches(&at(0, 0, 13, 10, 1)));
    // neither
    assert!(!e.matches(&at(0, 0, 14, 10, 2)));
    // right day, wrong time
    assert!(!e.matches(&at(30, 0, 1, 10, 4)));
}

#[test]
fn wildcard_day_field_leaves_the_other_in_charge() {
    let dom_only = expr("0 0 1 * *");
    assert!(dom_only.matches(&at(0, 0, 1, 3, 3)));
    assert!(!dom_only.matches(&at(0, 0, 2, 3, 1)));

    let dow_only = expr("0 0 ? * MON");
    assert!(dow_only.matches(&at(0, 0, 2, 3, 1)));
    assert!(!dow_only.matches(&at(0, 0, 1, 3, 3)));
}

#[test]
fn stepped_day_of_month_is_a_restriction() {
    let e = expr("0 0 */10 * 1");
    assert!(!e.day_of_month.is_wildcard());
    assert!(e.matches(&at(0, 0, 11, 1, 3)));
    assert!(e.matches(&at(0, 0, 5, 1, 1)));
    assert!(!e.matches(&at(0, 0, 5, 1, 3)));
}

#[yare::parameterized(
    list        = { "1,15,30 * * * *", &[1, 15, 30] },
    range       = { "10-13 * * * *",   &[10, 11, 12, 13] },
    step_all    = { "*/20 * * * *",    &[0, 20, 40] },
    step_range  = { "0-10/5 * * * *",  &[0, 5, 10] },
    step_start  = { "50/4 * * * *",    &[50, 54, 58] },
    mixed       = { "5,40-42 * * * *", &[5, 40, 41, 42] },
)]
fn minute_field_values(src: &str, expected: &[u32]) {
    assert_eq!(expr(src).minute.values().collect::<Vec<_>>(), expected);
}

#[yare::parameterized(
    seven_is_sunday = { "0 0 * * 7",       &[0] },
    names           = { "0 0 * * mon-FRI", &[1, 2, 3, 4, 5] },
    range_to_seven  = { "0 0 * * 5-7",     &[0, 5, 6] },
    star            = { "0 0 * * *",       &[0, 1, 2, 3, 4, 5, 6] },
)]
fn day_of_week_values(src: &str, expected: &[u32]) {
    assert_eq!(expr(src).day_of_week.values().collect::<Vec<_>>(), expected);
}

#[test]
fn month_names() {
    assert_eq!(expr("0 0 1 jan,Jun,DEC *").month.values().collect::<Vec<_>>(), vec![1, 6, 12]);
}

#[yare::parameterized(
    yearly   = { "@yearly",   "0 0 1 1 *" },
    annually = { "@ANNUALLY", "0 0 1 1 *" },
    monthly  = { "@monthly",  "0 0 1 * *" },
    weekly   = { "@weekly",   "0 0 * * 0" },
    daily    = { "@daily",    "0 0 * * *" },
    midnight = { "@midnight", "0 0 * * *" },
    hourly   = { "@hourly",   "0 * * * *" },
)]
fn macros_expand(src: &str, equivalent: &str) {
    let (a, b) = (expr(src), expr(equivalent));
    assert_eq!(
        (a.minute, a.hour, a.day_of_month, a.month, a.day_of_week),
        (b.minute, b.hour, b.day_of_month, b.month, b.day_of_week)
    );
    assert_eq!(a.source(), src);
}

#[yare::parameterized(
    empty        = { "   ",            CronParseError::Empty },
    too_few      = { "* * * *",        CronParseError::FieldCount(4) },
    too_many     = { "* * * * * *",    CronParseError::FieldCount(6) },
    macro_typo   = { "@dailly",        CronParseError::UnknownMacro("@dailly".into()) },
    minute_60    = { "60 * * * *",     CronParseError::OutOfRange { field: "minute", value: 60, min: 0, max: 59 } },
    dom_zero     = { "0 0 0 * *",      CronParseError::OutOfRange { field: "day-of-month", value: 0, min: 1, max: 31 } },
    dow_eight    = { "0 0 * * 8",      CronParseError::OutOfRange { field: "day-of-week", value: 8, min: 0, max: 7 } },
    inverted     = { "0 5-1 * * *",    CronParseError::InvertedRange { field: "hour", start: 5, end: 1 } },
    zero_step    = { "*/0 * * * *",    CronParseError::ZeroStep { field: "minute" } },
    garbage      = { "x * * * *",      CronParseError::InvalidValue { field: "minute", value: "x".into() } },
    question_min = { "? * * * *",      CronParseError::InvalidValue { field: "minute", value: "?".into() } },
    dangling     = { "1, * * * *",     CronParseError::InvalidValue { field: "minute", value: "".into() } },
    name_in_hour = { "0 MON * * *",    CronParseError::InvalidValue { field: "hour", value: "MON".into() } },
)]
fn rejects(src: &str, expected: CronParseError) {
    assert_eq!(CronExpr::parse(src).unwrap_err(), expected);
}

#[test]
fn matches_real_calendar_minutes_in_utc() {
    let e = expr("0 0 1 * 1");
    // 2024-01-01T00:00Z is a Monday and the 1st.
    let jan_1 = 1_704_067_200 / 60;
    assert!(e.matches(&CronZone::Utc.parts(jan_1)));
    // 2024-01-08T00:00Z, Monday.
    assert!(e.matches(&CronZone::Utc.parts(jan_1 + 7 * 1440)));
    // 2024-01-09T00:00Z, Tuesday.
    assert!(!e.matches(&CronZone::Utc.parts(jan_1 + 8 * 1440)));
    // 2024-02-01T00:00Z, Thursday the 1st.
    assert!(e.matches(&CronZone::Utc.parts(jan_1 + 31 * 1440)));
}

proptest! {
    #[test]
    fn star_matches_every_minute(minute in 0i64..60_000_000) {
        prop_assert!(expr("* * * * *").matches(&CronZone::Utc.parts(minute)));
    }

    #[test]
    fn weekday_nine_am_matches_exactly(minute in 0i64..60_000_000) {
        let p = CronZone::Utc.parts(minute);
        let expected = p.minute == 0 && p.hour == 9 && (1..=5).contains(&p.day_of_week);
        prop_assert_eq!(expr("0 9 * * 1-5").matches(&p), expected);
    }

    #[test]
    fn first_or_monday_at_midnight(minute in 0i64..60_000_000) {
        let p = CronZone::Utc.parts(minute);
        let expected = p.minute == 0 && p.hour == 0 && (p.day_of_month == 1 || p.day_of_week == 1);
        prop_assert_eq!(expr("0 0 1 * 1").matches(&p), expected);
    }

    #[test]
    fn parse_never_panics(src in "[0-9*/,?@a-zA-Z -]{0,30}") {
        let _ = CronExpr::parse(&src);
    }

    #[test]
    fn step_values_are_evenly_spaced(step in 1u32..30) {
        let e = expr(&format!("*/{step} * * * *"));
        let values: Vec<u32> = e.minute.values().collect();
        prop_assert_eq!(values[0], 0);
        prop_assert!(values.windows(2).all(|w| w[1] - w[0] == step));
    }
}
