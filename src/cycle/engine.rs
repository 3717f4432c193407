// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cycle rule engine
//!
//! Resolves an instant to its cycle window with an "anchor then roll back one
//! unit if early" scheme: the anchor is the configured start offset within the
//! instant's calendar unit; instants before the anchor belong to the previous
//! unit's window.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::config::{CycleConfig, CycleConfigError, CycleType};

/// A resolved cycle window: key, display label and `[start, end)` range
#[derive(Debug, Clone, PartialEq)]
pub struct CycleGroup {
    pub key: String,
    pub label: String,
    pub range_start: NaiveDateTime,
    pub range_end: NaiveDateTime,
}

/// Pure, deterministic resolver from instants to cycle windows
#[derive(Debug, Clone)]
pub struct CycleRuleEngine {
    config: CycleConfig,
}

impl CycleRuleEngine {
    pub fn new(config: CycleConfig) -> Result<Self, CycleConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: CycleConfig::default(),
        }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Resolve the cycle window containing `at` for the given cycle type.
    ///
    /// Holds the window invariant `range_start <= at < range_end`.
    pub fn group_for(&self, at: NaiveDateTime, cycle: CycleType) -> CycleGroup {
        match cycle {
            CycleType::Day => self.day_group(at),
            CycleType::Week => self.week_group(at),
            CycleType::Month => self.month_group(at),
            CycleType::Quarter => self.quarter_group(at),
        }
    }

    /// True when the given cycle's window boundaries fall on calendar-day
    /// boundaries, i.e. a whole calendar day can never straddle two windows.
    pub fn day_aligned(&self, cycle: CycleType) -> bool {
        match cycle {
            CycleType::Day => self.config.day.start_time.is_midnight(),
            CycleType::Week => self.config.week.start_time.is_midnight(),
            CycleType::Month => self.config.month.start_time.is_midnight(),
            CycleType::Quarter => self.config.quarter.start_time.is_midnight(),
        }
    }

    fn day_group(&self, at: NaiveDateTime) -> CycleGroup {
        let anchor = at.date().and_time(self.config.day.start_time.to_naive_time());
        let start = if at < anchor {
            anchor - Duration::days(1)
        } else {
            anchor
        };
        let end = start + Duration::days(1);

        CycleGroup {
            key: start.date().format("%Y-%m-%d").to_string(),
            label: start.date().format("%Y-%m-%d").to_string(),
            range_start: start,
            range_end: end,
        }
    }

    fn week_group(&self, at: NaiveDateTime) -> CycleGroup {
        let rule = self.config.week;
        let weekday = at.date().weekday().num_days_from_sunday();
        let days_back = (weekday as i64 - rule.start_day as i64).rem_euclid(7);
        let anchor =
            (at.date() - Duration::days(days_back)).and_time(rule.start_time.to_naive_time());
        let start = if at < anchor {
            anchor - Duration::days(7)
        } else {
            anchor
        };
        let end = start + Duration::days(7);

        let week_number = start.date().ordinal0() / 7 + 1;
        let label = format!("{}-W{:02}", start.date().year(), week_number);

        CycleGroup {
            key: label.clone(),
            label,
            range_start: start,
            range_end: end,
        }
    }

    fn month_group(&self, at: NaiveDateTime) -> CycleGroup {
        let rule = self.config.month;
        let time = rule.start_time.to_naive_time();

        let anchor = clamped_date(at.date().year(), at.date().month(), rule.start_date)
            .and_time(time);
        let start = if at < anchor {
            let (year, month) = shift_month(at.date().year(), at.date().month(), -1);
            clamped_date(year, month, rule.start_date).and_time(time)
        } else {
            anchor
        };
        let (end_year, end_month) =
            shift_month(start.date().year(), start.date().month(), 1);
        let end = clamped_date(end_year, end_month, rule.start_date).and_time(time);

        let label = start.date().format("%Y-%m").to_string();
        CycleGroup {
            key: label.clone(),
            label,
            range_start: start,
            range_end: end,
        }
    }

    fn quarter_group(&self, at: NaiveDateTime) -> CycleGroup {
        let rule = self.config.quarter;
        let time = rule.start_time.to_naive_time();

        // Distance to the nearest quarter boundary at or before this month
        let months_since =
            (at.date().month() as i64 - rule.start_month as i64).rem_euclid(12);
        let offset_in_quarter = months_since % 3;
        let (anchor_year, anchor_month) = shift_month(
            at.date().year(),
            at.date().month(),
            -(offset_in_quarter as i32),
        );
        let anchor = clamped_date(anchor_year, anchor_month, 1).and_time(time);

        let start = if at < anchor {
            let (year, month) = shift_month(anchor_year, anchor_month, -3);
            clamped_date(year, month, 1).and_time(time)
        } else {
            anchor
        };
        let (end_year, end_month) =
            shift_month(start.date().year(), start.date().month(), 3);
        let end = clamped_date(end_year, end_month, 1).and_time(time);

        let quarter = start.date().month0() / 3 + 1;
        let label = format!("{}-Q{}", start.date().year(), quarter);
        CycleGroup {
            key: label.clone(),
            label,
            range_start: start,
            range_end: end,
        }
    }
}

/// Build a date with the day-of-month clamped to the month's actual length.
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let last = days_in_month(year, month);
    // month is always 1-12 here, so the construction cannot fail
    NaiveDate::from_ymd_opt(year, month, day.min(last))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 1).unwrap())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = shift_month(year, month, 1);
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap();
    (next_first - first).num_days() as u32
}

fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let zero_based = year as i64 * 12 + (month as i64 - 1) + delta as i64;
    let year = zero_based.div_euclid(12) as i32;
    let month = zero_based.rem_euclid(12) as u32 + 1;
    (year, month)
}
