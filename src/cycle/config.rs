// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cycle configuration and validation

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by cycle configuration validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleConfigError {
    #[error("Invalid start time: {0}")]
    InvalidStartTime(String),

    #[error("Invalid week start day {0}: expected 0-6")]
    InvalidStartDay(u32),

    #[error("Invalid month start date {0}: expected 1-31")]
    InvalidStartDate(u32),

    #[error("Invalid quarter start month {0}: expected one of 1, 4, 7, 10")]
    InvalidStartMonth(u32),
}

/// Supported cycle granularities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CycleType {
    Day,
    Week,
    Month,
    Quarter,
}

impl std::str::FromStr for CycleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(CycleType::Day),
            "week" => Ok(CycleType::Week),
            "month" => Ok(CycleType::Month),
            "quarter" => Ok(CycleType::Quarter),
            _ => Err(format!(
                "Unknown cycle type: {}. Valid options: day, week, month, quarter",
                s
            )),
        }
    }
}

impl std::fmt::Display for CycleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleType::Day => "day",
            CycleType::Week => "week",
            CycleType::Month => "month",
            CycleType::Quarter => "quarter",
        };
        write!(f, "{}", name)
    }
}

/// An HH:mm offset into a cycle unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StartTime {
    pub hour: u32,
    pub minute: u32,
}

impl StartTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Parse an `HH:mm` string
    pub fn parse(s: &str) -> Result<Self, CycleConfigError> {
        let mut parts = s.splitn(2, ':');
        let hour = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| CycleConfigError::InvalidStartTime(s.to_string()))?;
        let minute = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| CycleConfigError::InvalidStartTime(s.to_string()))?;
        let parsed = Self { hour, minute };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), CycleConfigError> {
        if self.hour > 23 || self.minute > 59 {
            return Err(CycleConfigError::InvalidStartTime(format!(
                "{:02}:{:02}",
                self.hour, self.minute
            )));
        }
        Ok(())
    }

    pub fn is_midnight(&self) -> bool {
        self.hour == 0 && self.minute == 0
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // Validated on construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DayRule {
    pub start_time: StartTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct WeekRule {
    /// 0 = Sunday .. 6 = Saturday
    pub start_day: u32,
    pub start_time: StartTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MonthRule {
    /// 1-31, clamped to the actual month length
    pub start_date: u32,
    pub start_time: StartTime,
}

impl Default for MonthRule {
    fn default() -> Self {
        Self {
            start_date: 1,
            start_time: StartTime::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QuarterRule {
    /// One of 1, 4, 7, 10
    pub start_month: u32,
    pub start_time: StartTime,
}

impl Default for QuarterRule {
    fn default() -> Self {
        Self {
            start_month: 1,
            start_time: StartTime::default(),
        }
    }
}

/// Per-cycle-type start offsets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CycleConfig {
    pub day: DayRule,
    pub week: WeekRule,
    pub month: MonthRule,
    pub quarter: QuarterRule,
}

impl CycleConfig {
    pub fn validate(&self) -> Result<(), CycleConfigError> {
        self.day.start_time.validate()?;
        self.week.start_time.validate()?;
        self.month.start_time.validate()?;
        self.quarter.start_time.validate()?;

        if self.week.start_day > 6 {
            return Err(CycleConfigError::InvalidStartDay(self.week.start_day));
        }
        if self.month.start_date == 0 || self.month.start_date > 31 {
            return Err(CycleConfigError::InvalidStartDate(self.month.start_date));
        }
        if !matches!(self.quarter.start_month, 1 | 4 | 7 | 10) {
            return Err(CycleConfigError::InvalidStartMonth(self.quarter.start_month));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CycleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_start_time_parsing() {
        assert_eq!(StartTime::parse("06:30").unwrap(), StartTime::new(6, 30));
        assert!(StartTime::parse("25:00").is_err());
        assert!(StartTime::parse("six").is_err());
    }

    #[test]
    fn test_quarter_start_month_must_align() {
        let mut config = CycleConfig::default();
        config.quarter.start_month = 2;
        assert_eq!(
            config.validate().unwrap_err(),
            CycleConfigError::InvalidStartMonth(2)
        );
    }

    #[test]
    fn test_week_start_day_range() {
        let mut config = CycleConfig::default();
        config.week.start_day = 7;
        assert!(config.validate().is_err());
    }
}
