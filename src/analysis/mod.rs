// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Task result classification and aggregate rates
//!
//! The category sets below come from the upstream reporting rules. Note that
//! "untracked" and "counterpart-caused failure" appear in BOTH the failure set
//! and the success-for-rate set. That overlap is intentional domain semantics
//! (a failure can still count toward the success-rate numerator under the
//! business rule) and must not be "fixed" without product confirmation.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Nominal completion
pub const RESULT_NORMAL: &str = "正常";
/// Device fault
pub const RESULT_DEVICE_FAULT: &str = "因设备故障失败";
/// Operator error
pub const RESULT_OPERATOR_ERROR: &str = "因操作失误失败";
/// Untracked task
pub const RESULT_UNTRACKED: &str = "未跟踪";
/// Failure caused by the counterpart station
pub const RESULT_COUNTERPART_FAULT: &str = "因对方原因失败";
/// Succeeded but mis-processed afterwards
pub const RESULT_MISPROCESSED: &str = "成功但处理错误";

static FAILURE_RESULTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        RESULT_DEVICE_FAULT,
        RESULT_OPERATOR_ERROR,
        RESULT_UNTRACKED,
        RESULT_COUNTERPART_FAULT,
        RESULT_MISPROCESSED,
    ]
    .into_iter()
    .collect()
});

static SUCCESS_FOR_RATE_RESULTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [RESULT_NORMAL, RESULT_UNTRACKED, RESULT_COUNTERPART_FAULT]
        .into_iter()
        .collect()
});

/// Classifier over task result strings
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskResultAnalyzer;

impl TaskResultAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// True iff the result belongs to the closed failure category set.
    pub fn is_failure(&self, result: &str) -> bool {
        FAILURE_RESULTS.contains(result)
    }

    /// True iff the result counts toward the success-rate numerator.
    pub fn is_success_for_rate(&self, result: &str) -> bool {
        SUCCESS_FOR_RATE_RESULTS.contains(result)
    }

    pub fn failure_count<'a, I>(&self, results: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        results.into_iter().filter(|r| self.is_failure(r)).count()
    }

    /// Success rate in percent, rounded to 3 decimal places.
    ///
    /// The denominator is the unique plan count, not the record count.
    /// Returns `0.0` (never NaN) when the denominator is not positive.
    pub fn success_rate<'a, I>(&self, results: I, total_plan_count: usize) -> f64
    where
        I: IntoIterator<Item = &'a str>,
    {
        if total_plan_count == 0 {
            return 0.0;
        }
        let matching = results
            .into_iter()
            .filter(|r| self.is_success_for_rate(r))
            .count();
        let rate = 100.0 * matching as f64 / total_plan_count as f64;
        (rate * 1000.0).round() / 1000.0
    }
}
