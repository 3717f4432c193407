// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cycle rules: mapping instants to day/week/month/quarter windows
//!
//! A cycle rule maps a wall-clock instant to a deterministic bucket: a key,
//! a display label and a half-open `[start, end)` time range. Cycle starts
//! are configurable (e.g. a "day" that begins at 06:00), and all arithmetic
//! is performed on literal wall-clock components with no timezone conversion.

pub mod config;
pub mod engine;

pub use config::{CycleConfig, CycleConfigError, CycleType, StartTime};
pub use engine::{CycleGroup, CycleRuleEngine};
