//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and geodetic anchors
//! - Collections and arena keys
//! - Time management (throttles, debouncing, fixed stepping)
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
