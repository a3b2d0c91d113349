//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the baker:
//! - Math types and transforms
//! - Phase timing
//! - Logging setup

pub mod math;
pub mod time;
pub mod logging;
