//! # Core Module
//!
//! Shared abstractions used across the baker.
//!
//! ## Organization
//!
//! - **Config**: bake settings, output locations and the file-backed `BakeConfig`

pub mod config;

// Re-export commonly used config types
pub use config::{
    BakeConfig,
    GlowSettings,
    OutputConfig,
    Config,
    ConfigError,
};
