//! # Runtime Configuration
//!
//! Layered configuration for a runtime process: which locality this process
//! is, where the other localities live, how many workers the scheduler runs
//! and how parcels are bounded.
//!
//! ## Sources
//!
//! - **TOML file**: passed to [`RuntimeConfig::load`]
//! - **Environment**: `PARCEL_`-prefixed, nested keys joined with `__`
//! - **Defaults**: see [`defaults`]
//!
//! ## Usage
//!
//! ```rust
//! use runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_toml_str("[scheduler]\nworker_threads = 2\n").unwrap();
//! assert_eq!(config.scheduler.worker_threads, 2);
//! ```

pub mod defaults;
pub mod runtime_config;

// Re-export commonly used types
pub use runtime_config::{
    LocalityEntry, LoggingSettings, ParcelPlacement, ParcelSettings, RuntimeConfig,
    SchedulerSettings,
};
