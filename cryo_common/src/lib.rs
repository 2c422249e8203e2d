//! Cryo Common Library
//!
//! Shared configuration, calibration, and constants for the cryostat
//! vibration-isolation platform supervisor workspace.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`calib`] - Piecewise-linear calibration tables
//! - [`consts`] - System-wide numeric constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! cryo_common = { workspace = true }
//! ```

pub mod calib;
pub mod config;
pub mod consts;
pub mod prelude;
