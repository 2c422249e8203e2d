//! Prelude module for common re-exports.
//!
//! Consumers can do `use cryo_common::prelude::*;` and get the most
//! commonly needed types without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SupervisorConfig};

// ─── Calibration ────────────────────────────────────────────────────
pub use crate::calib::{CalibrationError, CalibrationPoint, CalibrationTable};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::*;
