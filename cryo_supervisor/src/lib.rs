//! Cryo Supervisor
//!
//! The polling scheduler, safety supervisor wiring, observer fan-out, and
//! operator logging sink that tie the HAL, control-unit, and observer
//! crates together into a running cryostat vibration-isolation platform
//! supervisor, plus the binary lifecycle (CLI, config load, graceful
//! shutdown) in `main.rs`.

pub mod engine;
pub mod logsink;

pub use engine::Engine;
pub use logsink::{LogSink, LogSinkError};
