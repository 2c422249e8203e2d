//! System-wide constants for the cryostat supervisor workspace.
//!
//! Single source of truth for all numeric limits, tolerances, and default
//! paths. Imported by every crate in the workspace — no duplication
//! permitted.

/// Number of motorized damper/stage axes.
pub const NUM_AXES: usize = 3;

/// Number of limit switches (two per axis: top, bottom).
pub const NUM_LIMIT_SWITCHES: usize = NUM_AXES * 2;

/// Number of ADC channels polled each cycle.
pub const NUM_ADC_CHANNELS: usize = 8;

/// Role slot count: slot 0 (motor/limit controller) and slot 1 (reserved).
pub const NUM_ROLE_SLOTS: usize = 2;

/// Maximum number of controllers the registry will track at once, counting
/// role slots plus holding slots for not-yet-identified devices.
pub const MAX_CONTROLLER_SLOTS: usize = 8;

/// Scheduler tick period in milliseconds.
pub const TICK_PERIOD_MS: u64 = 80;

/// Consecutive bad polls (ADC or a required controller) before the control
/// law is forcibly deactivated.
pub const MAX_BAD_POLLS: u32 = 3;

/// Allowed divergence between hardware-reported motor position and the
/// position implied by the measured stage height, in millimeters.
pub const MOTOR_TOL_MM: f64 = 2.0;

/// Steps-per-millimeter conversion for the motor position consistency check.
pub const MOTOR_STEPS_PER_MM: f64 = 200.0;

/// Nominal damper top position, millimeters.
pub const POSITION_NOM_MM: f64 = 1.0;

/// Position band half-width for the "within tolerance" decision, millimeters.
pub const POSITION_TOL_MM: f64 = 0.1;

/// Position magnitude beyond which the fast speed tier applies, millimeters.
pub const POSITION_FAST_MM: f64 = 0.5;

/// Nominal per-damper load, kilograms.
pub const LOAD_NOM_KG: f64 = 25.0;

/// Maximum allowed per-damper load before forced unload, kilograms.
pub const LOAD_MAX_KG: f64 = 30.0;

/// Minimum allowed per-damper load before forced load, kilograms.
pub const LOAD_MIN_KG: f64 = 20.0;

/// Load band half-width used by the hysteresis rules, kilograms.
pub const LOAD_TOL_KG: f64 = 1.0;

/// Slow motor speed tier, steps/s.
pub const MOTOR_SLOW: i32 = 50;
/// Medium motor speed tier, steps/s.
pub const MOTOR_MED: i32 = 200;
/// Fast motor speed tier, steps/s.
pub const MOTOR_FAST: i32 = 1000;

/// Nominal ambient air pressure, hPa.
pub const AIR_PRESSURE_NOM_HPA: f64 = 1013.25;

/// Proportionality constant converting (stage − damper) travel to load,
/// kg per millimeter.
pub const DAMPER_FORCE_CONST_KG_PER_MM: f64 = 5.0;

/// Vacuum bellows diameter, centimeters.
pub const BELLOWS_DIA_CM: f64 = 30.0;

/// Distance from the bellows center to damper 0, along the layout axis.
pub const BELLOWS_POS: f64 = 0.3;

/// Distance from the layout axis origin to each damper, used with
/// [`BELLOWS_POS`] to compute the load-sharing fraction.
pub const DAMPER_POS: f64 = 1.0;

/// Standard gravity, m/s^2.
pub const GRAVITY: f64 = 9.80665;

/// History ring capacity, one entry per second.
pub const HISTORY_CAPACITY: usize = 600;

/// Expected USB vendor ID for a motor/GPIO controller.
pub const USB_VENDOR_ID: u16 = 0x03EB;

/// Expected USB product ID for a motor/GPIO controller.
pub const USB_PRODUCT_ID: u16 = 0x2300;

/// Hardware bulk transfer timeout, milliseconds.
pub const USB_TRANSFER_TIMEOUT_MS: u64 = 1000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cryo/supervisor.toml";

/// Default directory for rolling monthly log files.
pub const DEFAULT_LOG_DIR: &str = "/var/log/cryo";

/// Default HTTP/WebSocket observer bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// WebSocket subprotocol name used by observer clients.
pub const OBSERVER_SUBPROTOCOL: &str = "cute";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert_eq!(NUM_LIMIT_SWITCHES, NUM_AXES * 2);
        assert!(LOAD_MIN_KG < LOAD_NOM_KG);
        assert!(LOAD_NOM_KG < LOAD_MAX_KG);
        assert!(MOTOR_SLOW < MOTOR_MED);
        assert!(MOTOR_MED < MOTOR_FAST);
        assert!(MAX_CONTROLLER_SLOTS > NUM_ROLE_SLOTS);
    }

    #[test]
    fn history_capacity_matches_one_hz_for_ten_minutes() {
        assert_eq!(HISTORY_CAPACITY, 600);
    }
}
