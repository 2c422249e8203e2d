//! Three-axis damper control law.
//!
//! Per axis, decides a drive direction from position/load hysteresis and
//! limit-switch state, then a speed tier from how far off nominal the
//! damper position is. The limit-switch gate itself lives in
//! [`crate::safety`]; this module only produces the unconstrained target.

use cryo_common::consts::{
    LOAD_MAX_KG, LOAD_MIN_KG, LOAD_TOL_KG, MOTOR_FAST, MOTOR_MED, MOTOR_SLOW, NUM_AXES,
    POSITION_FAST_MM, POSITION_NOM_MM, POSITION_TOL_MM,
};

use crate::motor::MotorCommand;

/// Whether the control law is driving motors this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActivationState {
    /// No drive.
    Off = 0,
    /// Drive only when outside the position/load band.
    On = 1,
    /// One-tick mode that forces motion even within the band, then
    /// demotes to `On`.
    Starting = 2,
}

impl ActivationState {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            2 => Some(Self::Starting),
            _ => None,
        }
    }
}

impl Default for ActivationState {
    fn default() -> Self {
        Self::Off
    }
}

/// Signed drive direction: -1 (down), 0 (hold), +1 (up).
fn decide_drive(pos: f64, load: f64, current_speed: i32, active: ActivationState) -> i32 {
    if load > LOAD_MAX_KG {
        return -1;
    }
    if load < LOAD_MIN_KG {
        return 1;
    }
    if pos < POSITION_NOM_MM - POSITION_TOL_MM && load < LOAD_MAX_KG - LOAD_TOL_KG {
        return 1;
    }
    if pos > POSITION_NOM_MM + POSITION_TOL_MM && load > LOAD_MIN_KG + LOAD_TOL_KG {
        return -1;
    }
    if current_speed > 0 {
        return if pos >= POSITION_NOM_MM || load >= LOAD_MAX_KG - LOAD_TOL_KG {
            0
        } else {
            1
        };
    }
    if current_speed < 0 {
        return if pos <= POSITION_NOM_MM || load <= LOAD_MIN_KG + LOAD_TOL_KG {
            0
        } else {
            -1
        };
    }
    if active == ActivationState::Starting {
        return match pos.partial_cmp(&POSITION_NOM_MM) {
            Some(std::cmp::Ordering::Less) => 1,
            Some(std::cmp::Ordering::Greater) => -1,
            _ => 0,
        };
    }
    0
}

/// Speed tier selected by how far the damper sits from nominal.
fn speed_tier(pos: f64) -> i32 {
    let mag = (pos - POSITION_NOM_MM).abs();
    if mag > POSITION_FAST_MM {
        MOTOR_FAST
    } else if mag > POSITION_TOL_MM {
        MOTOR_MED
    } else {
        MOTOR_SLOW
    }
}

/// Unconstrained target speed for one axis, before the limit-switch gate.
pub fn target_speed(pos: f64, load: f64, current_speed: i32, active: ActivationState) -> i32 {
    decide_drive(pos, load, current_speed, active) * speed_tier(pos)
}

/// `Starting` lasts exactly one tick; the scheduler demotes it to `On`
/// after every axis has been processed once.
pub fn advance_activation(active: ActivationState) -> ActivationState {
    if active == ActivationState::Starting {
        ActivationState::On
    } else {
        active
    }
}

/// Commands issued once on activation: seed each axis' position counter
/// from the measured stage height and energize windings.
pub fn activation_commands(stage_position_mm: &[f64; NUM_AXES], steps_per_mm: f64) -> Vec<MotorCommand> {
    let mut cmds = Vec::with_capacity(NUM_AXES * 2);
    for axis in 0..NUM_AXES {
        cmds.push(MotorCommand::SetPosition {
            axis,
            position: (stage_position_mm[axis] * steps_per_mm).floor() as i32,
        });
        cmds.push(MotorCommand::Energize { axis });
    }
    cmds
}
