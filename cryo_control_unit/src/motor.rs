//! Motor control plane.
//!
//! Server-side shadow of each motor's reported state, and the ramp/step
//! planner that decides which wire commands to issue to reach a
//! requested speed. The wire encoding itself belongs to the USB line
//! protocol layer; this module only decides *what* to send.

use cryo_common::consts::NUM_AXES;

/// One command the scheduler should encode and send to the controller
/// owning the motors (role slot 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    /// Set the direction bit before issuing a ramp.
    SetDirection { axis: usize, forward: bool },
    /// Ramp linearly from current speed to `speed` (unsigned magnitude;
    /// direction is whatever was last set).
    Ramp { axis: usize, speed: u32 },
    /// Emergency stop a single axis.
    Halt { axis: usize },
    /// Emergency stop all axes.
    HaltAll,
    /// Seed the device's position counter.
    SetPosition { axis: usize, position: i32 },
    /// Energize windings.
    Energize { axis: usize },
}

/// Server-side shadow of the hardware-reported motor state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorShadow {
    pub speed: [i32; NUM_AXES],
    pub direction_forward: [bool; NUM_AXES],
    pub position: [i32; NUM_AXES],
    pub running: [bool; NUM_AXES],
}

impl Default for MotorShadow {
    fn default() -> Self {
        Self {
            speed: [0; NUM_AXES],
            direction_forward: [true; NUM_AXES],
            position: [0; NUM_AXES],
            running: [false; NUM_AXES],
        }
    }
}

impl MotorShadow {
    /// Apply one `f.` feedback response for `axis`.
    pub fn apply_feedback(&mut self, axis: usize, speed: i32, position: i32) {
        self.speed[axis] = speed;
        self.direction_forward[axis] = speed >= 0;
        self.position[axis] = position;
        self.running[axis] = speed != 0;
    }
}

fn sign(v: i32) -> i32 {
    v.cmp(&0) as i32
}

/// Decide which wire commands are needed to bring `axis` from its current
/// shadow state to `target_speed` (signed steps/s).
///
/// - No command if already at `target_speed`.
/// - If current and target have opposite (nonzero) signs, only a ramp to
///   zero is issued this tick; the direction flip and final ramp happen
///   once the motor has actually stopped, on a later tick.
/// - Otherwise a direction change is issued first if the motor isn't
///   already facing the right way, followed by the ramp to the target
///   magnitude.
pub fn ramp_motor(shadow: &MotorShadow, axis: usize, target_speed: i32) -> Vec<MotorCommand> {
    let current_speed = shadow.speed[axis];
    if current_speed == target_speed {
        return Vec::new();
    }

    let cur_sign = sign(current_speed);
    let tgt_sign = sign(target_speed);

    if cur_sign != 0 && tgt_sign != 0 && cur_sign != tgt_sign {
        return vec![MotorCommand::Ramp { axis, speed: 0 }];
    }

    let mut cmds = Vec::new();
    let want_forward = if tgt_sign == 0 {
        shadow.direction_forward[axis]
    } else {
        tgt_sign > 0
    };
    if want_forward != shadow.direction_forward[axis] {
        cmds.push(MotorCommand::SetDirection { axis, forward: want_forward });
    }
    cmds.push(MotorCommand::Ramp {
        axis,
        speed: target_speed.unsigned_abs(),
    });
    cmds
}
