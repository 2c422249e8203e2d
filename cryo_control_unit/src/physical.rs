//! Calibration & derivation.
//!
//! Converts raw ADC counts into calibrated physical quantities, then
//! derives per-damper load and the pressure-induced load correction.

use cryo_common::calib::CalibrationTable;
use cryo_common::consts::{
    AIR_PRESSURE_NOM_HPA, BELLOWS_DIA_CM, BELLOWS_POS, DAMPER_FORCE_CONST_KG_PER_MM, DAMPER_POS,
    GRAVITY, LOAD_NOM_KG, NUM_AXES,
};

/// Per-channel calibration tables used to decode a raw ADC sample.
pub struct CalibrationTables {
    pub damper_position: [CalibrationTable; NUM_AXES],
    pub stage_position: [CalibrationTable; NUM_AXES],
    pub air_pressure: CalibrationTable,
}

/// Derived physical state, recomputed from each ADC sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalState {
    pub damper_position: [f64; NUM_AXES],
    pub stage_position: [f64; NUM_AXES],
    pub air_pressure: f64,
    pub damper_load: [f64; NUM_AXES],
    pub damper_add_weight: [f64; NUM_AXES],
}

/// Fraction of the bellows pressure force borne by each damper.
///
/// Damper 0 sits nearer the bellows and carries the larger share; dampers
/// 1 and 2 split the remainder evenly. Geometry (`BELLOWS_POS`,
/// `DAMPER_POS`) is taken as a fixed mechanical input, not re-derived.
fn load_share_fractions() -> [f64; NUM_AXES] {
    let near = (1.0 + 2.0 * BELLOWS_POS / DAMPER_POS) / 3.0;
    let far = (1.0 - BELLOWS_POS / DAMPER_POS) / 3.0;
    [near, far, far]
}

fn bellows_area_cm2() -> f64 {
    std::f64::consts::PI * BELLOWS_DIA_CM * BELLOWS_DIA_CM / 4.0
}

/// Decode a raw 8-channel ADC sample into calibrated physical state.
///
/// Channels 0..2 map to damper top positions, 3..5 to stage top
/// positions, 6 to air pressure (channel 7 is unused). The pressure
/// channel is always decoded through its calibration table, the same as
/// every other channel.
pub fn derive(raw: &[u16; 8], cal: &CalibrationTables) -> PhysicalState {
    let mut damper_position = [0.0; NUM_AXES];
    let mut stage_position = [0.0; NUM_AXES];
    for i in 0..NUM_AXES {
        damper_position[i] = cal.damper_position[i].apply(raw[i] as f64);
        stage_position[i] = cal.stage_position[i].apply(raw[NUM_AXES + i] as f64);
    }
    let air_pressure = cal.air_pressure.apply(raw[6] as f64);

    let mut damper_load = [0.0; NUM_AXES];
    for i in 0..NUM_AXES {
        damper_load[i] =
            LOAD_NOM_KG + (stage_position[i] - damper_position[i]) * DAMPER_FORCE_CONST_KG_PER_MM;
    }

    let force_kg = (air_pressure - AIR_PRESSURE_NOM_HPA) * bellows_area_cm2() / (100.0 * GRAVITY);
    let fractions = load_share_fractions();
    let mut damper_add_weight = [0.0; NUM_AXES];
    for i in 0..NUM_AXES {
        damper_add_weight[i] = (LOAD_NOM_KG - force_kg * fractions[i]) - damper_load[i];
    }

    PhysicalState {
        damper_position,
        stage_position,
        air_pressure,
        damper_load,
        damper_add_weight,
    }
}
