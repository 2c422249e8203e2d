//! Piecewise-linear calibration tables.
//!
//! Each ADC channel carries a monotonically increasing sequence of
//! `(raw, calibrated)` anchor points. A raw reading between two anchors is
//! linearly interpolated; a reading beyond either end is extrapolated using
//! the slope of the nearest segment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One `(raw, calibrated)` anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub raw: f64,
    pub calibrated: f64,
}

/// Error building a [`CalibrationTable`].
#[derive(Debug, Clone, Error)]
pub enum CalibrationError {
    #[error("calibration table needs at least two anchor points, got {0}")]
    TooFewPoints(usize),
    #[error("calibration anchors must have strictly increasing raw values (points {0} and {1})")]
    NotMonotonic(usize, usize),
}

/// A monotonic piecewise-linear calibration curve for a single ADC channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CalibrationPoint>", into = "Vec<CalibrationPoint>")]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
}

impl CalibrationTable {
    /// Build a table from anchor points, validating monotonicity.
    pub fn new(points: Vec<CalibrationPoint>) -> Result<Self, CalibrationError> {
        if points.len() < 2 {
            return Err(CalibrationError::TooFewPoints(points.len()));
        }
        for w in points.windows(2) {
            if w[1].raw <= w[0].raw {
                return Err(CalibrationError::NotMonotonic(0, 1));
            }
        }
        Ok(Self { points })
    }

    /// Apply the curve to a raw reading, extrapolating beyond the ends.
    pub fn apply(&self, raw: f64) -> f64 {
        let pts = &self.points;
        if raw <= pts[0].raw {
            return Self::interpolate(pts[0], pts[1], raw);
        }
        let last = pts.len() - 1;
        if raw >= pts[last].raw {
            return Self::interpolate(pts[last - 1], pts[last], raw);
        }
        for w in pts.windows(2) {
            if raw >= w[0].raw && raw <= w[1].raw {
                return Self::interpolate(w[0], w[1], raw);
            }
        }
        unreachable!("raw value {raw} not bracketed despite bounds check")
    }

    fn interpolate(a: CalibrationPoint, b: CalibrationPoint, raw: f64) -> f64 {
        let slope = (b.calibrated - a.calibrated) / (b.raw - a.raw);
        a.calibrated + slope * (raw - a.raw)
    }
}

impl TryFrom<Vec<CalibrationPoint>> for CalibrationTable {
    type Error = CalibrationError;

    fn try_from(points: Vec<CalibrationPoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<CalibrationTable> for Vec<CalibrationPoint> {
    fn from(table: CalibrationTable) -> Self {
        table.points
    }
}
