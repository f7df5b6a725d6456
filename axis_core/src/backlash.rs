//! Backlash compensation model.
//!
//! The controller compensates backlash only when a move approaches from the
//! side opposite to the configured backlash sign.

/// Backlash setting written before a move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BacklashConfig {
    pub enabled: bool,
    /// Signed magnitude; the sign selects the direction that is not compensated.
    pub magnitude: f64,
}

impl BacklashConfig {
    pub fn enabled(magnitude: f64) -> Self {
        Self {
            enabled: true,
            magnitude,
        }
    }

    pub fn disabled(magnitude: f64) -> Self {
        Self {
            enabled: false,
            magnitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Direction of a move by `offset`; `None` for a zero (or NaN) offset.
    pub fn of(offset: f64) -> Option<Self> {
        if offset > 0.0 {
            Some(Direction::Forward)
        } else if offset < 0.0 {
            Some(Direction::Reverse)
        } else {
            None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Compensation the controller should report after a move in `direction`.
///
/// `|magnitude|` when enabled and `sign(magnitude) != direction`, else `0.0`.
pub fn expected_compensation(backlash: &BacklashConfig, direction: Direction) -> f64 {
    if !backlash.enabled || backlash.magnitude == 0.0 || backlash.magnitude.is_nan() {
        return 0.0;
    }
    if backlash.magnitude.signum() == direction.sign() {
        0.0
    } else {
        backlash.magnitude.abs()
    }
}
