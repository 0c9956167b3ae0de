use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dsl::instruction::Register;

/// Raw integer range shared by hue, saturation and brightness.
pub const RAW_MAX: f64 = 65535.0;

/// Whether register values are read and written as device integers or as
/// human units (degrees, percent, seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    #[default]
    Logical,
    Raw,
}

impl UnitMode {
    /// One full turn of the hue wheel in this mode.
    pub fn full_circle(self) -> f64 {
        match self {
            UnitMode::Logical => 360.0,
            UnitMode::Raw => 65536.0,
        }
    }
}

impl std::fmt::Display for UnitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitMode::Logical => write!(f, "logical"),
            UnitMode::Raw => write!(f, "raw"),
        }
    }
}

/// Convert a logical value for `reg` into its raw storage form.
pub fn as_raw(reg: Register, value: f64) -> f64 {
    match reg {
        Register::Hue => (value.rem_euclid(360.0) * RAW_MAX / 360.0).round_ties_even(),
        Register::Saturation | Register::Brightness => {
            (value * RAW_MAX / 100.0).round_ties_even().clamp(0.0, RAW_MAX)
        }
        Register::Duration | Register::Time => value * 1000.0,
        _ => value,
    }
}

/// Convert a raw stored value for `reg` into logical units.
pub fn as_logical(reg: Register, value: f64) -> f64 {
    match reg {
        Register::Hue => value * 360.0 / RAW_MAX,
        Register::Saturation | Register::Brightness => value * 100.0 / RAW_MAX,
        Register::Duration | Register::Time => value / 1000.0,
        _ => value,
    }
}

/// True for registers whose values are subject to unit conversion.
pub fn has_units(reg: Register) -> bool {
    matches!(
        reg,
        Register::Hue
            | Register::Saturation
            | Register::Brightness
            | Register::Duration
            | Register::Time
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hue_wraps_and_rounds() {
        assert_eq!(as_raw(Register::Hue, 120.0), 21845.0);
        assert_eq!(as_raw(Register::Hue, 360.0), 0.0);
        assert_eq!(as_raw(Register::Hue, -90.0), as_raw(Register::Hue, 270.0));
    }

    #[test]
    fn ties_round_to_even() {
        assert_eq!(as_raw(Register::Hue, 180.0), 32768.0);
        assert_eq!(as_raw(Register::Hue, 252.0), 45874.0);
        assert_eq!(as_raw(Register::Hue, 324.0), 58982.0);
        assert_eq!(as_raw(Register::Brightness, 50.0), 32768.0);
    }

    #[test]
    fn percentages() {
        assert_eq!(as_raw(Register::Saturation, 33.0), 21627.0);
        assert_eq!(as_raw(Register::Saturation, 67.0), 43908.0);
        assert_eq!(as_raw(Register::Brightness, 100.0), RAW_MAX);
        assert_eq!(as_raw(Register::Brightness, 250.0), RAW_MAX);
        assert!((as_logical(Register::Brightness, 13107.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn time_is_seconds_vs_milliseconds() {
        assert_eq!(as_raw(Register::Duration, 1.5), 1500.0);
        assert_eq!(as_logical(Register::Time, 2500.0), 2.5);
        assert_eq!(as_raw(Register::Kelvin, 2700.0), 2700.0);
    }

    #[test]
    fn full_circle_per_mode() {
        assert_eq!(UnitMode::Raw.full_circle(), 65536.0);
        assert_eq!(UnitMode::Logical.full_circle(), 360.0);
        assert!(!has_units(Register::Kelvin));
    }
}
