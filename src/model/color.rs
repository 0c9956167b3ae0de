use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::units::RAW_MAX;

/// Device colour: hue, saturation, brightness and kelvin as raw 16-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl Hsbk {
    pub const fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    /// Build from raw register values, rounding half to even and clamping
    /// into the 16-bit range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_raw(values: [f64; 4]) -> Self {
        let [h, s, b, k] = values.map(|v| v.round_ties_even().clamp(0.0, RAW_MAX) as u16);
        Self::new(h, s, b, k)
    }

    pub fn to_array(self) -> [u16; 4] {
        [self.hue, self.saturation, self.brightness, self.kelvin]
    }

    /// Component-wise mean, truncated toward zero. `None` for an empty input.
    #[allow(clippy::cast_possible_truncation)]
    pub fn average(colors: impl IntoIterator<Item = Hsbk>) -> Option<Hsbk> {
        let mut sums = [0u64; 4];
        let mut count = 0u64;
        for color in colors {
            for (sum, part) in sums.iter_mut().zip(color.to_array()) {
                *sum += u64::from(part);
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let [h, s, b, k] = sums.map(|sum| (sum / count) as u16);
        Some(Self::new(h, s, b, k))
    }
}

impl From<[u16; 4]> for Hsbk {
    fn from(value: [u16; 4]) -> Self {
        let [h, s, b, k] = value;
        Self::new(h, s, b, k)
    }
}

impl std::fmt::Display for Hsbk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.hue, self.saturation, self.brightness, self.kelvin
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn average_of_members() {
        let avg = Hsbk::average([Hsbk::new(4, 8, 12, 16), Hsbk::new(24, 28, 32, 36)]).unwrap();
        assert_eq!(avg, Hsbk::new(14, 18, 22, 26));
        assert!(Hsbk::average(Vec::new()).is_none());
    }

    #[test]
    fn from_raw_clamps_and_rounds() {
        let c = Hsbk::from_raw([32767.5, -4.0, 70000.0, 2700.4]);
        assert_eq!(c.to_array(), [32768, 0, 65535, 2700]);
    }
}
