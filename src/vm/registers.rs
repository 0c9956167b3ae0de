use crate::dsl::instruction::{Operand, Register, Value};
use crate::model::units::{as_logical, as_raw, has_units};
use crate::model::{Hsbk, UnitMode};

use super::RuntimeError;

/// Machine registers. Colour components, duration and a numeric `time` are
/// stored raw; reads and writes convert through the current unit mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Registers {
    hue: f64,
    saturation: f64,
    brightness: f64,
    kelvin: f64,
    duration: f64,
    time: Value,
    name: Value,
    operand: Value,
    first_zone: Value,
    last_zone: Value,
    first_row: Value,
    last_row: Value,
    first_column: Value,
    last_column: Value,
    unit_mode: UnitMode,
    result: Value,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(UnitMode::default())
    }
}

impl Registers {
    pub fn new(unit_mode: UnitMode) -> Self {
        Self {
            hue: 0.0,
            saturation: 0.0,
            brightness: 0.0,
            kelvin: 0.0,
            duration: 0.0,
            time: Value::Number(0.0),
            name: Value::NULL,
            operand: Value::NULL,
            first_zone: Value::NULL,
            last_zone: Value::NULL,
            first_row: Value::NULL,
            last_row: Value::NULL,
            first_column: Value::NULL,
            last_column: Value::NULL,
            unit_mode,
            result: Value::NULL,
        }
    }

    pub fn unit_mode(&self) -> UnitMode {
        self.unit_mode
    }

    fn logical(&self, reg: Register) -> bool {
        self.unit_mode == UnitMode::Logical && has_units(reg)
    }

    /// Read a register in the current unit mode.
    pub fn get(&self, reg: Register) -> Value {
        let raw = match reg {
            Register::Hue => self.hue,
            Register::Saturation => self.saturation,
            Register::Brightness => self.brightness,
            Register::Kelvin => self.kelvin,
            Register::Duration => self.duration,
            Register::Time => match &self.time {
                Value::Number(ms) => *ms,
                other => return other.clone(),
            },
            Register::Name => return self.name.clone(),
            Register::Operand => return self.operand.clone(),
            Register::FirstZone => return self.first_zone.clone(),
            Register::LastZone => return self.last_zone.clone(),
            Register::FirstRow => return self.first_row.clone(),
            Register::LastRow => return self.last_row.clone(),
            Register::FirstColumn => return self.first_column.clone(),
            Register::LastColumn => return self.last_column.clone(),
            Register::UnitMode => return Value::UnitMode(self.unit_mode),
            Register::Result => return self.result.clone(),
        };
        if self.logical(reg) {
            Value::Number(as_logical(reg, raw))
        } else {
            Value::Number(raw)
        }
    }

    /// Write a register, converting logical values to raw.
    pub fn put(&mut self, reg: Register, value: Value) -> Result<(), RuntimeError> {
        match reg {
            Register::Name => self.name = value,
            Register::Operand => self.operand = value,
            Register::FirstZone => self.first_zone = value,
            Register::LastZone => self.last_zone = value,
            Register::FirstRow => self.first_row = value,
            Register::LastRow => self.last_row = value,
            Register::FirstColumn => self.first_column = value,
            Register::LastColumn => self.last_column = value,
            Register::Result => self.result = value,
            Register::UnitMode => {
                let Value::UnitMode(mode) = value else {
                    return Err(RuntimeError::type_mismatch("unit mode", &value));
                };
                self.unit_mode = mode;
            }
            Register::Time if matches!(value, Value::At(_)) => self.time = value,
            _ => {
                let n = value
                    .as_number()
                    .ok_or_else(|| RuntimeError::type_mismatch("number", &value))?;
                let raw = if self.logical(reg) { as_raw(reg, n) } else { n };
                match reg {
                    Register::Hue => self.hue = raw,
                    Register::Saturation => self.saturation = raw,
                    Register::Brightness => self.brightness = raw,
                    Register::Kelvin => self.kelvin = raw,
                    Register::Duration => self.duration = raw,
                    _ => self.time = Value::Number(raw),
                }
            }
        }
        Ok(())
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn set_result(&mut self, value: Value) {
        self.result = value;
    }

    pub fn name(&self) -> &Value {
        &self.name
    }

    /// OPERAND as an operand kind. Anything else reads as `Null`.
    pub fn operand(&self) -> Operand {
        match self.operand {
            Value::Operand(op) => op,
            _ => Operand::Null,
        }
    }

    pub fn first_zone(&self) -> &Value {
        &self.first_zone
    }

    pub fn last_zone(&self) -> &Value {
        &self.last_zone
    }

    /// FIRST_ROW and LAST_ROW.
    pub fn rows(&self) -> (&Value, &Value) {
        (&self.first_row, &self.last_row)
    }

    /// FIRST_COLUMN and LAST_COLUMN.
    pub fn columns(&self) -> (&Value, &Value) {
        (&self.first_column, &self.last_column)
    }

    /// Transition time in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.duration
    }

    /// Raw `time`: a delay in milliseconds or time-of-day patterns.
    pub fn time_raw(&self) -> &Value {
        &self.time
    }

    pub fn color(&self) -> Hsbk {
        Hsbk::from_raw([self.hue, self.saturation, self.brightness, self.kelvin])
    }

    pub fn set_color(&mut self, color: Hsbk) {
        let [h, s, b, k] = color.to_array().map(f64::from);
        self.hue = h;
        self.saturation = s;
        self.brightness = b;
        self.kelvin = k;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn logical_writes_store_raw() {
        let mut regs = Registers::default();
        regs.put(Register::Hue, 120.0.into()).unwrap();
        regs.put(Register::Brightness, 100.0.into()).unwrap();
        regs.put(Register::Kelvin, 2700.0.into()).unwrap();
        regs.put(Register::Duration, 1.5.into()).unwrap();
        assert_eq!(regs.color(), Hsbk::new(21845, 0, 65535, 2700));
        assert_eq!(regs.duration_ms(), 1500.0);
        assert_eq!(regs.get(Register::Duration), Value::Number(1.5));
    }

    #[test]
    fn raw_mode_is_unconverted() {
        let mut regs = Registers::default();
        regs.put(Register::UnitMode, UnitMode::Raw.into()).unwrap();
        regs.put(Register::Hue, 21845.0.into()).unwrap();
        assert_eq!(regs.get(Register::Hue), Value::Number(21845.0));
        regs.put(Register::UnitMode, UnitMode::Logical.into()).unwrap();
        assert_eq!(regs.get(Register::Hue), Value::Number(120.0));
    }

    #[test]
    fn time_holds_patterns_or_delay() {
        let mut regs = Registers::default();
        regs.put(Register::Time, 2.0.into()).unwrap();
        assert_eq!(regs.time_raw(), &Value::Number(2000.0));
        let at = Value::At(vec![crate::model::TimePattern::parse("12:00").unwrap()]);
        regs.put(Register::Time, at.clone()).unwrap();
        assert_eq!(regs.get(Register::Time), at);
    }

    #[test]
    fn colour_registers_reject_strings() {
        let mut regs = Registers::default();
        let err = regs.put(Register::Saturation, "lots".into()).unwrap_err();
        assert!(err.to_string().contains("string"));
        assert!(regs.put(Register::UnitMode, 1.0.into()).is_err());
    }
}
