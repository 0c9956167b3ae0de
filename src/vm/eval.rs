use std::cmp::Ordering;

use crate::dsl::instruction::{Operator, Value};

use super::RuntimeError;

/// Operand stack for expression evaluation and set traversal.
#[derive(Debug, Clone, Default)]
pub struct EvalStack {
    values: Vec<Value>,
}

impl EvalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Drop everything above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Apply `op` to the top of the stack. Binary operators take the
    /// right-hand operand from the top.
    pub fn apply(&mut self, op: Operator) -> Result<(), RuntimeError> {
        let rhs = self.pop()?;
        let value = if op.is_unary() {
            unary(op, &rhs)?
        } else {
            let lhs = self.pop()?;
            binary(op, &lhs, &rhs)?
        };
        self.push(value);
        Ok(())
    }
}

fn number(value: &Value) -> Result<f64, RuntimeError> {
    value
        .as_number()
        .ok_or_else(|| RuntimeError::type_mismatch("number", value))
}

fn unary(op: Operator, value: &Value) -> Result<Value, RuntimeError> {
    match op {
        Operator::Not => Ok(Value::Bool(!value.is_truthy())),
        _ => Ok(Value::Number(-number(value)?)),
    }
}

fn binary(op: Operator, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let value = match op {
        Operator::Add => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Value::Str(format!("{a}{b}")),
            _ => Value::Number(number(lhs)? + number(rhs)?),
        },
        Operator::Sub => Value::Number(number(lhs)? - number(rhs)?),
        Operator::Mul => Value::Number(number(lhs)? * number(rhs)?),
        Operator::Div => {
            let divisor = nonzero(rhs)?;
            Value::Number(number(lhs)? / divisor)
        }
        // Result takes the sign of the divisor.
        Operator::Mod => {
            let divisor = nonzero(rhs)?;
            let n = number(lhs)?;
            Value::Number(n - divisor * (n / divisor).floor())
        }
        Operator::And => Value::Bool(lhs.is_truthy() && rhs.is_truthy()),
        Operator::Or => Value::Bool(lhs.is_truthy() || rhs.is_truthy()),
        Operator::Eq => Value::Bool(equal(lhs, rhs)),
        Operator::NotEq => Value::Bool(!equal(lhs, rhs)),
        Operator::Lt | Operator::LtEq | Operator::Gt | Operator::GtEq => {
            let ord = compare(lhs, rhs)?;
            Value::Bool(match op {
                Operator::Lt => ord == Ordering::Less,
                Operator::LtEq => ord != Ordering::Greater,
                Operator::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        Operator::Not | Operator::Neg => return unary(op, rhs),
    };
    Ok(value)
}

fn nonzero(value: &Value) -> Result<f64, RuntimeError> {
    let n = number(value)?;
    if n == 0.0 {
        Err(RuntimeError::DivisionByZero)
    } else {
        Ok(n)
    }
}

fn equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
        return Ok(a.cmp(b));
    }
    let (a, b) = (number(lhs)?, number(rhs)?);
    Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eval(lhs: impl Into<Value>, rhs: impl Into<Value>, op: Operator) -> Result<Value, RuntimeError> {
        let mut stack = EvalStack::new();
        stack.push(lhs.into());
        stack.push(rhs.into());
        stack.apply(op)?;
        stack.pop()
    }

    #[test]
    fn left_operand_is_pushed_first() {
        assert_eq!(eval(10.0, 4.0, Operator::Sub).unwrap(), Value::Number(6.0));
        assert_eq!(eval(10.0, 4.0, Operator::Div).unwrap(), Value::Number(2.5));
        assert_eq!(eval(1.0, 2.0, Operator::Lt).unwrap(), Value::Bool(true));
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(eval(7.0, 3.0, Operator::Mod).unwrap(), Value::Number(1.0));
        assert_eq!(eval(-7.0, 3.0, Operator::Mod).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(eval(1.0, 0.0, Operator::Div), Err(RuntimeError::DivisionByZero)));
        assert!(matches!(eval(1.0, 0.0, Operator::Mod), Err(RuntimeError::DivisionByZero)));
    }

    #[test]
    fn strings_concatenate_and_compare() {
        assert_eq!(eval("ab", "cd", Operator::Add).unwrap(), Value::from("abcd"));
        assert_eq!(eval("Top", "Top", Operator::Eq).unwrap(), Value::Bool(true));
        assert_eq!(eval("a", "b", Operator::Lt).unwrap(), Value::Bool(true));
        assert!(eval("a", 1.0, Operator::Mul).is_err());
    }

    #[test]
    fn null_compares_structurally() {
        assert_eq!(eval("Top", Value::NULL, Operator::NotEq).unwrap(), Value::Bool(true));
        assert_eq!(eval(Value::NULL, Value::NULL, Operator::Eq).unwrap(), Value::Bool(true));
        assert_eq!(eval(true, 1.0, Operator::Eq).unwrap(), Value::Bool(true));
    }

    #[test]
    fn unary_and_underflow() {
        let mut stack = EvalStack::new();
        stack.push(Value::Number(3.0));
        stack.apply(Operator::Neg).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::Number(-3.0));
        assert!(matches!(stack.apply(Operator::Not), Err(RuntimeError::StackUnderflow)));
    }
}
