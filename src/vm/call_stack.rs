use std::collections::HashMap;

use crate::dsl::instruction::Value;

use super::RuntimeError;

/// Deepest routine nesting before a run is aborted.
pub const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone, Default)]
struct Frame {
    vars: HashMap<String, Value>,
    return_to: usize,
}

/// Variable scopes. The global frame is always present; each routine call
/// pushes a frame built up beforehand by `add_param` and `set_return`.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    global: HashMap<String, Value>,
    frames: Vec<Frame>,
    pending: Frame,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind a parameter into the frame of the next call.
    pub fn add_param(&mut self, name: &str, value: Value) {
        self.pending.vars.insert(name.to_string(), value);
    }

    pub fn set_return(&mut self, offset: usize) {
        self.pending.return_to = offset;
    }

    /// Enter the pending frame.
    pub fn push_current(&mut self) -> Result<(), RuntimeError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        self.frames.push(std::mem::take(&mut self.pending));
        Ok(())
    }

    /// Leave the innermost routine frame, returning where to resume.
    pub fn pop_current(&mut self) -> Option<usize> {
        self.frames.pop().map(|frame| frame.return_to)
    }

    /// Look a name up in the current routine frame, then globally.
    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.vars.get(name))
            .or_else(|| self.global.get(name))
    }

    /// Update an existing binding, current frame first. New names are created
    /// in the current frame.
    pub fn put_variable(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(slot) = frame.vars.get_mut(name) {
                *slot = value;
                return;
            }
            if let Some(slot) = self.global.get_mut(name) {
                *slot = value;
                return;
            }
            frame.vars.insert(name.to_string(), value);
        } else {
            self.global.insert(name.to_string(), value);
        }
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.global
    }

    pub fn clear(&mut self) {
        self.global.clear();
        self.frames.clear();
        self.pending = Frame::default();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn params_live_in_the_call_frame() {
        let mut stack = CallStack::new();
        stack.put_variable("n", 1.0.into());
        stack.add_param("x", 5.0.into());
        stack.set_return(42);
        stack.push_current().unwrap();

        assert_eq!(stack.get_variable("x"), Some(&Value::Number(5.0)));
        assert_eq!(stack.get_variable("n"), Some(&Value::Number(1.0)));
        stack.put_variable("n", 2.0.into());
        stack.put_variable("local", 3.0.into());

        assert_eq!(stack.pop_current(), Some(42));
        assert!(stack.get_variable("x").is_none());
        assert!(stack.get_variable("local").is_none());
        assert_eq!(stack.get_variable("n"), Some(&Value::Number(2.0)));
        assert_eq!(stack.pop_current(), None);
    }

    #[test]
    fn depth_is_bounded() {
        let mut stack = CallStack::new();
        for _ in 0..MAX_CALL_DEPTH {
            stack.push_current().unwrap();
        }
        assert!(matches!(
            stack.push_current(),
            Err(RuntimeError::CallDepthExceeded(_))
        ));
        stack.clear();
        assert_eq!(stack.depth(), 0);
    }
}
