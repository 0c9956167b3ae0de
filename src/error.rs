use serde::Serialize;
use thiserror::Error;

use crate::device::DeviceError;
use crate::dsl::error::CompileError;
use crate::vm::RuntimeError;

/// Top-level error for the runner, settings and CLI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{} compile error(s)", .0.len())]
    Compile(Vec<CompileError>),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<Vec<CompileError>> for AppError {
    fn from(errors: Vec<CompileError>) -> Self {
        AppError::Compile(errors)
    }
}

impl Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
