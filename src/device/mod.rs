pub mod fake;

use thiserror::Error;

use crate::model::{ColorMatrix, DiscoveredLight, Hsbk};

pub use fake::{Action, FakeLights};

/// Power level sent for `on`.
pub const POWER_ON: u16 = 65535;

/// Addressee of a colour or power command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every light, as a single broadcast.
    All,
    Light(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Unknown light: \"{0}\"")]
    UnknownLight(String),
    #[error("Light \"{0}\" has no zones")]
    NotMultizone(String),
    #[error("Light \"{0}\" has no cell matrix")]
    NotMatrix(String),
    #[error("Light \"{name}\" did not respond: {reason}")]
    Unreachable { name: String, reason: String },
    #[error("Device discovery failed: {0}")]
    Discovery(String),
}

/// The network-facing light layer. Durations are milliseconds and zone ranges
/// are half-open. Matrix lights are read and written whole.
pub trait LightDevices: Send + Sync {
    fn discover(&self) -> Result<Vec<DiscoveredLight>, DeviceError>;

    fn set_color(&self, target: &Target, color: Hsbk, duration_ms: f64)
        -> Result<(), DeviceError>;

    fn set_power(&self, target: &Target, level: u16, duration_ms: f64) -> Result<(), DeviceError>;

    fn get_color(&self, name: &str) -> Result<Hsbk, DeviceError>;

    fn set_zone_color(
        &self,
        name: &str,
        first_zone: u32,
        last_zone: u32,
        color: Hsbk,
        duration_ms: f64,
    ) -> Result<(), DeviceError>;

    fn get_zone_colors(
        &self,
        name: &str,
        first_zone: u32,
        last_zone: u32,
    ) -> Result<Vec<Hsbk>, DeviceError>;

    fn get_matrix(&self, name: &str) -> Result<ColorMatrix, DeviceError>;

    fn set_matrix(
        &self,
        name: &str,
        matrix: &ColorMatrix,
        duration_ms: f64,
    ) -> Result<(), DeviceError>;
}
