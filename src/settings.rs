use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::device::FakeLights;
use crate::error::AppError;
use crate::model::{DiscoveredLight, UnitMode};

/// Runtime configuration, read from a JSON file. Every field is optional in
/// the file; missing ones take the defaults below. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    /// Slice length for sleeps, so a stop request is noticed promptly.
    pub sleep_time: f64,
    /// Pause between light-discovery passes.
    pub refresh_sleep_time: f64,
    /// Pause after a discovery pass fails.
    pub failure_sleep_time: f64,
    /// Lights unseen for this long are dropped.
    pub light_gc_time: f64,
    pub use_fakes: bool,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub default_units: UnitMode,
    pub fake_lights: Vec<DiscoveredLight>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sleep_time: 0.1,
            refresh_sleep_time: 600.0,
            failure_sleep_time: 120.0,
            light_gc_time: 20.0 * 60.0,
            use_fakes: true,
            log_level: "info".to_string(),
            default_units: UnitMode::Logical,
            fake_lights: FakeLights::default_lights(),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

impl Settings {
    pub fn sleep_slice(&self) -> Duration {
        seconds(self.sleep_time)
    }

    pub fn refresh_interval(&self) -> Duration {
        seconds(self.refresh_sleep_time)
    }

    pub fn failure_interval(&self) -> Duration {
        seconds(self.failure_sleep_time)
    }

    pub fn light_gc_age(&self) -> Duration {
        seconds(self.light_gc_time)
    }
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, AppError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Save settings as pretty JSON, replacing the file atomically.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
