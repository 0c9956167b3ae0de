use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::device::LightDevices;
use crate::jobs::{CancelToken, Job};
use crate::model::LightSetHandle;
use crate::script_job::Environment;
use crate::settings::Settings;

/// Keeps the light set current. One pass rediscovers lights, drops stale
/// ones, then sleeps; run it as a repeating background job.
pub struct RefreshJob {
    devices: Arc<dyn LightDevices>,
    lights: LightSetHandle,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    interval: Duration,
    failure_interval: Duration,
    gc_age: Duration,
}

impl RefreshJob {
    pub fn new(env: &Environment, settings: &Settings) -> Self {
        Self {
            devices: Arc::clone(&env.devices),
            lights: env.lights.clone(),
            clock: Arc::clone(&env.clock),
            cancel: CancelToken::new(),
            interval: settings.refresh_interval(),
            failure_interval: settings.failure_interval(),
            gc_age: settings.light_gc_age(),
        }
    }
}

impl Job for RefreshJob {
    fn execute(&self) {
        let pause = match self.lights.discover(self.devices.as_ref()) {
            Ok(found) => {
                let removed = self.lights.garbage_collect(self.gc_age);
                debug!(found, removed, "light refresh");
                self.interval
            }
            Err(e) => {
                warn!(error = %e, "light refresh failed");
                self.failure_interval
            }
        };
        self.clock.pause_for(pause.as_secs_f64() * 1000.0, &self.cancel);
    }

    fn request_stop(&self) {
        self.cancel.cancel();
    }

    fn name(&self) -> String {
        "light-refresh".to_string()
    }

    fn queued(&self) {
        self.cancel.reset();
    }
}
