use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::dsl::compile_source;
use crate::error::AppError;
use crate::jobs::JobControl;
use crate::refresh::RefreshJob;
use crate::script_job::{Environment, ScriptJob};
use crate::settings::Settings;

/// Front door for running scripts: compiles sources into jobs and hands them
/// to a shared scheduler.
pub struct ScriptRunner {
    control: JobControl,
    env: Arc<Environment>,
    settings: Settings,
}

impl ScriptRunner {
    /// Build a runner and take a first look at the lights. A failed first
    /// discovery is logged; the refresh job can still fill the set later.
    pub fn new(env: Environment, settings: Settings) -> Self {
        if let Err(e) = env.lights.discover(env.devices.as_ref()) {
            warn!(error = %e, "initial light discovery failed");
        }
        Self {
            control: JobControl::new(),
            env: Arc::new(env),
            settings,
        }
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.control.set_repeat(repeat);
    }

    fn compile(&self, name: &str, source: &str) -> Result<Arc<ScriptJob>, AppError> {
        let program = compile_source(source)?;
        info!(script = %name, instructions = program.len(), "script compiled");
        Ok(Arc::new(ScriptJob::new(
            name,
            Arc::new(program),
            Arc::clone(&self.env),
        )))
    }

    /// Compile `source` and queue it behind any running scripts.
    pub fn queue_script(
        &self,
        name: &str,
        source: &str,
        repeat: bool,
    ) -> Result<Arc<ScriptJob>, AppError> {
        let job = self.compile(name, source)?;
        self.control.add_job(job.clone(), repeat)?;
        Ok(job)
    }

    /// Compile `source` and run it on its own thread, beside the queue.
    pub fn spawn_script(
        &self,
        name: &str,
        source: &str,
        repeat: bool,
    ) -> Result<Arc<ScriptJob>, AppError> {
        let job = self.compile(name, source)?;
        self.control.spawn_job(job.clone(), repeat)?;
        Ok(job)
    }

    /// Start the repeating light-discovery job.
    pub fn start_refresh(&self) -> Result<u64, AppError> {
        let job = RefreshJob::new(&self.env, &self.settings);
        self.control.spawn_job(Arc::new(job), true)
    }

    pub fn request_stop(&self, stop_background: bool) {
        self.control.request_stop(stop_background);
    }

    pub fn has_jobs(&self) -> bool {
        self.control.has_jobs()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.control.wait_idle(timeout)
    }
}
