use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

use crate::clock::Clock;
use crate::device::LightDevices;
use crate::dsl::instruction::Program;
use crate::jobs::{CancelToken, Job};
use crate::model::{LightSetHandle, UnitMode};
use crate::vm::{Machine, PrintSink, RunOutcome, RuntimeError, VmContext};

/// Everything a script run talks to, shared by all jobs of a runner.
pub struct Environment {
    pub devices: Arc<dyn LightDevices>,
    pub lights: LightSetHandle,
    pub clock: Arc<dyn Clock>,
    pub output: Arc<dyn PrintSink>,
    pub default_units: UnitMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Created,
    Queued,
    Running,
    Completed,
    Stopped,
    Failed,
}

/// A compiled script as a schedulable job. Each `execute` runs the program
/// on a fresh machine against a snapshot of the light set.
pub struct ScriptJob {
    name: String,
    program: Arc<Program>,
    env: Arc<Environment>,
    cancel: CancelToken,
    status: Mutex<JobStatus>,
    last_error: Mutex<Option<RuntimeError>>,
    final_state: Mutex<Option<Machine>>,
}

impl ScriptJob {
    pub fn new(name: &str, program: Arc<Program>, env: Arc<Environment>) -> Self {
        Self {
            name: name.to_string(),
            program,
            env,
            cancel: CancelToken::new(),
            status: Mutex::new(JobStatus::Created),
            last_error: Mutex::new(None),
            final_state: Mutex::new(None),
        }
    }

    pub fn status(&self) -> JobStatus {
        *self.status.lock()
    }

    pub fn last_error(&self) -> Option<RuntimeError> {
        self.last_error.lock().clone()
    }

    /// Machine as the last run left it.
    pub fn final_state(&self) -> Option<Machine> {
        self.final_state.lock().clone()
    }
}

impl Job for ScriptJob {
    fn execute(&self) {
        *self.status.lock() = JobStatus::Running;
        let lights = self.env.lights.snapshot();
        let mut machine = Machine::new(self.env.default_units);
        let ctx = VmContext {
            devices: self.env.devices.as_ref(),
            lights: &lights,
            clock: self.env.clock.as_ref(),
            output: self.env.output.as_ref(),
            cancel: &self.cancel,
        };
        let status = match machine.run(&self.program, &ctx) {
            Ok(RunOutcome::Completed) => {
                info!(script = %self.name, "script completed");
                JobStatus::Completed
            }
            Ok(RunOutcome::Stopped) => {
                info!(script = %self.name, "script stopped");
                JobStatus::Stopped
            }
            Err(e) => {
                error!(script = %self.name, error = %e, "script failed");
                *self.last_error.lock() = Some(e);
                JobStatus::Failed
            }
        };
        *self.final_state.lock() = Some(machine);
        *self.status.lock() = status;
    }

    fn request_stop(&self) {
        self.cancel.cancel();
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn queued(&self) {
        self.cancel.reset();
        *self.status.lock() = JobStatus::Queued;
    }

    fn failed(&self, reason: &str) {
        error!(script = %self.name, %reason, "script aborted");
        *self.status.lock() = JobStatus::Failed;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::device::FakeLights;
    use crate::dsl::compile_source;
    use crate::vm::CapturedOutput;

    fn job(source: &str) -> ScriptJob {
        let env = Environment {
            devices: Arc::new(FakeLights::new(FakeLights::default_lights())),
            lights: LightSetHandle::default(),
            clock: Arc::new(FakeClock::new()),
            output: Arc::new(CapturedOutput::new()),
            default_units: UnitMode::Logical,
        };
        ScriptJob::new("test", Arc::new(compile_source(source).unwrap()), Arc::new(env))
    }

    #[test]
    fn status_follows_the_lifecycle() {
        let job = job("assign n 1");
        assert_eq!(job.status(), JobStatus::Created);
        job.queued();
        assert_eq!(job.status(), JobStatus::Queued);
        job.execute();
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.final_state().is_some());
    }

    #[test]
    fn stop_before_a_device_call() {
        let job = job("set \"Top\"");
        job.request_stop();
        job.execute();
        assert_eq!(job.status(), JobStatus::Stopped);
        job.queued();
        job.execute();
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn aborted_run_is_failed() {
        let job = job("wait");
        job.failed("worker panicked");
        assert_eq!(job.status(), JobStatus::Failed);
    }
}
