//! Job scheduling: a foreground queue run one job at a time on a worker
//! thread, plus independent background jobs on their own threads.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::AppError;

/// Shared stop flag, checked by long-running work between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// A unit of work the scheduler can run. `execute` may be called again
/// after it returns when the job repeats.
pub trait Job: Send + Sync {
    fn execute(&self);

    /// Ask a running `execute` to return early.
    fn request_stop(&self) {}

    fn name(&self) -> String {
        "job".to_string()
    }

    /// Called each time the job is placed in a queue or spawned.
    fn queued(&self) {}

    /// Called when `execute` panicked. The job is not resubmitted.
    fn failed(&self, _reason: &str) {}
}

/// Run one pass of `job`, turning a panic into a `failed` call. False if
/// it panicked.
fn run_guarded(job: &dyn Job) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| job.execute())) {
        Ok(()) => true,
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            error!(job = %job.name(), %reason, "job panicked");
            job.failed(&reason);
            false
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct QueuedJob {
    job: Arc<dyn Job>,
    repeat: bool,
}

#[derive(Default)]
struct Foreground {
    queue: VecDeque<QueuedJob>,
    current: Option<Arc<dyn Job>>,
    current_repeat: bool,
    worker_active: bool,
}

struct Background {
    job: Arc<dyn Job>,
    stop: CancelToken,
}

#[derive(Default)]
struct Shared {
    foreground: Mutex<Foreground>,
    background: Mutex<HashMap<u64, Background>>,
    next_id: AtomicU64,
    repeat_all: AtomicBool,
}

/// Handle to the scheduler. Clones share the same queue.
#[derive(Clone, Default)]
pub struct JobControl {
    shared: Arc<Shared>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every foreground job goes back on the queue after it runs.
    pub fn set_repeat(&self, repeat: bool) {
        self.shared.repeat_all.store(repeat, Ordering::Relaxed);
    }

    /// Queue `job` behind any others. Starts the worker thread if idle.
    pub fn add_job(&self, job: Arc<dyn Job>, repeat: bool) -> Result<(), AppError> {
        job.queued();
        let start_worker = {
            let mut fg = self.shared.foreground.lock();
            debug!(job = %job.name(), queued = fg.queue.len(), "job queued");
            fg.queue.push_back(QueuedJob { job, repeat });
            !std::mem::replace(&mut fg.worker_active, true)
        };
        if start_worker {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name("job-worker".to_string())
                .spawn(move || shared.run_queue());
            if let Err(e) = spawned {
                self.shared.foreground.lock().worker_active = false;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Run `job` on its own thread, outside the queue. Returns its id.
    pub fn spawn_job(&self, job: Arc<dyn Job>, repeat: bool) -> Result<u64, AppError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let stop = CancelToken::new();
        job.queued();
        self.shared.background.lock().insert(
            id,
            Background {
                job: Arc::clone(&job),
                stop: stop.clone(),
            },
        );
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("background-{id}"))
            .spawn(move || {
                info!(job = %job.name(), id, repeat, "background job started");
                while !stop.is_cancelled() {
                    if !run_guarded(job.as_ref()) || !repeat {
                        break;
                    }
                }
                shared.background.lock().remove(&id);
                info!(job = %job.name(), id, "background job finished");
            });
        if let Err(e) = spawned {
            self.shared.background.lock().remove(&id);
            return Err(e.into());
        }
        Ok(id)
    }

    /// Drop everything queued and stop the running job. Background jobs are
    /// stopped too when `stop_background` is set.
    pub fn request_stop(&self, stop_background: bool) {
        {
            let mut fg = self.shared.foreground.lock();
            let dropped = fg.queue.len();
            fg.queue.clear();
            fg.current_repeat = false;
            if let Some(job) = &fg.current {
                info!(job = %job.name(), dropped, "stopping current job");
                job.request_stop();
            }
        }
        if stop_background {
            for (id, bg) in self.shared.background.lock().iter() {
                debug!(id, job = %bg.job.name(), "stopping background job");
                bg.stop.cancel();
                bg.job.request_stop();
            }
        }
    }

    pub fn has_jobs(&self) -> bool {
        let busy = {
            let fg = self.shared.foreground.lock();
            fg.worker_active || !fg.queue.is_empty()
        };
        busy || !self.shared.background.lock().is_empty()
    }

    /// Block until no jobs remain. False if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        while self.has_jobs() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(?timeout, "jobs still running");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

impl Shared {
    fn run_queue(&self) {
        loop {
            let job = {
                let mut fg = self.foreground.lock();
                let Some(next) = fg.queue.pop_front() else {
                    fg.current = None;
                    fg.worker_active = false;
                    return;
                };
                fg.current = Some(Arc::clone(&next.job));
                fg.current_repeat = next.repeat || self.repeat_all.load(Ordering::Relaxed);
                next.job
            };

            info!(job = %job.name(), "job started");
            let completed = run_guarded(job.as_ref());

            let mut fg = self.foreground.lock();
            fg.current = None;
            if !completed {
                fg.current_repeat = false;
            }
            if fg.current_repeat {
                debug!(job = %job.name(), "job resubmitted");
                job.queued();
                fg.queue.push_back(QueuedJob { job, repeat: true });
            } else {
                info!(job = %job.name(), "job finished");
            }
        }
    }
}
