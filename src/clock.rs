use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, Timelike};
use parking_lot::Mutex;

use crate::jobs::CancelToken;
use crate::model::TimePattern;

/// Time source for scripts. Both waits give up early when `cancel` fires
/// and return false in that case.
pub trait Clock: Send + Sync {
    fn pause_for(&self, ms: f64, cancel: &CancelToken) -> bool;

    /// Block until the local wall clock matches one of `patterns`.
    fn wait_until(&self, patterns: &[TimePattern], cancel: &CancelToken) -> bool;
}

/// Real clock. Sleeps in short slices so a stop request is noticed quickly.
#[derive(Debug, Clone)]
pub struct SystemClock {
    slice: Duration,
}

impl SystemClock {
    pub fn new(slice: Duration) -> Self {
        Self {
            slice: slice.max(Duration::from_millis(1)),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Clock for SystemClock {
    /// A pause too long to represent waits until cancelled.
    fn pause_for(&self, ms: f64, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let deadline = match Duration::try_from_secs_f64(ms / 1000.0) {
            Ok(length) => Instant::now().checked_add(length),
            Err(_) if ms > 0.0 => None,
            Err(_) => return true,
        };
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let nap = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    self.slice.min(deadline - now)
                }
                None => self.slice,
            };
            thread::sleep(nap);
        }
    }

    fn wait_until(&self, patterns: &[TimePattern], cancel: &CancelToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Local::now();
            if patterns.iter().any(|p| p.matches(now.hour(), now.minute())) {
                return true;
            }
            thread::sleep(self.slice);
        }
    }
}

/// Clock that never sleeps. Records what it was asked to do.
#[derive(Debug, Default)]
pub struct FakeClock {
    pauses: Mutex<Vec<f64>>,
    waits: Mutex<Vec<Vec<TimePattern>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in milliseconds.
    pub fn pauses(&self) -> Vec<f64> {
        self.pauses.lock().clone()
    }

    pub fn total_ms(&self) -> f64 {
        self.pauses.lock().iter().sum()
    }

    pub fn waits(&self) -> Vec<Vec<TimePattern>> {
        self.waits.lock().clone()
    }
}

impl Clock for FakeClock {
    fn pause_for(&self, ms: f64, cancel: &CancelToken) -> bool {
        self.pauses.lock().push(ms);
        !cancel.is_cancelled()
    }

    fn wait_until(&self, patterns: &[TimePattern], cancel: &CancelToken) -> bool {
        self.waits.lock().push(patterns.to_vec());
        !cancel.is_cancelled()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn system_pause_sleeps() {
        let clock = SystemClock::new(Duration::from_millis(5));
        let start = Instant::now();
        assert!(clock.pause_for(30.0, &CancelToken::new()));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancelled_pause_returns_early() {
        let clock = SystemClock::new(Duration::from_millis(5));
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(!clock.pause_for(10_000.0, &cancel));
        assert!(start.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn huge_pause_is_still_cancellable() {
        let clock = SystemClock::new(Duration::from_millis(5));
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!clock.pause_for(1.5e22, &cancel));
        assert!(!clock.pause_for(f64::INFINITY, &cancel));

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert!(!clock.pause_for(1.5e22, &cancel));
        stopper.join().unwrap();
    }

    #[test]
    fn zero_or_negative_pause_returns_at_once() {
        let clock = SystemClock::default();
        assert!(clock.pause_for(0.0, &CancelToken::new()));
        assert!(clock.pause_for(-5.0, &CancelToken::new()));
        assert!(clock.pause_for(f64::NAN, &CancelToken::new()));
    }

    #[test]
    fn wildcard_wait_returns_immediately() {
        let clock = SystemClock::default();
        let any = TimePattern::parse("*").unwrap();
        assert!(clock.wait_until(&[any], &CancelToken::new()));
    }

    #[test]
    fn fake_clock_records() {
        let clock = FakeClock::new();
        let cancel = CancelToken::new();
        assert!(clock.pause_for(1500.0, &cancel));
        assert!(clock.pause_for(500.0, &cancel));
        assert_eq!(clock.pauses(), vec![1500.0, 500.0]);
        assert_eq!(clock.total_ms(), 2000.0);
        cancel.cancel();
        assert!(!clock.pause_for(1.0, &cancel));
    }
}
