use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handle for a scheduled one-shot job. Cancelling flips a flag that is
/// checked immediately before the job runs; a cancelled job never executes.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Deferred execution seam. The session core issues "run this after a delay"
/// intents through this trait instead of touching thread primitives, so tests
/// can drive firing deterministically.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle;
}

/// Production scheduler: one sleeper thread per scheduled job, matching the
/// single-shot lock timer this crate needs.
#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let handle = TimerHandle::new();
        let thread_handle = handle.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if !thread_handle.is_cancelled() {
                job();
            }
        });
        handle
    }
}
