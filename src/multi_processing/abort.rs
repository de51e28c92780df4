use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct AbortState {
    aborted: AtomicBool,
    aborted_at: Mutex<Option<Instant>>,
}

/// Global abort signal shared by the scheduler, the workers and the collector.
///
/// Once raised it stays raised until [`reset`](AbortSignal::reset); clones
/// observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Only the first call records the abort time.
    pub fn abort(&self) {
        let mut aborted_at = self.state.aborted_at.lock().unwrap_or_else(PoisonError::into_inner);
        if aborted_at.is_none() {
            *aborted_at = Some(Instant::now());
        }
        self.state.aborted.store(true, Ordering::SeqCst);
    }

    /// Lower the signal and forget the abort time
    pub fn reset(&self) {
        let mut aborted_at = self.state.aborted_at.lock().unwrap_or_else(PoisonError::into_inner);
        *aborted_at = None;
        self.state.aborted.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    /// Time elapsed since the signal was raised
    pub fn time_since_abort(&self) -> Option<Duration> {
        self.state
            .aborted_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed())
    }
}
