//! Whole-run cancellation and deadlines

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared stop signal for one scan or enrichment run.
///
/// Clones share the same cancel flag, so a handle kept by the caller can stop
/// a run executing on worker threads. Work already finished when the signal
/// fires is still returned, flagged as interrupted.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    /// A control that never interrupts unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the run once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Build from an optional timeout in seconds as found in configuration.
    /// Non-finite or negative values disable the deadline.
    pub fn from_timeout_secs(timeout_secs: Option<f64>) -> Self {
        match timeout_secs.and_then(|s| Duration::try_from_secs_f64(s).ok()) {
            Some(timeout) => Self::with_timeout(timeout),
            None => {
                if let Some(secs) = timeout_secs {
                    log::warn!("Ignoring invalid timeout of {} seconds", secs);
                }
                Self::new()
            }
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// True once cancelled or past the deadline.
    pub fn is_interrupted(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
