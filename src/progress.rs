//! Progress notification and the cooperative yield that follows it.
//!
//! The installer runs on a single thread. After every progress report the
//! reporter yields to the runtime and pauses briefly, so a host UI sharing
//! that thread gets a chance to repaint before the next blocking step.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tracing::info;

/// Callbacks an installer front end registers. All default to no-ops.
pub trait InstallListener: Send + Sync {
    fn on_progress(&self, _percentage: u8, _message: &str) {}
    fn on_finished(&self, _success: bool, _message: &str) {}
    fn on_error(&self, _message: &str) {}
}

/// Listener that ignores everything.
pub struct SilentListener;

impl InstallListener for SilentListener {}

pub struct ProgressReporter<'a> {
    listener: &'a dyn InstallListener,
    pause: Duration,
    current: AtomicU8,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(listener: &'a dyn InstallListener, pause: Duration) -> Self {
        Self {
            listener,
            pause,
            current: AtomicU8::new(0),
        }
    }

    /// Notify the listener, then yield (see [`yield_point`]).
    pub async fn report(&self, percentage: u8, message: &str) {
        let percentage = percentage.min(100);
        self.current.store(percentage, Ordering::Relaxed);
        info!("[{:>3}%] {}", percentage, message);
        self.listener.on_progress(percentage, message);
        yield_point(self.pause).await;
    }

    /// Last percentage reported.
    pub fn current(&self) -> u8 {
        self.current.load(Ordering::Relaxed)
    }
}

/// Hand control back to the runtime, then sleep for `pause`.
pub async fn yield_point(pause: Duration) {
    tokio::task::yield_now().await;
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}
