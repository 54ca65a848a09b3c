//! Cooperative pause and cancellation for crawl chains and the downloader.
//!
//! Neither primitive interrupts running work. Chains poll a [`CrawlControl`]
//! between units of work: cancellation ends the chain quietly, pause parks it
//! until [`PauseController::resume`] is called.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

pub use tokio_util::sync::CancellationToken;

/// Shared suspend switch.
///
/// Cloning yields another handle to the same switch.
#[derive(Debug, Clone)]
pub struct PauseController {
    state: Arc<watch::Sender<bool>>,
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseController {
    /// Creates a controller in the running (not paused) state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn pause(&self) {
        self.state.send_replace(true);
        debug!("pause requested");
    }

    pub fn resume(&self) {
        self.state.send_replace(false);
        debug!("resume requested");
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.state.borrow()
    }

    /// Returns immediately when running, otherwise waits for [`resume`](Self::resume).
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

/// Outcome of a control check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Stop,
}

/// Pause and cancel handles passed into every chain iteration.
#[derive(Debug, Clone, Default)]
pub struct CrawlControl {
    pause: PauseController,
    cancel: CancellationToken,
}

impl CrawlControl {
    #[must_use]
    pub fn new(pause: PauseController, cancel: CancellationToken) -> Self {
        Self { pause, cancel }
    }

    #[must_use]
    pub fn pause_controller(&self) -> &PauseController {
        &self.pause
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Blocks while paused; reports [`Checkpoint::Stop`] once cancelled.
    ///
    /// Cancellation also releases a paused waiter.
    pub async fn checkpoint(&self) -> Checkpoint {
        if self.cancel.is_cancelled() {
            return Checkpoint::Stop;
        }

        if self.pause.is_paused() {
            debug!("paused, waiting for resume");
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Checkpoint::Stop,
                () = self.pause.wait_until_resumed() => {}
            }
        }

        if self.cancel.is_cancelled() {
            Checkpoint::Stop
        } else {
            Checkpoint::Continue
        }
    }
}
