use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Cancellable-timer debouncer. Each call to `schedule` invalidates the
/// previously armed timer before arming a new one, so only the task from
/// the most recent call can ever fire.
pub struct Debouncer {
    quiet_period: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
        }
    }

    /// Arm a timer that runs `task` after the quiet period, cancelling any
    /// previously armed timer.
    pub fn schedule<F, Fut>(&mut self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let quiet_period = self.quiet_period;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            task().await;
        }));
    }

    /// Cancel the pending timer, if any, without arming a new one.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
