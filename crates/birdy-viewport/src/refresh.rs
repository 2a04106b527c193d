//! Recurring auto-refresh task.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Calls a refresh action every period while enabled.
///
/// The first call happens one period after spawning. Pausing skips ticks
/// without stopping the timer; dropping the handle cancels the task, including
/// a refresh that is still running.
#[derive(Debug)]
pub struct AutoRefresh {
    enabled: watch::Sender<bool>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AutoRefresh {
    /// Spawn the refresh loop on the current tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (enabled, enabled_rx) = watch::channel(true);
        let token = CancellationToken::new();
        let task_token = token.clone();

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if !*enabled_rx.borrow() {
                    trace!("auto-refresh paused, skipping tick");
                    continue;
                }
                tokio::select! {
                    () = task_token.cancelled() => break,
                    () = action() => {}
                }
            }
            debug!("auto-refresh stopped");
        });

        Self {
            enabled,
            token,
            handle: Some(handle),
        }
    }

    /// Pause or resume refreshing.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.send_replace(enabled);
    }

    /// Whether ticks currently trigger a refresh.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
