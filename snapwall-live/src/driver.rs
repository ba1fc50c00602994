//! Cancellable periodic drivers.
//!
//! A driver runs a callback on a fixed period until it is cancelled. The
//! owner holds the driver; dropping it cancels the task, so a torn-down
//! component cannot keep being ticked.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct PeriodicDriver {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicDriver {
    /// Run `tick` every `period`, first after one full period.
    ///
    /// Late ticks are skipped rather than bunched up.
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => tick(),
                }
            }
            log::debug!("{name} driver stopped");
        });
        log::debug!("{name} driver started ({}ms)", period.as_millis());

        Self {
            name,
            cancel,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop ticking. The callback is never invoked after this returns,
    /// except for an invocation already running on another worker.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Token shared with the task, for tying other work to this driver.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for PeriodicDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
