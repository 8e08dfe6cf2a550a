use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::error::Result;

/// Something the scheduler re-polls on every tick
#[async_trait]
pub trait Refreshable: Send + Sync + 'static {
    /// Ticks stop for good once this turns false
    fn is_mounted(&self) -> bool;

    /// Ticks are skipped until the initial load has finished, found or not
    fn has_settled(&self) -> bool;

    /// Re-fetch. Errors are logged and the next tick tries again.
    async fn tick(&self) -> Result<()>;

    fn label(&self) -> String;
}

/// Fixed-period refresh loop bound to one level's lifetime
///
/// The loop only holds a weak reference to its target, and the task is
/// aborted on `stop` or when the scheduler is dropped.
pub struct RefreshScheduler {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: Mutex::new(None),
        }
    }

    /// Start ticking. A loop that is already running is replaced.
    pub fn start<T: Refreshable>(&self, target: Weak<T>) {
        let task = tokio::spawn(run(target, self.period));
        if let Some(previous) = self.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(task) = self.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<T: Refreshable>(target: Weak<T>, period: Duration) {
    // First tick one full period after start; the initial load is the owner's job
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(target) = target.upgrade() else {
            return;
        };
        if !target.is_mounted() {
            return;
        }
        if !target.has_settled() {
            debug!(level = %target.label(), "Skipping refresh until the first load completes");
            continue;
        }

        debug!(level = %target.label(), "Refreshing");
        if let Err(e) = target.tick().await {
            error!(level = %target.label(), error = %e, "Auto-refresh failed, retrying on the next tick");
        }
    }
}
