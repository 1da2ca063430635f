//! Polling Worker
//!
//! One long-lived tokio task per controller. Each tick unconditionally runs
//! the controller's time-based maintenance. A failed or panicking tick is
//! logged and retried after a backoff; only `stop` ends the loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::error::Result;

/// Bounded wait for the loop to exit on stop
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A controller driven by a `Worker`
pub trait Periodic: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// One maintenance pass
    fn tick(&self) -> Result<()>;

    /// Persist pending in-memory data (called on stop)
    fn flush(&self);
}

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    pub backoff: Duration,
}

impl Schedule {
    pub fn new(interval: Duration, backoff: Duration) -> Self {
        Self { interval, backoff }
    }
}

pub struct Worker {
    schedule: Schedule,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the loop; no-op (false) if already running.
    /// Must be called from within a tokio runtime.
    pub fn start<T: Periodic>(&self, task: Arc<T>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let name = task.name();
        let handle = tokio::spawn(run_loop(
            task,
            Arc::clone(&self.running),
            Arc::clone(&self.wake),
            self.schedule,
        ));
        *self.handle.lock() = Some(handle);

        log::info!("{} started (interval: {:?})", name, self.schedule.interval);
        true
    }

    /// Signal the loop, wait up to `JOIN_TIMEOUT`, then flush.
    /// No-op (false) if not running.
    pub async fn stop<T: Periodic>(&self, task: &T) -> bool {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.wake.notify_one();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("{} loop ended abnormally: {}", task.name(), e),
                Err(_) => log::warn!(
                    "{} loop did not exit within {:?}, continuing shutdown",
                    task.name(),
                    JOIN_TIMEOUT
                ),
            }
        }

        task.flush();
        log::info!("{} stopped", task.name());
        true
    }
}

async fn run_loop<T: Periodic>(
    task: Arc<T>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    schedule: Schedule,
) {
    log::info!("{} loop started", task.name());

    while running.load(Ordering::SeqCst) {
        let pause = match panic::catch_unwind(AssertUnwindSafe(|| task.tick())) {
            Ok(Ok(())) => schedule.interval,
            Ok(Err(e)) => {
                log::error!("{} tick failed: {}", task.name(), e);
                schedule.backoff
            }
            Err(_) => {
                log::error!("{} tick panicked", task.name());
                schedule.backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = wake.notified() => {}
        }
    }

    log::info!("{} loop stopped", task.name());
}
