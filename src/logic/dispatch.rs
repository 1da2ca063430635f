//! Background Dispatch
//!
//! Hands slow collaborator calls (mail gateway, firewall commands) to a
//! dedicated thread so ingestion never waits on them. Requests are handled
//! one at a time in submission order. `submit` never blocks: a full or
//! closed queue drops the request and returns false.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::mpsc::{self, error::TrySendError};

pub struct Dispatcher<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Spawn the delivery thread. It exits once the dispatcher is dropped and
    /// the queue has drained.
    pub fn spawn<F>(name: &'static str, capacity: usize, mut handler: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<T>(capacity.max(1));

        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Some(item) = rx.blocking_recv() {
                if panic::catch_unwind(AssertUnwindSafe(|| handler(item))).is_err() {
                    log::error!("{} handler panicked", name);
                }
            }
            log::debug!("{} thread stopped", name);
        });

        // A failed spawn drops the receiver; submits then report a closed queue
        if let Err(e) = spawned {
            log::error!("Failed to start {} thread: {}", name, e);
        }

        Self { name, tx }
    }

    /// Queue a request; false if it was dropped
    pub fn submit(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("{} queue full, request dropped", self.name);
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::error!("{} thread is gone, request dropped", self.name);
                false
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::time::{Duration, Instant};

    /// Poll `cond` until it holds or `timeout` passes
    pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::wait_until;
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_handles_in_submission_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::spawn("ordered", 16, move |n: u32| sink.lock().push(n));

        for n in 0..10 {
            assert!(dispatcher.submit(n));
        }
        assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 10));
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_submit_does_not_wait_for_handler() {
        let dispatcher = Dispatcher::spawn("slow", 4, |_: ()| {
            std::thread::sleep(Duration::from_millis(500));
        });

        let started = Instant::now();
        assert!(dispatcher.submit(()));
        assert!(dispatcher.submit(()));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_full_queue_drops_request() {
        let dispatcher = Dispatcher::spawn("stuck", 1, |_: ()| {
            std::thread::sleep(Duration::from_secs(1));
        });

        // One in flight, one queued; the rest overflow
        let accepted = (0..5).filter(|_| dispatcher.submit(())).count();
        assert!(accepted < 5);
    }

    #[test]
    fn test_panicking_handler_keeps_thread_alive() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::spawn("fragile", 8, move |n: u32| {
            if n == 0 {
                panic!("bad request");
            }
            sink.lock().push(n);
        });

        dispatcher.submit(0);
        dispatcher.submit(1);
        assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 1));
    }
}
