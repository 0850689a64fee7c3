//! Cancellation for sleeping loops.
//!
//! A stop request is a disconnected channel: once [`StopHandle::stop`] drops
//! the only sender, every receiver wakes up and stays woken. Handles and
//! signals can be cloned freely.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Create a connected handle/signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = channel::bounded::<()>(0);
    let handle = StopHandle {
        sender: Arc::new(Mutex::new(Some(tx))),
    };
    let signal = StopSignal {
        receiver: rx,
        _keep_alive: None,
    };
    (handle, signal)
}

/// Requests a stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl StopHandle {
    /// Request a stop. Calling it again has no effect.
    pub fn stop(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_stopped(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Observes stop requests.
#[derive(Debug, Clone)]
pub struct StopSignal {
    receiver: Receiver<()>,
    _keep_alive: Option<Sender<()>>,
}

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = channel::bounded::<()>(0);
        Self {
            receiver: rx,
            _keep_alive: Some(tx),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block for up to `timeout`. Returns `true` if a stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.receiver.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn stop_is_sticky_and_idempotent() {
        let (handle, signal) = stop_channel();
        assert!(!signal.is_stopped());
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
        assert!(signal.is_stopped());
        assert!(signal.clone().is_stopped());
    }

    #[test]
    fn wait_times_out_without_stop() {
        let (_handle, signal) = stop_channel();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn stop_wakes_waiter() {
        let (handle, signal) = stop_channel();
        let started = Instant::now();
        let waiter = thread::spawn(move || signal.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        handle.stop();
        assert!(waiter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn never_signal_stays_quiet() {
        let signal = StopSignal::never();
        assert!(!signal.is_stopped());
        assert!(!signal.wait_timeout(Duration::from_millis(1)));
    }
}
