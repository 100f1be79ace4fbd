use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// One-shot stop signal shared by every background loop of a connection.
///
/// Cancelling drops the only sender, so loops parked in [`CancelSignal::wait`]
/// wake immediately instead of sleeping out their interval.
#[derive(Debug)]
pub struct CancelSignal {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    wake: Receiver<()>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (trigger, wake) = crossbeam_channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            wake,
        }
    }

    /// Returns true for the call that actually flipped the signal.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.trigger.lock().take();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for `timeout` or until cancelled. Returns true when cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_when_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.wait(Duration::from_millis(5)));
    }

    #[test]
    fn test_cancel_wakes_waiters() {
        let signal = Arc::new(CancelSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                let start = Instant::now();
                let cancelled = signal.wait(Duration::from_secs(10));
                (cancelled, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(signal.cancel());
        assert!(!signal.cancel());

        let (cancelled, waited) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(waited < Duration::from_secs(5));
    }
}
