//! Closable gate around callback invocations.
//!
//! Subscriptions and sessions both promise that no callback starts once
//! their close call has returned. [`DeliveryGate::run`] holds the gate's lock
//! across the open check and the callback, and [`DeliveryGate::close`] takes
//! the same lock after flipping the flag, so it returns only once any
//! in-flight invocation has finished.
//!
//! The thread running a callback is recorded. Closing from inside the
//! callback, or delivering to the same gate from inside it, does not wait on
//! the lock that thread already holds.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Serialises callback invocations against closing.
pub struct DeliveryGate {
    open: AtomicBool,
    lock: Mutex<()>,
    holder: Mutex<Option<ThreadId>>,
}

impl fmt::Debug for DeliveryGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryGate")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the recorded holder when the callback returns or unwinds.
struct Holding<'a>(&'a DeliveryGate);

impl Drop for Holding<'_> {
    fn drop(&mut self) {
        *self.0.holder() = None;
    }
}

impl DeliveryGate {
    /// Creates an open gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            lock: Mutex::new(()),
            holder: Mutex::new(None),
        }
    }

    fn holder(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn held_here(&self) -> bool {
        *self.holder() == Some(thread::current().id())
    }

    /// Runs `f` if the gate is open. Returns `false` if it was closed.
    pub fn run(&self, f: impl FnOnce()) -> bool {
        if self.held_here() {
            // Nested delivery from inside a callback.
            if !self.is_open() {
                return false;
            }
            f();
            return true;
        }
        let _lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_open() {
            return false;
        }
        *self.holder() = Some(thread::current().id());
        let _holding = Holding(self);
        f();
        true
    }

    /// Closes the gate and waits for an in-flight callback on another thread.
    /// Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = self.open.swap(false, Ordering::AcqRel);
        if !self.held_here() {
            drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        }
        first
    }

    /// Whether [`DeliveryGate::close`] has not been called yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn close_waits_for_the_running_callback() {
        let gate = Arc::new(DeliveryGate::new());
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let worker = {
            let gate = Arc::clone(&gate);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                gate.run(|| {
                    started_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(50));
                    finished.store(true, Ordering::SeqCst);
                })
            })
        };

        started_rx.recv().unwrap();
        assert!(gate.close());
        assert!(finished.load(Ordering::SeqCst));
        assert!(!gate.close());
        assert!(worker.join().unwrap());
        assert!(!gate.run(|| panic!("gate is closed")));
    }

    #[test]
    fn reentrant_close_and_delivery_do_not_block() {
        let gate = DeliveryGate::new();
        let calls = AtomicUsize::new(0);
        assert!(gate.run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(gate.run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
            assert!(gate.close());
            assert!(!gate.run(|| panic!("closed from inside")));
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!gate.is_open());
    }
}
