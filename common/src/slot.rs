use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A single-value slot for cross-thread communication.
///
/// One side sends values, the other takes them. Only the latest value is
/// retained; sending overwrites any value that has not been taken yet.
/// The receiving side can block for a bounded time waiting for a value.
#[derive(Debug)]
pub struct Slot<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Stores a value, replacing any existing value.
    /// Returns true if a pending value was overwritten.
    pub fn send(&self, val: T) -> bool {
        let previous = self.value.lock().replace(val);
        self.ready.notify_one();

        previous.is_some()
    }

    /// Takes the value if present, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    /// Waits up to `timeout` for a value and takes it.
    /// Returns `None` if the slot stayed empty for the whole interval.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut value = self.value.lock();

        while value.is_none() {
            if self.ready.wait_until(&mut value, deadline).timed_out() {
                break;
            }
        }

        value.take()
    }

    /// Returns true if there is a value present.
    pub fn has_value(&self) -> bool {
        self.value.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn send_and_take() {
        let slot = Slot::new();
        assert!(!slot.has_value());

        slot.send(42);
        assert!(slot.has_value());

        assert_eq!(slot.take(), Some(42));
        assert!(!slot.has_value());
    }

    #[test]
    fn take_empty_returns_none() {
        let slot: Slot<i32> = Slot::new();
        assert!(slot.take().is_none());
    }

    #[test]
    fn send_overwrites_previous() {
        let slot = Slot::new();
        assert!(!slot.send(1));
        assert!(slot.send(2));
        assert!(slot.send(3));

        assert_eq!(slot.take(), Some(3));
        assert!(slot.take().is_none());
    }

    #[test]
    fn take_timeout_returns_none_when_empty() {
        let slot: Slot<i32> = Slot::new();

        let start = Instant::now();
        assert!(slot.take_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn take_timeout_returns_pending_value_immediately() {
        let slot = Slot::new();
        slot.send(7);

        assert_eq!(slot.take_timeout(Duration::from_secs(5)), Some(7));
    }

    #[test]
    fn take_timeout_wakes_on_send_from_other_thread() {
        let slot = Arc::new(Slot::new());

        let sender = thread::spawn({
            let slot = Arc::clone(&slot);
            move || {
                thread::sleep(Duration::from_millis(20));
                slot.send(5);
            }
        });

        let start = Instant::now();
        let value = slot.take_timeout(Duration::from_secs(5));
        assert_eq!(value, Some(5));
        assert!(start.elapsed() < Duration::from_secs(5));

        sender.join().unwrap();
    }

    #[test]
    fn last_send_survives_concurrent_senders() {
        let slot = Arc::new(Slot::new());

        let senders: Vec<_> = (0..4)
            .map(|id| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || {
                    for i in 0..100 {
                        slot.send(id * 1000 + i);
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.join().unwrap();
        }

        let value = slot.take().unwrap();
        assert_eq!(value % 1000, 99, "one sender's final value must remain");
        assert!(slot.take().is_none());
    }
}
