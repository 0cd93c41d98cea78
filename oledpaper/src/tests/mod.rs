
use std::sync::mpsc;
use std::time::Duration;

use crate::worker::WorkerEvent;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10);
pub(crate) const RECV_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to keep listening when asserting that nothing else arrives.
pub(crate) const QUIET_PERIOD: Duration = Duration::from_millis(100);

pub(crate) fn recv(rx: &mpsc::Receiver<WorkerEvent>) -> WorkerEvent {
    rx.recv_timeout(RECV_TIMEOUT)
        .expect("worker should deliver an event")
}

pub(crate) fn assert_quiet(rx: &mpsc::Receiver<WorkerEvent>) {
    if let Ok(event) = rx.recv_timeout(QUIET_PERIOD) {
        panic!("unexpected worker event: {event:?}");
    }
}
