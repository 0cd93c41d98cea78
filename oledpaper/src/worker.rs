use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use common::slot::Slot;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::cache::ResultCache;
use crate::error::{Error, Result};
use crate::image_store::{ImageStore, Snapshot};
use crate::pixel_buffer::PixelBuffer;
use crate::threshold::{self, Threshold};

/// Latest-value-wins mailbox feeding the worker.
pub type ParameterChannel = Slot<Threshold>;

/// Output of one completed compute pass. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedResult {
    pub buffer: PixelBuffer,
    pub threshold: Threshold,
    pub source_version: u64,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Processed(Arc<ProcessedResult>),
    Failed {
        threshold: Threshold,
        source_version: u64,
        error: Error,
    },
}

impl WorkerEvent {
    pub fn threshold(&self) -> Threshold {
        match self {
            WorkerEvent::Processed(result) => result.threshold,
            WorkerEvent::Failed { threshold, .. } => *threshold,
        }
    }

    pub fn source_version(&self) -> u64 {
        match self {
            WorkerEvent::Processed(result) => result.source_version,
            WorkerEvent::Failed { source_version, .. } => *source_version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Running = 0,
    WaitingForValue = 1,
    Computing = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Running,
            1 => WorkerState::WaitingForValue,
            2 => WorkerState::Computing,
            _ => WorkerState::Stopped,
        }
    }
}

/// Shared state the worker thread reads from.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub store: Arc<ImageStore>,
    pub params: Arc<ParameterChannel>,
    pub cache: Arc<Mutex<ResultCache>>,
    pub poll_interval: Duration,
}

#[derive(Debug)]
pub struct ThresholdWorker {
    thread_handle: Option<thread::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl ThresholdWorker {
    pub fn start<Callback>(ctx: WorkerContext, callback: Callback) -> Result<Self>
    where
        Callback: Fn(WorkerEvent) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(WorkerState::Running as u8));

        let thread_handle = thread::Builder::new()
            .name("threshold-worker".into())
            .spawn({
                let stop = Arc::clone(&stop);
                let state = Arc::clone(&state);
                move || worker_loop(ctx, &stop, &state, callback)
            })?;

        info!("threshold worker started");

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop,
            state,
        })
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread_handle
            .as_ref()
            .map(|handle| handle.thread().id())
    }

    /// Signals the worker to stop and waits for its thread to exit.
    ///
    /// Returns once no further callbacks can fire. Calling it again is a no-op.
    ///
    /// From inside a callback the thread can't join itself: the stop flag is
    /// still raised, so the loop exits after the callback returns, but the
    /// call fails with [`Error::StopFromWorkerThread`].
    pub fn stop(&mut self) -> Result<()> {
        if self.thread_id() == Some(thread::current().id()) {
            self.stop.store(true, Ordering::Release);
            return Err(Error::StopFromWorkerThread);
        }

        let Some(thread_handle) = self.thread_handle.take() else {
            return Ok(());
        };

        self.stop.store(true, Ordering::Release);

        if thread_handle.join().is_err() {
            self.state
                .store(WorkerState::Stopped as u8, Ordering::Release);
            return Err(Error::WorkerPanicked);
        }

        info!("threshold worker stopped");
        Ok(())
    }
}

impl Drop for ThresholdWorker {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("ThresholdWorker dropped while running; stopping it");
            match self.stop() {
                Ok(()) => {}
                // detached; the loop exits once the current callback returns
                Err(Error::StopFromWorkerThread) => debug!("worker dropped from its own thread"),
                Err(err) => error!(%err, "failed to join threshold worker"),
            }
        }
    }
}

fn worker_loop<Callback>(ctx: WorkerContext, stop: &AtomicBool, state: &AtomicU8, callback: Callback)
where
    Callback: Fn(WorkerEvent),
{
    let set_state = |s: WorkerState| state.store(s as u8, Ordering::Release);

    while !stop.load(Ordering::Acquire) {
        set_state(WorkerState::WaitingForValue);

        let Some(threshold) = ctx.params.take_timeout(ctx.poll_interval) else {
            continue;
        };

        let snapshot = match ctx.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(_) => {
                debug!(%threshold, "no image loaded, skipping");
                continue;
            }
        };

        set_state(WorkerState::Computing);
        callback(process(&ctx.cache, snapshot, threshold));
    }

    set_state(WorkerState::Stopped);
}

fn process(cache: &Mutex<ResultCache>, snapshot: Snapshot, threshold: Threshold) -> WorkerEvent {
    let source_version = snapshot.source_version;

    if let Some(cached) = cache.lock().processed(source_version, threshold) {
        trace!(%threshold, source_version, "result cache hit");
        return WorkerEvent::Processed(cached);
    }

    match threshold::apply(&snapshot.buffer, threshold) {
        Ok(buffer) => {
            let result = Arc::new(ProcessedResult {
                buffer,
                threshold,
                source_version,
            });
            cache.lock().insert_processed(Arc::clone(&result));

            debug!(%threshold, source_version, "threshold applied");
            WorkerEvent::Processed(result)
        }
        Err(error) => {
            warn!(%threshold, source_version, %error, "threshold pass failed");
            WorkerEvent::Failed {
                threshold,
                source_version,
                error,
            }
        }
    }
}
