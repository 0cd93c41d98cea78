//! Presenter-facing entry point.
//!
//! [`Pipeline`] owns the image store, the parameter channel, the result
//! cache and the worker thread. A presenter loads images, requests
//! thresholds and receives [`WorkerEvent`]s, either through a callback that
//! runs on the worker thread or through an [`mpsc::Receiver`] it drains on
//! its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, ThreadId};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::cache::{DisplayKey, ResultCache};
use crate::config::Config;
use crate::display::{self, DisplayImage};
use crate::error::{Error, Result};
use crate::image_store::ImageStore;
use crate::pixel_buffer::PixelBuffer;
use crate::threshold::Threshold;
use crate::worker::{
    ParameterChannel, ProcessedResult, ThresholdWorker, WorkerContext, WorkerEvent, WorkerState,
};

#[derive(Debug)]
pub struct Pipeline {
    pub(crate) store: Arc<ImageStore>,
    params: Arc<ParameterChannel>,
    pub(crate) cache: Arc<Mutex<ResultCache>>,
    current: Arc<ArcSwapOption<ProcessedResult>>,
    requested: Mutex<Option<Threshold>>,
    worker: Mutex<Option<ThresholdWorker>>,
    worker_thread: Option<ThreadId>,
    // held for the whole stop-and-join so every shutdown caller waits for it
    shutdown_lock: Mutex<()>,
    shut_down: AtomicBool,
}

impl Pipeline {
    /// Starts the worker. `on_result` is invoked on the worker thread for
    /// every delivered result or failure.
    pub fn new<Callback>(config: &Config, on_result: Callback) -> Result<Self>
    where
        Callback: Fn(WorkerEvent) + Send + 'static,
    {
        config.validate()?;

        let store = Arc::new(ImageStore::new());
        let params = Arc::new(ParameterChannel::new());
        let cache = Arc::new(Mutex::new(ResultCache::new(config.cache_capacity)));
        let current: Arc<ArcSwapOption<ProcessedResult>> = Arc::new(ArcSwapOption::empty());

        let ctx = WorkerContext {
            store: Arc::clone(&store),
            params: Arc::clone(&params),
            cache: Arc::clone(&cache),
            poll_interval: config.poll_interval(),
        };

        let worker = ThresholdWorker::start(ctx, {
            let current = Arc::clone(&current);
            move |event: WorkerEvent| {
                if let WorkerEvent::Processed(result) = &event {
                    current.store(Some(Arc::clone(result)));
                }
                on_result(event);
            }
        })?;

        Ok(Self {
            store,
            params,
            cache,
            current,
            requested: Mutex::new(None),
            worker_thread: worker.thread_id(),
            worker: Mutex::new(Some(worker)),
            shutdown_lock: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Starts the worker with delivery as message passing: events are sent
    /// to the returned receiver for the presenter to drain on its own thread.
    pub fn with_channel(config: &Config) -> Result<(Self, mpsc::Receiver<WorkerEvent>)> {
        let (tx, rx) = mpsc::channel();

        let pipeline = Self::new(config, move |event| {
            // a dropped receiver only means nobody is listening anymore
            let _ = tx.send(event);
        })?;

        Ok((pipeline, rx))
    }

    /// Replaces the source image and invalidates every cached result.
    ///
    /// The most recently requested threshold is re-posted so the new image
    /// gets rendered without another request.
    pub fn load_image(&self, buffer: PixelBuffer) -> Result<u64> {
        self.ensure_running()?;

        // hold the cache lock across the swap so the worker can't insert a
        // result for the new version before the cache knows about it
        let version = {
            let mut cache = self.cache.lock();
            let version = self.store.set_image(buffer);
            cache.invalidate_source(version);
            version
        };

        if let Some(threshold) = *self.requested.lock() {
            self.params.send(threshold);
        }

        Ok(version)
    }

    pub fn request_threshold(&self, threshold: Threshold) -> Result<()> {
        self.ensure_running()?;

        *self.requested.lock() = Some(threshold);
        self.cache.lock().select_threshold(threshold);

        if self.params.send(threshold) {
            debug!(%threshold, "coalesced pending threshold");
        }

        Ok(())
    }

    /// The last delivered result, if it was computed from the current image.
    pub fn current_result(&self) -> Option<Arc<ProcessedResult>> {
        let version = self.store.version();
        self.current
            .load_full()
            .filter(|result| result.source_version == version)
    }

    /// The current result scaled to fit `width` x `height`, cached per size.
    pub fn display_image(&self, width: u32, height: u32) -> Result<Option<Arc<DisplayImage>>> {
        let Some(result) = self.current_result() else {
            return Ok(None);
        };

        let key = DisplayKey {
            width,
            height,
            threshold: result.threshold,
        };

        if let Some(image) = self.cache.lock().display(&key) {
            return Ok(Some(image));
        }

        let image = Arc::new(display::render(&result, width, height)?);
        self.cache.lock().insert_display(key, Arc::clone(&image));

        Ok(Some(image))
    }

    pub fn source_version(&self) -> u64 {
        self.store.version()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker
            .lock()
            .as_ref()
            .map_or(WorkerState::Stopped, ThresholdWorker::state)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stops and joins the worker. No callback fires after this returns,
    /// including when another thread is already shutting down.
    ///
    /// Must not be called from `on_result`: the worker can't join itself, so
    /// that returns [`Error::StopFromWorkerThread`] and leaves the pipeline
    /// running.
    pub fn shutdown(&self) -> Result<()> {
        if self.worker_thread == Some(thread::current().id()) {
            return Err(Error::StopFromWorkerThread);
        }

        let _shutting_down = self.shutdown_lock.lock();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // the worker lock is released before joining; a callback may query
        // `worker_state` while it finishes
        let worker = self.worker.lock().take();
        let Some(mut worker) = worker else {
            return Ok(());
        };

        let result = worker.stop();
        match &result {
            Ok(()) => info!("pipeline shut down"),
            Err(err) => error!(%err, "worker did not shut down cleanly"),
        }

        result
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // errors are already logged by shutdown; on the worker thread the
        // worker's own drop raises the stop flag instead
        let _ = self.shutdown();
    }
}
