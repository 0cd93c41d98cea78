use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::error::{Error, Result};
use crate::pixel_buffer::PixelBuffer;

/// A point-in-time view of the store.
///
/// The buffer is shared, never mutated, so holding a snapshot does not
/// block later `set_image` calls.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub buffer: Arc<PixelBuffer>,
    pub source_version: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    image: Option<Arc<PixelBuffer>>,
    version: u64,
}

/// Single owner of the current source image.
#[derive(Debug, Default)]
pub struct ImageStore {
    state: Mutex<StoreState>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current image and returns the new source version.
    pub fn set_image(&self, buffer: PixelBuffer) -> u64 {
        let width = buffer.width();
        let height = buffer.height();
        let channels = buffer.channels();
        let image = Arc::new(buffer);

        let (previous, version) = {
            let mut state = self.state.lock();
            state.version += 1;
            (state.image.replace(image), state.version)
        };
        // the old buffer may be large, release it outside the lock
        drop(previous);

        info!(width, height, channels, version, "source image replaced");

        version
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let state = self.state.lock();
        let buffer = state.image.as_ref().ok_or(Error::NoImage)?;

        Ok(Snapshot {
            buffer: Arc::clone(buffer),
            source_version: state.version,
        })
    }

    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    pub fn has_image(&self) -> bool {
        self.state.lock().image.is_some()
    }
}
