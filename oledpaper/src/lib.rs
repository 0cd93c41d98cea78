pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod image_store;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod pixel_buffer;
pub mod threshold;
pub mod worker;

#[cfg(test)]
mod tests;

pub use cache::{ClearAllCache, DisplayKey, ResultCache};
pub use config::Config;
pub use display::DisplayImage;
pub use error::{Error, Result};
pub use image_store::{ImageStore, Snapshot};
pub use pipeline::Pipeline;
pub use pixel_buffer::{ChannelLayout, PixelBuffer};
pub use threshold::Threshold;
pub use worker::{
    ParameterChannel, ProcessedResult, ThresholdWorker, WorkerContext, WorkerEvent, WorkerState,
};
