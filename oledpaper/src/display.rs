use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{Error, Result};
use crate::io::to_dynamic;
use crate::threshold::Threshold;
use crate::worker::ProcessedResult;

/// A processed result scaled for on-screen presentation.
#[derive(Debug, Clone)]
pub struct DisplayImage {
    pub threshold: Threshold,
    pub source_version: u64,
    image: RgbaImage,
}

impl DisplayImage {
    pub fn new(image: RgbaImage, threshold: Threshold, source_version: u64) -> Self {
        Self {
            threshold,
            source_version,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Largest size with the source aspect ratio that fits in `max_width` x `max_height`.
///
/// Neither dimension of the result is ever zero.
pub fn fit_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_width.max(1), max_height.max(1));
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );

    let fit = |size: u32, max: u32| ((size as f64 * scale).round() as u32).clamp(1, max.max(1));

    (fit(width, max_width), fit(height, max_height))
}

/// Scales `result` to fit the display area, keeping its aspect ratio.
pub fn render(result: &ProcessedResult, max_width: u32, max_height: u32) -> Result<DisplayImage> {
    if max_width == 0 || max_height == 0 {
        return Err(Error::configuration(format!(
            "display size {max_width}x{max_height} must be non-zero"
        )));
    }

    let source = to_dynamic(&result.buffer)?.to_rgba8();
    let (width, height) = fit_size(source.width(), source.height(), max_width, max_height);

    let image = if (width, height) == source.dimensions() {
        source
    } else {
        imageops::resize(&source, width, height, FilterType::Triangle)
    };

    Ok(DisplayImage::new(
        image,
        result.threshold,
        result.source_version,
    ))
}
