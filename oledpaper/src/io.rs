//! Decoding and encoding between image files and [`PixelBuffer`]s.
//!
//! Decoded images are normalized to 8-bit RGB, or RGBA when the source has
//! an alpha channel, so the color channels are always the first three bytes.

use std::path::{Path, PathBuf};

use image as image_lib;
use image_lib::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use tracing::info;

use crate::error::{Error, Result};
use crate::pixel_buffer::{ChannelLayout, PixelBuffer};

/// Supported image file extensions for writing.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Extension appended to output paths that have none.
pub const DEFAULT_EXTENSION: &str = "png";

pub fn load_image<P: AsRef<Path>>(filename: P) -> Result<PixelBuffer> {
    let filename = filename.as_ref();
    let img = image_lib::open(filename)?;
    let buffer = from_dynamic(img)?;

    info!(
        path = %filename.display(),
        width = buffer.width(),
        height = buffer.height(),
        channels = buffer.channels(),
        "image decoded"
    );

    Ok(buffer)
}

pub fn from_dynamic(img: DynamicImage) -> Result<PixelBuffer> {
    let (width, height) = (img.width(), img.height());

    let (channels, bytes) = if img.color().has_alpha() {
        (4, img.into_rgba8().into_raw())
    } else {
        (3, img.into_rgb8().into_raw())
    };

    PixelBuffer::new(width, height, channels, bytes)
}

pub fn to_dynamic(buffer: &PixelBuffer) -> Result<DynamicImage> {
    let layout = buffer.layout()?;
    let (width, height) = (buffer.width(), buffer.height());
    let bytes = buffer.bytes().to_vec();

    let img = match layout {
        ChannelLayout::Rgb => RgbImage::from_raw(width, height, bytes).map(DynamicImage::ImageRgb8),
        ChannelLayout::Rgba => {
            RgbaImage::from_raw(width, height, bytes).map(DynamicImage::ImageRgba8)
        }
    };

    img.ok_or_else(|| Error::shape(format!("{width}x{height} {layout} buffer has wrong length")))
}

/// Writes `buffer` to `filename`, picking the format from the extension.
///
/// A path without an extension gets `.png` appended. Returns the path
/// actually written.
pub fn save_image<P: AsRef<Path>>(buffer: &PixelBuffer, filename: P) -> Result<PathBuf> {
    let mut path = filename.as_ref().to_path_buf();

    let extension = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => {
            path.set_extension(DEFAULT_EXTENSION);
            DEFAULT_EXTENSION.to_string()
        }
    };

    let format = match extension.as_str() {
        "png" => ImageFormat::Png,
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        "bmp" => ImageFormat::Bmp,
        "tif" | "tiff" => ImageFormat::Tiff,
        _ => return Err(Error::InvalidExtension(extension)),
    };

    let img = to_dynamic(buffer)?;
    // JPEG has no alpha channel
    let img = if format == ImageFormat::Jpeg && img.color().has_alpha() {
        DynamicImage::ImageRgb8(img.into_rgb8())
    } else {
        img
    };

    img.save_with_format(&path, format)?;
    info!(path = %path.display(), ?format, "image saved");

    Ok(path)
}
