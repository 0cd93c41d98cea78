use crate::error::{Error, Result};

/// Channel layouts the threshold transform can process.
///
/// Color channels always come first in R, G, B order; alpha, if present, is
/// the last byte of each pixel.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum ChannelLayout {
    Rgb = 3,
    Rgba = 4,
}

impl ChannelLayout {
    pub fn channel_count(&self) -> usize {
        *self as usize
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, ChannelLayout::Rgba)
    }

    pub fn from_channel_count(channels: u8) -> Result<Self> {
        match channels {
            3 => Ok(ChannelLayout::Rgb),
            4 => Ok(ChannelLayout::Rgba),
            _ => Err(Error::shape(format!(
                "expected 3 or 4 channels, got {channels}"
            ))),
        }
    }
}

impl std::fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelLayout::Rgb => write!(f, "RGB"),
            ChannelLayout::Rgba => write!(f, "RGBA"),
        }
    }
}

/// Tightly packed, row-major 8-bit pixel data.
///
/// The byte length always equals `width * height * channels`. The channel
/// count itself is not restricted here; operations that need a specific
/// layout check it with [`PixelBuffer::layout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    bytes: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, channels: u8, bytes: Vec<u8>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::shape("channel count must be non-zero"));
        }

        let expected = width as usize * height as usize * channels as usize;
        if bytes.len() != expected {
            return Err(Error::shape(format!(
                "bytes length {} does not match expected size {} ({}x{}x{})",
                bytes.len(),
                expected,
                width,
                height,
                channels
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            bytes,
        })
    }

    /// Creates a buffer filled with a single pixel value.
    pub fn filled(width: u32, height: u32, pixel: &[u8]) -> Result<Self> {
        let channels = u8::try_from(pixel.len())
            .map_err(|_| Error::shape(format!("{} channels per pixel", pixel.len())))?;
        let bytes = pixel.repeat(width as usize * height as usize);

        Self::new(width, height, channels, bytes)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn layout(&self) -> Result<ChannelLayout> {
        ChannelLayout::from_channel_count(self.channels)
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn take_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the pixel at `(x, y)`, or `None` if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let channels = self.channels as usize;
        let offset = y as usize * self.row_bytes() + x as usize * channels;
        Some(&self.bytes[offset..offset + channels])
    }

    /// FNV-1a hash of the dimensions and pixel data.
    pub fn checksum(&self) -> u64 {
        const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        self.width
            .to_le_bytes()
            .iter()
            .chain(self.height.to_le_bytes().iter())
            .chain(std::iter::once(&self.channels))
            .chain(self.bytes.iter())
            .fold(OFFSET_BASIS, |hash, &byte| {
                (hash ^ byte as u64).wrapping_mul(PRIME)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_length_mismatch() {
        let result = PixelBuffer::new(2, 2, 3, vec![0; 11]);
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn new_rejects_zero_channels() {
        let result = PixelBuffer::new(0, 0, 0, Vec::new());
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn unsupported_channel_count_is_constructible_but_has_no_layout() {
        let buffer = PixelBuffer::new(1, 1, 2, vec![10, 20]).unwrap();
        assert!(matches!(buffer.layout(), Err(Error::Shape(_))));
    }

    #[test]
    fn pixel_access() {
        let buffer = PixelBuffer::new(2, 1, 4, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(buffer.layout().unwrap(), ChannelLayout::Rgba);
        assert_eq!(buffer.pixel(1, 0), Some(&[5, 6, 7, 8][..]));
        assert_eq!(buffer.pixel(2, 0), None);
        assert_eq!(buffer.row_bytes(), 8);
    }

    #[test]
    fn checksum_tracks_content_and_shape() {
        let a = PixelBuffer::filled(2, 2, &[1, 2, 3]).unwrap();
        let b = PixelBuffer::filled(2, 2, &[1, 2, 3]).unwrap();
        let c = PixelBuffer::filled(4, 1, &[1, 2, 3]).unwrap();
        let d = PixelBuffer::filled(2, 2, &[1, 2, 4]).unwrap();

        assert_eq!(a.checksum(), b.checksum());
        assert_ne!(a.checksum(), c.checksum());
        assert_ne!(a.checksum(), d.checksum());
    }
}
