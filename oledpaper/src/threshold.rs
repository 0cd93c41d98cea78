//! Black-point thresholding.
//!
//! A pixel is blackened when the smallest of its three color channels is
//! strictly below the threshold. Alpha is never touched.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pixel_buffer::PixelBuffer;

/// Threshold cutoff, always within `[Threshold::MIN, Threshold::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Threshold(u8);

impl Threshold {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 255;

    pub fn new(value: i64) -> Result<Self> {
        if !(Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            return Err(Error::configuration(format!(
                "threshold {value} is outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }

        Ok(Self(value as u8))
    }

    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<i64> for Threshold {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for u8 {
    fn from(value: Threshold) -> Self {
        value.0
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns a thresholded copy of `buffer`.
pub fn apply(buffer: &PixelBuffer, threshold: Threshold) -> Result<PixelBuffer> {
    buffer.layout()?;

    let mut output = buffer.clone();
    apply_in_place(&mut output, threshold)?;

    Ok(output)
}

/// Thresholds `buffer` in place, one row per rayon task.
pub fn apply_in_place(buffer: &mut PixelBuffer, threshold: Threshold) -> Result<()> {
    let channels = buffer.layout()?.channel_count();
    let row_bytes = buffer.row_bytes();
    if row_bytes == 0 || buffer.height() == 0 {
        return Ok(());
    }

    let cutoff = threshold.get();

    buffer
        .bytes_mut()
        .par_chunks_mut(row_bytes)
        .for_each(|row| threshold_row(row, channels, cutoff));

    Ok(())
}

#[inline]
fn threshold_row(row: &mut [u8], channels: usize, cutoff: u8) {
    for pixel in row.chunks_exact_mut(channels) {
        if pixel[0].min(pixel[1]).min(pixel[2]) < cutoff {
            pixel[..3].fill(0);
        }
    }
}
