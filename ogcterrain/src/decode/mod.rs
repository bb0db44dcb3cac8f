//! Elevation buffer decoding.
//!
//! Pure functions that turn a fetched binary buffer or a decoded RGBA pixel
//! grid into a row-major grid of signed heights in meters. No I/O happens
//! here.
//!
//! Both decoders sanitize samples the same way: a sample is kept only when,
//! after subtracting the configured offset, it lies strictly between the
//! lowest and highest bounds. Rejected cells receive the mean of all samples
//! accepted so far in scan order. The fill is forward-only: earlier cells are
//! never revisited once a later valid sample is seen.

mod array;
mod pixels;

pub use self::array::decode_int16_be;
pub use self::pixels::{decode_image_pixels, water_mask};

use serde::Serialize;
use thiserror::Error;

/// Bias added to heights by styled (SLD-rendered) elevation images.
pub const STYLED_IMAGE_BIAS: f64 = 32_768.0;

/// Dimensions of an output sample grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Sanitation bounds applied to every decoded sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElevationLimits {
    /// Subtracted from each raw sample before the bounds check.
    pub offset: f64,
    /// Exclusive lower bound in meters.
    pub lowest: f64,
    /// Exclusive upper bound in meters.
    pub highest: f64,
}

impl ElevationLimits {
    pub fn new(offset: f64, lowest: f64, highest: f64) -> Self {
        Self {
            offset,
            lowest,
            highest,
        }
    }

    /// True when `value` lies strictly inside `(lowest, highest)`.
    #[inline]
    pub fn accepts(&self, value: f64) -> bool {
        value > self.lowest && value < self.highest
    }
}

/// Errors raised by the decoders.
///
/// Only structural mismatches are errors. Individual bad samples are always
/// replaced by the running mean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Buffer length does not match the expected grid.
    #[error("Buffer holds {actual} bytes, expected {expected} for a {width}×{height} grid")]
    SizeMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
}

/// Running mean of accepted samples, used to fill rejected cells.
#[derive(Debug, Default)]
struct RunningMean {
    sum: f64,
    count: u32,
}

impl RunningMean {
    fn accept(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Mean so far, or `empty` when nothing has been accepted yet.
    fn value_or(&self, empty: f64) -> f64 {
        if self.count == 0 {
            empty
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Stores a height in a 16-bit cell, truncating toward zero.
///
/// Heights outside the `i16` range saturate at `i16::MIN` or `i16::MAX`.
/// Only limits wider than the 16-bit range let such heights through.
#[inline]
fn to_sample(value: f64) -> i16 {
    value.trunc() as i16
}
