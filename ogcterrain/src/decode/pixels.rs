//! Elevation-encoded image decoding.
//!
//! The red and green channels of each pixel hold a big-endian 16-bit value
//! biased by [`STYLED_IMAGE_BIAS`]. The blue channel flags validity (> 128)
//! except for styled images, whose renderer does not set it reliably.

use image::RgbaImage;

use super::{to_sample, ElevationLimits, GridSize, RunningMean, STYLED_IMAGE_BIAS};

/// Fill value used before any valid pixel has been seen.
const IMAGE_EMPTY_FILL: f64 = 0.0;

/// Blue channel value above which a pixel is flagged valid.
const VALIDITY_THRESHOLD: u8 = 128;

/// Decodes an RGBA pixel grid into a sanitized sample grid of `size`.
///
/// The image may be larger or smaller than the output grid. Cells map to
/// pixels by index (`col * image_width / width`), without filtering.
/// Rejected cells take the mean of the cells accepted before them, or `0`.
/// An empty image yields an all-zero grid.
pub fn decode_image_pixels(
    pixels: &RgbaImage,
    size: GridSize,
    limits: &ElevationLimits,
    has_styled_image: bool,
) -> Vec<i16> {
    let (image_width, image_height) = pixels.dimensions();
    if image_width == 0 || image_height == 0 {
        return vec![0; size.cell_count()];
    }

    let mut samples = Vec::with_capacity(size.cell_count());
    let mut mean = RunningMean::default();

    for row in 0..size.height {
        let py = scale_index(row, size.height, image_height);
        for col in 0..size.width {
            let px = scale_index(col, size.width, image_width);
            let [msb, lsb, flag, _] = pixels.get_pixel(px, py).0;

            let encoded = (u16::from(msb) << 8 | u16::from(lsb)) as f64;
            let value = encoded - limits.offset - STYLED_IMAGE_BIAS;
            let flagged_valid = has_styled_image || flag > VALIDITY_THRESHOLD;

            if flagged_valid && limits.accepts(value) {
                samples.push(to_sample(value));
                mean.accept(value);
            } else {
                samples.push(to_sample(mean.value_or(IMAGE_EMPTY_FILL)));
            }
        }
    }

    samples
}

/// Water mask for a decoded tile: 255 where the height is at or below sea level.
pub fn water_mask(samples: &[i16]) -> Vec<u8> {
    samples
        .iter()
        .map(|&height| if height <= 0 { 255 } else { 0 })
        .collect()
}

/// Maps an output index to a source index along one axis.
#[inline]
fn scale_index(index: u32, output_len: u32, source_len: u32) -> u32 {
    let scaled = u64::from(index) * u64::from(source_len) / u64::from(output_len.max(1));
    (scaled as u32).min(source_len - 1)
}
