//! Binary array decoding (`image/bil`).

use super::{to_sample, DecodeError, ElevationLimits, GridSize, RunningMean};

/// Fill value used before any valid sample has been seen.
const ARRAY_EMPTY_FILL: f64 = 1.0;

/// Decodes big-endian signed 16-bit samples into a sanitized grid.
///
/// The buffer must hold exactly `width * height * 2` bytes. Each sample has
/// `limits.offset` subtracted; out-of-range samples are replaced by the mean
/// of the valid samples before them, or `1` if there are none yet.
///
/// # Example
///
/// ```
/// use ogcterrain::decode::{decode_int16_be, ElevationLimits, GridSize};
///
/// let limits = ElevationLimits::new(0.0, -500.0, 12_000.0);
/// let buffer = [0x00, 0x64, 0x00, 0x96];
/// let samples = decode_int16_be(&buffer, GridSize::new(2, 1), &limits).unwrap();
/// assert_eq!(samples, vec![100, 150]);
/// ```
pub fn decode_int16_be(
    buffer: &[u8],
    size: GridSize,
    limits: &ElevationLimits,
) -> Result<Vec<i16>, DecodeError> {
    let expected = size.cell_count() * 2;
    if buffer.len() != expected {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: buffer.len(),
            width: size.width,
            height: size.height,
        });
    }

    let mut samples = Vec::with_capacity(size.cell_count());
    let mut mean = RunningMean::default();

    for pair in buffer.chunks_exact(2) {
        let value = i16::from_be_bytes([pair[0], pair[1]]) as f64 - limits.offset;
        if limits.accepts(value) {
            samples.push(to_sample(value));
            mean.accept(value);
        } else {
            samples.push(to_sample(mean.value_or(ARRAY_EMPTY_FILL)));
        }
    }

    Ok(samples)
}
