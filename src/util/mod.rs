use std::mem;

use crate::error::{Error, Result};

/// Picks `count` samples from `data`, one every `stride` elements starting at the first, and
/// appends them to `out`.
pub fn deinterleave(data: &[f32], count: usize, stride: usize, out: &mut Vec<f32>) -> Result<()> {
    if stride == 0 {
        return Err(Error::range("interleave stride may not be zero"));
    }
    if count == 0 {
        return Ok(());
    }
    let last = (count - 1)
        .checked_mul(stride)
        .ok_or_else(|| Error::range("interleaved sample span overflows"))?;
    if last >= data.len() {
        return Err(Error::range(format!(
            "{count} samples with stride {stride} need {} values, got {}",
            last + 1,
            data.len()
        )));
    }

    out.try_reserve_exact(count)
        .map_err(|err| Error::alloc(count * mem::size_of::<f32>(), err))?;
    if stride == 1 {
        out.extend_from_slice(&data[..count]);
    } else {
        out.extend(data.iter().step_by(stride).take(count));
    }
    Ok(())
}

/// Validates a samplerate and returns the matching sample period in seconds.
pub fn time_stride(samplerate: f64) -> Result<f64> {
    if !samplerate.is_finite() || samplerate <= 0.0 {
        return Err(Error::config(format!(
            "samplerate must be positive and finite, got {samplerate}"
        )));
    }
    Ok(1.0 / samplerate)
}
