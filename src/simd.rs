//! SIMD-accelerated helpers used by the crate when the `simd` feature is enabled.

/// Computes the minimum and maximum of `data` using architecture specific SIMD instructions.
/// Returns `None` if the architecture is unsupported or the required hardware feature is
/// unavailable at runtime, in which case the caller falls back to the scalar reduction.
///
/// NaN samples are skipped, matching the scalar path.
pub(crate) fn min_max_f32(data: &[f32]) -> Option<(f32, f32)> {
    let _ = data;
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("sse2") {
            unsafe {
                return Some(min_max_f32_x86_sse2(data));
            }
        }
    }
    None
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn min_max_f32_x86_sse2(data: &[f32]) -> (f32, f32) {
    use std::arch::x86_64::*;

    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    let mut idx = 0usize;

    if data.len() >= 4 {
        let mut lo_acc = _mm_set1_ps(f32::INFINITY);
        let mut hi_acc = _mm_set1_ps(f32::NEG_INFINITY);
        while idx + 4 <= data.len() {
            let values = unsafe { _mm_loadu_ps(data.as_ptr().add(idx)) };
            // `minps`/`maxps` return the second operand when either is NaN, so the accumulator
            // goes second to keep NaN lanes out of it.
            lo_acc = _mm_min_ps(values, lo_acc);
            hi_acc = _mm_max_ps(values, hi_acc);
            idx += 4;
        }
        let mut lanes = [0f32; 4];
        unsafe { _mm_storeu_ps(lanes.as_mut_ptr(), lo_acc) };
        for lane in lanes {
            if lane < lo {
                lo = lane;
            }
        }
        unsafe { _mm_storeu_ps(lanes.as_mut_ptr(), hi_acc) };
        for lane in lanes {
            if lane > hi {
                hi = lane;
            }
        }
    }

    for &value in &data[idx..] {
        if value < lo {
            lo = value;
        }
        if value > hi {
            hi = value;
        }
    }

    (lo, hi)
}
