use crate::envelope::EnvelopePair;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Raw sample count above which level-0 reduction is spread across the rayon pool.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1 << 20;

cfg_if::cfg_if! {
    if #[cfg(feature = "simd")] {
        /// Minimum and maximum of `samples`, skipping NaN. Empty input yields the empty pair.
        pub(crate) fn min_max(samples: &[f32]) -> EnvelopePair {
            match crate::simd::min_max_f32(samples) {
                Some((min, max)) => EnvelopePair { min, max },
                None => min_max_scalar(samples),
            }
        }
    } else {
        /// Minimum and maximum of `samples`, skipping NaN. Empty input yields the empty pair.
        pub(crate) fn min_max(samples: &[f32]) -> EnvelopePair {
            min_max_scalar(samples)
        }
    }
}

fn min_max_scalar(samples: &[f32]) -> EnvelopePair {
    let mut pair = EnvelopePair::EMPTY;
    for &value in samples {
        if value < pair.min {
            pair.min = value;
        }
        if value > pair.max {
            pair.max = value;
        }
    }
    pair
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        /// Reduces every complete block of `factor` samples to one pair appended to `out`.
        ///
        /// `samples.len()` must be a multiple of `factor`.
        pub(crate) fn reduce_blocks(samples: &[f32], factor: usize, out: &mut Vec<EnvelopePair>) {
            debug_assert_eq!(samples.len() % factor, 0);
            if samples.len() >= PARALLEL_THRESHOLD {
                out.par_extend(samples.par_chunks_exact(factor).map(min_max));
            } else {
                out.extend(samples.chunks_exact(factor).map(min_max));
            }
        }
    } else {
        /// Reduces every complete block of `factor` samples to one pair appended to `out`.
        ///
        /// `samples.len()` must be a multiple of `factor`.
        pub(crate) fn reduce_blocks(samples: &[f32], factor: usize, out: &mut Vec<EnvelopePair>) {
            debug_assert_eq!(samples.len() % factor, 0);
            out.extend(samples.chunks_exact(factor).map(min_max));
        }
    }
}

/// Merges every run of `factor` consecutive pairs from `src` into one pair appended to `out`.
pub(crate) fn merge_pairs(src: &[EnvelopePair], factor: usize, out: &mut Vec<EnvelopePair>) {
    debug_assert_eq!(src.len() % factor, 0);
    out.extend(src.chunks_exact(factor).map(|run| {
        run.iter()
            .fold(EnvelopePair::EMPTY, |acc, pair| acc.union(*pair))
    }));
}
