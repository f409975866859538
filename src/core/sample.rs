//! Sample resolution types.
//!
//! A requested time resolves to a stored sample index plus the fractional
//! position between that sample and the next one.

use crate::util::Chrono;

/// Result of resolving a requested time against a time sampling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleBracket {
    /// Floor stored sample index.
    pub index: usize,
    /// Stored index blended towards (equal to `index` at the end).
    pub next_index: usize,
    /// Stored time of `index`.
    pub index_time: Chrono,
    /// Seconds between the bracketing stored times.
    pub interval: Chrono,
    /// Position within the interval, always in [0, 1].
    pub offset: f32,
}

impl SampleBracket {
    /// Build a bracket, computing the clamped offset of `requested_time`.
    pub fn new(
        index: usize,
        next_index: usize,
        index_time: Chrono,
        interval: Chrono,
        requested_time: Chrono,
    ) -> Self {
        Self {
            index,
            next_index,
            index_time,
            interval,
            offset: interpolation_offset(requested_time, index_time, interval),
        }
    }
}

/// Fraction of `interval` elapsed since `index_time`, clamped to [0, 1].
/// A zero interval or a NaN ratio yields 0.
pub fn interpolation_offset(requested_time: Chrono, index_time: Chrono, interval: Chrono) -> f32 {
    if interval == 0.0 {
        return 0.0;
    }
    let ratio = (requested_time - index_time) / interval;
    // NaN fails the comparison and lands on 0
    if ratio >= 0.0 {
        ratio.min(1.0) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_zero_interval() {
        assert_eq!(interpolation_offset(5.0, 3.0, 0.0), 0.0);
    }

    #[test]
    fn test_offset_clamped() {
        assert_eq!(interpolation_offset(1.5, 0.0, 1.0), 1.0);
        assert_eq!(interpolation_offset(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(interpolation_offset(4.5, 3.0, 3.0), 0.5);
    }

    #[test]
    fn test_offset_nan_time() {
        assert_eq!(interpolation_offset(f64::NAN, 0.0, 1.0), 0.0);
        assert_eq!(interpolation_offset(2.0, f64::NAN, 1.0), 0.0);
        assert_eq!(interpolation_offset(f64::INFINITY, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_bracket_offset() {
        let lerp = SampleBracket::new(2, 3, 2.0, 1.0, 2.5);
        assert_eq!(lerp.next_index, 3);
        assert!((lerp.offset - 0.5).abs() < 1e-6);
        assert_eq!(SampleBracket::new(2, 3, 2.0, 1.0, f64::NAN).offset, 0.0);
    }
}
