//! Time sampling types.
//!
//! Every stored property is sampled over time. The TimeSampling struct
//! describes when each stored sample was recorded and resolves a requested
//! time into a stored index plus an interpolation bracket.

use crate::core::SampleBracket;
use crate::util::{Chrono, Error, Result, CHRONO_EPSILON};

/// Type of time sampling.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// One sample per second starting at time 0.
    Identity,

    /// Uniform sampling: samples at regular intervals.
    /// start_time + index * time_per_cycle
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// Cyclic sampling: repeating pattern of sample times.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },

    /// Acyclic sampling: explicit time for each sample.
    Acyclic {
        times: Vec<Chrono>,
    },
}

impl TimeSamplingType {
    /// Check if this is acyclic sampling.
    #[inline]
    pub fn is_acyclic(&self) -> bool {
        matches!(self, Self::Acyclic { .. })
    }

    /// Get the number of samples per cycle (1 for uniform/identity).
    pub fn samples_per_cycle(&self) -> usize {
        match self {
            Self::Identity => 1,
            Self::Uniform { .. } => 1,
            Self::Cyclic { times, .. } => times.len(),
            Self::Acyclic { times } => times.len(),
        }
    }

    /// Duration of one cycle. `None` for acyclic sampling.
    pub fn time_per_cycle(&self) -> Option<Chrono> {
        match self {
            Self::Identity => Some(1.0),
            Self::Uniform { time_per_cycle, .. } | Self::Cyclic { time_per_cycle, .. } => {
                Some(*time_per_cycle)
            }
            Self::Acyclic { .. } => None,
        }
    }
}

impl Default for TimeSamplingType {
    fn default() -> Self {
        Self::Identity
    }
}

/// Time sampling information for a property.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSampling {
    /// The type of sampling.
    pub sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// Identity time sampling (one sample per second from time 0).
    pub const IDENTITY: Self = Self {
        sampling_type: TimeSamplingType::Identity,
    };

    /// Create uniform time sampling.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    /// Create acyclic time sampling from explicit times.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    /// Create cyclic time sampling.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            },
        }
    }

    /// Whether stored times repeat with a fixed period.
    #[inline]
    pub fn is_cyclic_policy(&self) -> bool {
        !self.sampling_type.is_acyclic()
    }

    /// Number of explicitly stored times (1 for uniform/identity).
    pub fn num_stored_times(&self) -> usize {
        self.sampling_type.samples_per_cycle()
    }

    /// Reject sampling that cannot resolve a time for `num_samples` stored samples.
    pub fn validate(&self, num_samples: usize) -> Result<()> {
        if num_samples == 0 {
            return Err(Error::configuration("time sampling has zero stored samples"));
        }
        match &self.sampling_type {
            TimeSamplingType::Identity => Ok(()),
            TimeSamplingType::Uniform { time_per_cycle, start_time } => {
                check_period(*time_per_cycle)?;
                if !start_time.is_finite() {
                    return Err(Error::configuration("uniform start time is not finite"));
                }
                Ok(())
            }
            TimeSamplingType::Cyclic { time_per_cycle, times } => {
                check_period(*time_per_cycle)?;
                check_times(times)?;
                let span = times[times.len() - 1] - times[0];
                if span >= *time_per_cycle {
                    return Err(Error::configuration(format!(
                        "cyclic times span {span} exceeds the cycle period {time_per_cycle}"
                    )));
                }
                Ok(())
            }
            TimeSamplingType::Acyclic { times } => {
                check_times(times)?;
                if times.len() < num_samples {
                    return Err(Error::configuration(format!(
                        "acyclic sampling stores {} times for {} samples",
                        times.len(),
                        num_samples
                    )));
                }
                Ok(())
            }
        }
    }

    /// Get the time for a specific sample index.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Identity => index as Chrono,
            TimeSamplingType::Uniform { time_per_cycle, start_time } => {
                *start_time + (index as Chrono) * *time_per_cycle
            }
            TimeSamplingType::Cyclic { time_per_cycle, times } => {
                if times.is_empty() {
                    return 0.0;
                }
                let cycle = index / times.len();
                let local_idx = index % times.len();
                times[local_idx] + (cycle as Chrono) * *time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => times
                .get(index)
                .or_else(|| times.last())
                .copied()
                .unwrap_or(0.0),
        }
    }

    /// Find the floor index (largest index with time <= given time).
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> usize {
        if num_samples == 0 {
            return 0;
        }

        match &self.sampling_type {
            TimeSamplingType::Identity => {
                if time <= 0.0 {
                    return 0;
                }
                ((time + CHRONO_EPSILON).floor() as usize).min(num_samples - 1)
            }
            TimeSamplingType::Uniform { time_per_cycle, start_time } => {
                if time <= *start_time {
                    return 0;
                }
                let idx = ((time - start_time) / time_per_cycle + CHRONO_EPSILON).floor() as usize;
                idx.min(num_samples - 1)
            }
            TimeSamplingType::Cyclic { .. } | TimeSamplingType::Acyclic { .. } => {
                // Binary search for floor
                let mut lo = 0;
                let mut hi = num_samples;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.sample_time(mid) <= time + CHRONO_EPSILON {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                if lo > 0 { lo - 1 } else { 0 }
            }
        }
    }

    /// Resolve a requested time into a stored index and interpolation bracket.
    ///
    /// Cyclic sampling uses one full cycle as the interval. Acyclic sampling
    /// uses the distance to the next stored time, which degenerates to zero
    /// at the last stored time. A zero interval yields a zero offset.
    pub fn bracket(&self, time: Chrono, num_samples: usize) -> SampleBracket {
        let index = self.floor_index(time, num_samples);
        let index_time = self.sample_time(index);
        let last = num_samples.saturating_sub(1);

        let (next_index, interval) = match self.sampling_type.time_per_cycle() {
            Some(period) => ((index + 1).min(last), period),
            None => {
                let stored_last = self.num_stored_times().saturating_sub(1);
                let next = (index + 1).min(stored_last);
                (next.min(last), self.sample_time(next) - index_time)
            }
        };

        SampleBracket::new(index, next_index, index_time, interval, time)
    }

    /// Time span covered by `num_samples` stored samples.
    pub fn time_range(&self, num_samples: usize) -> (Chrono, Chrono) {
        if num_samples == 0 {
            return (0.0, 0.0);
        }
        (self.sample_time(0), self.sample_time(num_samples - 1))
    }
}

fn check_period(time_per_cycle: Chrono) -> Result<()> {
    if !time_per_cycle.is_finite() || time_per_cycle <= 0.0 {
        return Err(Error::configuration(format!(
            "time per cycle must be positive, got {time_per_cycle}"
        )));
    }
    Ok(())
}

fn check_times(times: &[Chrono]) -> Result<()> {
    if times.is_empty() {
        return Err(Error::configuration("sampling has no stored times"));
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(Error::configuration("stored time is not finite"));
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::configuration("stored times must be strictly increasing"));
    }
    Ok(())
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sampling() {
        let ts = TimeSampling::uniform(1.0 / 24.0, 0.0); // 24 fps

        assert_eq!(ts.sample_time(0), 0.0);
        assert!((ts.sample_time(24) - 1.0).abs() < 1e-10);
        assert!((ts.sample_time(48) - 2.0).abs() < 1e-10);
        // frame 3 at 24fps must not floor to frame 2 through rounding
        assert_eq!(ts.floor_index(3.0 / 24.0, 100), 3);
    }

    #[test]
    fn test_acyclic_sampling() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);

        assert_eq!(ts.sample_time(0), 0.0);
        assert_eq!(ts.sample_time(1), 0.5);
        assert_eq!(ts.sample_time(2), 1.0);
        assert_eq!(ts.sample_time(3), 2.0);
    }

    #[test]
    fn test_floor_index() {
        let ts = TimeSampling::uniform(1.0, 0.0);

        assert_eq!(ts.floor_index(0.5, 10), 0);
        assert_eq!(ts.floor_index(1.5, 10), 1);
        assert_eq!(ts.floor_index(5.0, 10), 5);
        assert_eq!(ts.floor_index(-3.0, 10), 0);
        assert_eq!(ts.floor_index(42.0, 10), 9);
    }

    #[test]
    fn test_cyclic_floor_index() {
        // two samples per 1s cycle, at 0.0 and 0.25 within each cycle
        let ts = TimeSampling::cyclic(1.0, vec![0.0, 0.25]);
        assert_eq!(ts.sample_time(3), 1.25);
        assert_eq!(ts.floor_index(1.1, 6), 2);
        assert_eq!(ts.floor_index(1.3, 6), 3);
    }

    #[test]
    fn test_bracket_uniform() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        let expected = [(0.0, 0, 0.0), (0.25, 0, 0.25), (1.0, 1, 0.0), (1.25, 1, 0.25)];
        for (time, index, offset) in expected {
            let b = ts.bracket(time, 10);
            assert_eq!(b.index, index, "time {time}");
            assert_eq!(b.offset, offset, "time {time}");
            assert_eq!(b.interval, 1.0);
        }
    }

    #[test]
    fn test_bracket_acyclic() {
        let ts = TimeSampling::acyclic(vec![0.0, 1.0, 3.0, 6.0]);
        let b = ts.bracket(4.5, 4);
        assert_eq!(b.index, 2);
        assert_eq!(b.next_index, 3);
        assert_eq!(b.index_time, 3.0);
        assert_eq!(b.interval, 3.0);
        assert_eq!(b.offset, 0.5);
    }

    #[test]
    fn test_bracket_last_acyclic_index_is_degenerate() {
        let ts = TimeSampling::acyclic(vec![0.0, 1.0, 3.0, 6.0]);
        let b = ts.bracket(10.0, 4);
        assert_eq!(b.index, 3);
        assert_eq!(b.next_index, 3);
        assert_eq!(b.interval, 0.0);
        assert_eq!(b.offset, 0.0);
    }

    #[test]
    fn test_bracket_clamps_offset() {
        let ts = TimeSampling::uniform(1.0, 2.0);
        assert_eq!(ts.bracket(0.0, 5).offset, 0.0);
        // past the last sample the cycle interval still applies
        assert_eq!(ts.bracket(100.0, 5).offset, 1.0);
    }

    #[test]
    fn test_validate() {
        assert!(TimeSampling::uniform(1.0, 0.0).validate(0).is_err());
        assert!(TimeSampling::uniform(0.0, 0.0).validate(3).is_err());
        assert!(TimeSampling::acyclic(vec![]).validate(1).is_err());
        assert!(TimeSampling::acyclic(vec![0.0, 2.0, 1.0]).validate(3).is_err());
        assert!(TimeSampling::acyclic(vec![0.0, 1.0]).validate(3).is_err());
        assert!(TimeSampling::cyclic(1.0, vec![0.0, 1.5]).validate(4).is_err());
        assert!(TimeSampling::acyclic(vec![0.0, 1.0, 3.0]).validate(3).is_ok());
        assert!(TimeSampling::IDENTITY.validate(1).is_ok());
    }

    #[test]
    fn test_time_range() {
        let ts = TimeSampling::uniform(0.5, 1.0);
        assert_eq!(ts.time_range(5), (1.0, 3.0));
        assert_eq!(ts.time_range(0), (0.0, 0.0));
    }
}
