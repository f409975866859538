//! In-memory stored property.
//!
//! Holds raw samples in memory and serves them through [`SampleReader`].
//! Read counts are tracked so callers can observe how often the engine
//! actually went to storage.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::core::{SampleReader, TimeSampling};
use crate::util::{Error, Result};

/// A stored property whose samples live in memory.
pub struct MemoryProperty {
    name: String,
    time_sampling: TimeSampling,
    samples: Vec<Vec<u8>>,
    constant: bool,
    reads: AtomicUsize,
    fail_at: Mutex<Option<usize>>,
}

impl MemoryProperty {
    /// Create from raw byte samples.
    ///
    /// The property is constant when every sample holds identical bytes.
    pub fn new(name: impl Into<String>, time_sampling: TimeSampling, samples: Vec<Vec<u8>>) -> Self {
        let constant = samples.windows(2).all(|w| w[0] == w[1]);
        Self {
            name: name.into(),
            time_sampling,
            samples,
            constant,
            reads: AtomicUsize::new(0),
            fail_at: Mutex::new(None),
        }
    }

    /// Create from typed samples, one slice per stored sample.
    pub fn from_pods<T: Pod>(
        name: impl Into<String>,
        time_sampling: TimeSampling,
        samples: &[Vec<T>],
    ) -> Self {
        let raw = samples
            .iter()
            .map(|s| bytemuck::cast_slice::<T, u8>(s).to_vec())
            .collect();
        Self::new(name, time_sampling, raw)
    }

    /// Create from one scalar value per stored sample.
    pub fn from_scalars<T: Pod>(
        name: impl Into<String>,
        time_sampling: TimeSampling,
        values: &[T],
    ) -> Self {
        let raw = values
            .iter()
            .map(|v| bytemuck::bytes_of(v).to_vec())
            .collect();
        Self::new(name, time_sampling, raw)
    }

    /// Number of `read_raw` calls served (including failed ones).
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Make reads of `index` fail with a decode error.
    pub fn fail_at(&self, index: Option<usize>) {
        *self.fail_at.lock() = index;
    }
}

impl SampleReader for MemoryProperty {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_sampling(&self) -> &TimeSampling {
        &self.time_sampling
    }

    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn is_constant(&self) -> bool {
        self.constant
    }

    fn read_raw(&self, index: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if *self.fail_at.lock() == Some(index) {
            return Err(Error::decode(&self.name, index, "injected read failure"));
        }
        self.samples
            .get(index)
            .cloned()
            .ok_or(Error::SampleOutOfBounds {
                index,
                count: self.samples.len(),
            })
    }
}

impl std::fmt::Debug for MemoryProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProperty")
            .field("name", &self.name)
            .field("num_samples", &self.samples.len())
            .field("constant", &self.constant)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::read_pod;

    #[test]
    fn test_constant_detection() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        let c = MemoryProperty::from_scalars("c", ts.clone(), &[1.0f32, 1.0, 1.0]);
        assert!(c.is_constant());
        let v = MemoryProperty::from_scalars("v", ts, &[1.0f32, 2.0]);
        assert!(!v.is_constant());
    }

    #[test]
    fn test_read_counts_and_failures() {
        let p = MemoryProperty::from_pods("P", TimeSampling::IDENTITY, &[vec![1u32, 2], vec![3, 4]]);
        assert_eq!(read_pod::<u32>(&p, 1).unwrap(), vec![3, 4]);

        p.fail_at(Some(0));
        assert!(p.read_raw(0).unwrap_err().is_decode());
        assert!(matches!(p.read_raw(9), Err(Error::SampleOutOfBounds { index: 9, count: 2 })));
        assert_eq!(p.read_count(), 3);
    }
}
