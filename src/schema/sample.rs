//! Sample object shared between a schema and its async job.

use std::sync::Arc;

use parking_lot::Mutex;

/// One schema's current sample: the cooked payload plus per-sample state.
#[derive(Debug, Clone)]
pub struct Sample<T> {
    /// Decoded and cooked attribute data.
    pub payload: T,
    /// Whether the object is visible at the fetched index.
    pub visibility: bool,
    force_sync: bool,
}

impl<T> Sample<T> {
    /// Wrap a freshly allocated payload.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            visibility: true,
            force_sync: false,
        }
    }

    /// Request inline behavior from the next cook.
    pub fn mark_force_sync(&mut self) {
        self.force_sync = true;
    }

    /// Check the force-sync marker without consuming it.
    pub fn is_force_sync(&self) -> bool {
        self.force_sync
    }

    /// Consume the force-sync marker.
    pub(crate) fn take_force_sync(&mut self) -> bool {
        std::mem::take(&mut self.force_sync)
    }
}

/// Shared handle to a sample; the schema owns it, jobs borrow it by clone.
pub type SampleHandle<T> = Arc<Mutex<Sample<T>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Sample::new(3u32);
        assert!(s.visibility);
        assert!(!s.is_force_sync());
        assert_eq!(s.payload, 3);
    }

    #[test]
    fn test_force_sync_is_one_shot() {
        let mut s = Sample::new(());
        s.mark_force_sync();
        assert!(s.take_force_sync());
        assert!(!s.take_force_sync());
    }
}
