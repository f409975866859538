//! State shared by every schema of one stream.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::StreamConfig;
use crate::schema::{AsyncScheduler, InlineScheduler, RayonScheduler};

/// Configuration and scheduler shared across the schemas of a stream.
pub struct Context {
    config: RwLock<StreamConfig>,
    scheduler: Arc<dyn AsyncScheduler>,
}

impl Context {
    /// Create a context with an explicit scheduler.
    pub fn new(config: StreamConfig, scheduler: Arc<dyn AsyncScheduler>) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            scheduler,
        })
    }

    /// Create a context that schedules on rayon's global pool.
    pub fn with_config(config: StreamConfig) -> Arc<Self> {
        Self::new(config, Arc::new(RayonScheduler::global()))
    }

    /// Create a context whose async jobs run on the submitting thread.
    pub fn inline(config: StreamConfig) -> Arc<Self> {
        Self::new(config, Arc::new(InlineScheduler))
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> StreamConfig {
        self.config.read().clone()
    }

    /// Replace the configuration; applies from the next update.
    pub fn set_config(&self, config: StreamConfig) {
        *self.config.write() = config;
    }

    /// Modify the configuration in place.
    pub fn update_config(&self, f: impl FnOnce(&mut StreamConfig)) {
        f(&mut self.config.write());
    }

    /// Scheduler receiving submitted jobs.
    pub fn scheduler(&self) -> &dyn AsyncScheduler {
        self.scheduler.as_ref()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}
