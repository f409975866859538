//! Streaming configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::util::Result;

/// Settings read by every schema at the start of an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Defer read/cook work to the scheduler instead of running it inline.
    pub async_load: bool,
    /// Blend between neighbouring stored samples.
    pub interpolate_samples: bool,
    /// Multiplier applied to derived velocities.
    pub vertex_motion_scale: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            async_load: true,
            interpolate_samples: true,
            vertex_motion_scale: 1.0,
        }
    }
}

impl StreamConfig {
    /// Synchronous, non-interpolating configuration.
    pub fn immediate() -> Self {
        Self {
            async_load: false,
            interpolate_samples: false,
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
