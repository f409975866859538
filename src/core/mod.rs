//! Core layer - time resolution, configuration and collaborator interfaces.
//!
//! This module provides:
//! - [`TimeSampling`] - Time sampling for stored samples
//! - [`SampleBracket`] - Stored index plus interpolation offset for a time
//! - [`StreamConfig`] - Per-update settings
//! - [`SampleReader`] / [`SampleCooker`] - Archive and decode interfaces
//! - [`MemoryProperty`] - In-memory stored property

mod time_sampling;
mod sample;
mod config;
mod traits;
mod memory;

pub use time_sampling::{TimeSampling, TimeSamplingType};
pub use sample::{SampleBracket, interpolation_offset};
pub use config::StreamConfig;
pub use traits::{
    SampleReader, SampleCooker,
    RawSample, CookContext,
    read_pod, cast_pod,
};
pub use memory::MemoryProperty;
