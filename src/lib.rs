//! # Alembic Stream
//!
//! Time-driven streaming of Alembic schema samples.
//!
//! Each streamed object owns one current sample. Once per frame the object is
//! asked for a time; it resolves the stored sample index and interpolation
//! offset, and then either re-reads the stored data, re-cooks the existing
//! data for a new offset, or does nothing. Work can run inline or through a
//! single-slot async job.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math types
//! - [`core`] - Time sampling, sample readers, decode strategies, config
//! - [`schema`] - The update engine, async job slot, schedulers, properties
//! - [`geom`] - Decode strategies for xforms and points
//! - [`stream`] - Player driving many schemas over a time window
//!
//! ## Example
//!
//! ```ignore
//! use alembic_stream::prelude::*;
//!
//! let ctx = Context::with_config(StreamConfig::default());
//! let mut schema = Schema::new(ctx, reader, XformCooker)?;
//! schema.update_sample(1.25)?;
//! schema.wait_async()?;
//! let matrix = schema.sample().map(|s| s.payload.matrix);
//! ```

pub mod util;
pub mod core;
pub mod schema;
pub mod geom;
pub mod stream;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Chrono, Error, Result};
    pub use crate::core::{
        CookContext, MemoryProperty, RawSample, SampleBracket, SampleCooker, SampleReader,
        StreamConfig, TimeSampling, TimeSamplingType,
    };
    pub use crate::schema::{
        AsyncScheduler, Context, InlineScheduler, JobState, RayonScheduler, Sample, Schema,
        StreamedSchema, WorkerThread,
    };
    pub use crate::geom::*;
    pub use crate::stream::StreamPlayer;
}
