//! Schema layer - the per-object update engine and what it drives.
//!
//! - [`Schema`] - Time-driven read/cook/interpolate state machine
//! - [`AsyncLoad`] - Single-slot two-stage async job
//! - [`AsyncScheduler`] - Executes submitted jobs (inline, rayon, worker thread)
//! - [`Sample`] - Cooked payload plus visibility
//! - [`PropertyStore`] - Auxiliary properties refreshed in lockstep

mod async_load;
mod scheduler;
mod context;
mod sample;
mod visibility;
mod property;
#[allow(clippy::module_inception)]
mod schema;

pub use async_load::{AsyncLoad, AsyncTask, JobState, ReadRequest, StageExecutor};
pub(crate) use async_load::run_stages;
pub use scheduler::{AsyncScheduler, InlineScheduler, RayonScheduler, WorkerThread};
pub use context::Context;
pub use sample::{Sample, SampleHandle};
pub use visibility::{ObjectVisibility, VISIBILITY_PROPERTY_NAME, read_visibility};
pub use property::{Property, PropertyStore};
pub use schema::{CyclePhase, CyclePlan, CycleRequest, Schema, StreamedSchema};
