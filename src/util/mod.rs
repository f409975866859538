//! Utility types shared across the crate:
//! - [`Error`] / [`Result`] - Error handling
//! - [`Chrono`] and math re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
