//! Decode strategies for common attribute kinds:
//! - [`XformCooker`] - Transform nodes
//! - [`PointsCooker`] - Point clouds

pub mod xform;
pub mod points;

pub use xform::{XformCooker, XformSample, XFORM_SCHEMA, xform_sample_bytes, blend_matrices};
pub use points::{PointsCooker, PointsSample, POINTS_SCHEMA};
