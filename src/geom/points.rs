//! Points decode strategy.
//!
//! A stored points sample is a packed array of `Vec3` positions. When the
//! next stored sample has the same point count, cooking blends positions
//! and derives per-point velocities from the interval.

use glam::Vec3;

use crate::core::{cast_pod, CookContext, RawSample, SampleCooker};
use crate::util::{BBox3f, Result};

/// Points schema identifier.
pub const POINTS_SCHEMA: &str = "AbcGeom_Points_v1";

/// Decoded and cooked point cloud.
#[derive(Clone, Debug, Default)]
pub struct PointsSample {
    /// Positions of the stored sample.
    pub positions: Vec<Vec3>,
    /// Positions of the following stored sample; empty when not read.
    pub next_positions: Vec<Vec3>,
    /// Cooked positions for the requested time.
    pub points: Vec<Vec3>,
    /// Cooked velocities; zero when nothing to derive them from.
    pub velocities: Vec<Vec3>,
    /// Bounds of the cooked points.
    pub bounds: BBox3f,
}

impl PointsSample {
    /// Get number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Check if blending towards the next sample is possible.
    pub fn can_interpolate(&self) -> bool {
        !self.next_positions.is_empty() && self.next_positions.len() == self.positions.len()
    }
}

/// Decode strategy for points schemas.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointsCooker;

impl SampleCooker for PointsCooker {
    type Payload = PointsSample;

    fn new_payload(&self) -> PointsSample {
        PointsSample::default()
    }

    fn decode_into(&self, payload: &mut PointsSample, raw: &RawSample) -> Result<()> {
        payload.positions = cast_pod(POINTS_SCHEMA, raw.index, &raw.data)?;
        payload.next_positions = match &raw.next {
            Some(next) => cast_pod(POINTS_SCHEMA, raw.index + 1, next)?,
            None => Vec::new(),
        };
        Ok(())
    }

    fn cook_into(&self, payload: &mut PointsSample, ctx: &CookContext) -> Result<()> {
        let blend = ctx.interpolate && payload.can_interpolate();
        let t = ctx.time_offset;

        payload.points.clear();
        payload.velocities.clear();
        if blend {
            let inv_interval = if ctx.time_interval > 0.0 {
                ctx.vertex_motion_scale / ctx.time_interval
            } else {
                0.0
            };
            for (&p, &n) in payload.positions.iter().zip(&payload.next_positions) {
                payload.points.push(p.lerp(n, t));
                payload.velocities.push((n - p) * inv_interval);
            }
        } else {
            payload.points.extend_from_slice(&payload.positions);
            payload.velocities.resize(payload.positions.len(), Vec3::ZERO);
        }
        payload.bounds = BBox3f::from_points(&payload.points);
        Ok(())
    }
}
