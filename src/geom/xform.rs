//! Xform (transform) decode strategy.
//!
//! A stored xform sample is one 4x4 matrix of `f64`, row-major as Alembic
//! writes it. Cooking blends the stored matrix towards the next one by the
//! interpolation offset: translation and scale linearly, rotation by slerp.

use glam::{DMat4, Mat4};

use crate::core::{cast_pod, CookContext, RawSample, SampleCooker};
use crate::util::{Error, Result};

/// Xform schema identifier.
pub const XFORM_SCHEMA: &str = "AbcGeom_Xform_v3";

/// Decoded and cooked transform.
#[derive(Clone, Debug, PartialEq)]
pub struct XformSample {
    /// Matrix of the stored sample.
    pub current: DMat4,
    /// Matrix of the following stored sample, when read.
    pub next: Option<DMat4>,
    /// Cooked matrix for the requested time.
    pub matrix: DMat4,
    /// Whether this xform inherits from parent.
    pub inherits: bool,
}

impl Default for XformSample {
    fn default() -> Self {
        Self {
            current: DMat4::IDENTITY,
            next: None,
            matrix: DMat4::IDENTITY,
            inherits: true,
        }
    }
}

impl XformSample {
    /// Cooked matrix in single precision.
    pub fn matrix_f32(&self) -> Mat4 {
        self.matrix.as_mat4()
    }

    /// Cooked translation.
    pub fn translation(&self) -> glam::DVec3 {
        self.matrix.w_axis.truncate()
    }
}

/// Encode a matrix as a stored xform sample.
pub fn xform_sample_bytes(m: &DMat4) -> Vec<u8> {
    // Alembic stores row-major, glam is column-major
    bytemuck::cast_slice::<f64, u8>(&m.transpose().to_cols_array()).to_vec()
}

fn decode_matrix(index: usize, raw: &[u8]) -> Result<DMat4> {
    let values: Vec<f64> = cast_pod(XFORM_SCHEMA, index, raw)?;
    let array: [f64; 16] = values.as_slice().try_into().map_err(|_| {
        Error::decode(XFORM_SCHEMA, index, format!("expected 16 values, got {}", values.len()))
    })?;
    Ok(DMat4::from_cols_array(&array).transpose())
}

/// Blend two affine matrices by `t`.
pub fn blend_matrices(a: &DMat4, b: &DMat4, t: f64) -> DMat4 {
    let (sa, ra, ta) = a.to_scale_rotation_translation();
    let (sb, rb, tb) = b.to_scale_rotation_translation();
    DMat4::from_scale_rotation_translation(sa.lerp(sb, t), ra.slerp(rb, t), ta.lerp(tb, t))
}

/// Decode strategy for xform schemas.
#[derive(Debug, Default, Clone, Copy)]
pub struct XformCooker;

impl SampleCooker for XformCooker {
    type Payload = XformSample;

    fn new_payload(&self) -> XformSample {
        XformSample::default()
    }

    fn decode_into(&self, payload: &mut XformSample, raw: &RawSample) -> Result<()> {
        payload.current = decode_matrix(raw.index, &raw.data)?;
        payload.next = match &raw.next {
            Some(next) => Some(decode_matrix(raw.index + 1, next)?),
            None => None,
        };
        Ok(())
    }

    fn cook_into(&self, payload: &mut XformSample, ctx: &CookContext) -> Result<()> {
        payload.matrix = match payload.next {
            Some(next) if ctx.interpolate && ctx.time_offset > 0.0 => {
                blend_matrices(&payload.current, &next, ctx.time_offset as f64)
            }
            _ => payload.current,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DQuat, DVec3};

    fn raw(index: usize, m: DMat4, next: Option<DMat4>) -> RawSample {
        RawSample {
            index,
            data: xform_sample_bytes(&m),
            next: next.map(|n| xform_sample_bytes(&n)),
        }
    }

    #[test]
    fn test_row_major_layout() {
        let m = DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
        let bytes = xform_sample_bytes(&m);
        let values: &[f64] = bytemuck::cast_slice(&bytes);
        // translation sits in the last row
        assert_eq!(&values[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_decode_and_cook_exact() {
        let m = DMat4::from_translation(DVec3::new(4.0, 0.0, 0.0));
        let mut payload = XformCooker.new_payload();
        XformCooker.decode_into(&mut payload, &raw(0, m, None)).unwrap();
        XformCooker.cook_into(&mut payload, &CookContext::default()).unwrap();
        assert_eq!(payload.matrix, m);
        assert_eq!(payload.translation(), DVec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_interpolated_cook() {
        let a = DMat4::from_translation(DVec3::ZERO);
        let b = DMat4::from_scale_rotation_translation(
            DVec3::ONE,
            DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2),
            DVec3::new(10.0, 0.0, 0.0),
        );
        let mut payload = XformCooker.new_payload();
        XformCooker.decode_into(&mut payload, &raw(3, a, Some(b))).unwrap();
        let ctx = CookContext {
            time_offset: 0.5,
            interpolate: true,
            ..CookContext::default()
        };
        XformCooker.cook_into(&mut payload, &ctx).unwrap();

        assert!((payload.translation() - DVec3::new(5.0, 0.0, 0.0)).length() < 1e-9);
        let (_, rot, _) = payload.matrix.to_scale_rotation_translation();
        let expected = DQuat::from_rotation_y(std::f64::consts::FRAC_PI_4);
        assert!(rot.angle_between(expected) < 1e-6);
    }

    #[test]
    fn test_wrong_size_is_decode_error() {
        let mut payload = XformCooker.new_payload();
        let bad = RawSample {
            index: 2,
            data: vec![0u8; 8 * 9],
            next: None,
        };
        let err = XformCooker.decode_into(&mut payload, &bad).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("got 9"));
    }
}
