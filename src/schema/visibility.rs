//! Visibility property support.
//!
//! Objects can carry an `i8` "visible" property. Its values are:
//! - Deferred (-1): inherit from parent
//! - Hidden (0): explicitly hidden
//! - Visible (1): explicitly visible

use crate::core::SampleReader;
use crate::util::{Error, Result};

/// Visibility property name constant.
pub const VISIBILITY_PROPERTY_NAME: &str = "visible";

/// Object visibility state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ObjectVisibility {
    /// Visibility is deferred to parent.
    #[default]
    Deferred = -1,

    /// Object is explicitly hidden.
    Hidden = 0,

    /// Object is explicitly visible.
    Visible = 1,
}

impl ObjectVisibility {
    /// Parse from i8 value (as stored in property).
    pub fn from_i8(value: i8) -> Self {
        match value {
            0 => Self::Hidden,
            1 => Self::Visible,
            _ => Self::Deferred, // -1 or any other value
        }
    }

    /// Convert to i8 for storage.
    pub fn to_i8(self) -> i8 {
        self as i8
    }

    /// Check if this is explicitly hidden.
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }

    /// Whether a sample with this value is drawn. Only an explicit
    /// hidden value hides the sample.
    pub fn is_drawn(self) -> bool {
        !self.is_hidden()
    }
}

impl From<i8> for ObjectVisibility {
    fn from(value: i8) -> Self {
        Self::from_i8(value)
    }
}

/// Read the visibility at a stored index, clamped to the property's range.
pub fn read_visibility(reader: &dyn SampleReader, index: usize) -> Result<ObjectVisibility> {
    let count = reader.num_samples();
    if count == 0 {
        return Ok(ObjectVisibility::Deferred);
    }
    let index = index.min(count - 1);
    let raw = reader.read_raw(index)?;
    match raw.first() {
        Some(&b) => Ok(ObjectVisibility::from_i8(b as i8)),
        None => Err(Error::decode(reader.name(), index, "empty visibility sample")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MemoryProperty, TimeSampling};

    #[test]
    fn test_visibility_conversion() {
        assert_eq!(ObjectVisibility::from_i8(-1), ObjectVisibility::Deferred);
        assert_eq!(ObjectVisibility::from_i8(0), ObjectVisibility::Hidden);
        assert_eq!(ObjectVisibility::from_i8(1), ObjectVisibility::Visible);
        assert_eq!(ObjectVisibility::from_i8(42), ObjectVisibility::Deferred);

        assert_eq!(ObjectVisibility::Deferred.to_i8(), -1);
        assert_eq!(ObjectVisibility::Hidden.to_i8(), 0);
        assert_eq!(ObjectVisibility::Visible.to_i8(), 1);
    }

    #[test]
    fn test_deferred_is_drawn() {
        assert!(ObjectVisibility::Deferred.is_drawn());
        assert!(ObjectVisibility::Visible.is_drawn());
        assert!(!ObjectVisibility::Hidden.is_drawn());
    }

    #[test]
    fn test_read_visibility_clamps() {
        let vis = MemoryProperty::from_scalars(
            VISIBILITY_PROPERTY_NAME,
            TimeSampling::uniform(1.0, 0.0),
            &[1i8, 0],
        );
        assert_eq!(read_visibility(&vis, 0).unwrap(), ObjectVisibility::Visible);
        assert_eq!(read_visibility(&vis, 7).unwrap(), ObjectVisibility::Hidden);
    }
}
