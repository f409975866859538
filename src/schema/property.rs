//! Auxiliary properties refreshed alongside a schema's main sample.

use std::sync::Arc;

use bytemuck::Pod;

use crate::core::{cast_pod, SampleReader};
use crate::util::{Error, Result};

/// One auxiliary time-varying property and its last fetched value.
pub struct Property {
    reader: Arc<dyn SampleReader>,
    data: Option<Vec<u8>>,
    last_index: Option<usize>,
    data_updated: bool,
    force_update: bool,
}

impl Property {
    /// Wrap a stored property.
    pub fn new(reader: Arc<dyn SampleReader>) -> Self {
        Self {
            reader,
            data: None,
            last_index: None,
            data_updated: false,
            force_update: false,
        }
    }

    /// Property name.
    pub fn name(&self) -> &str {
        self.reader.name()
    }

    /// True if every stored sample is identical.
    pub fn is_constant(&self) -> bool {
        self.reader.is_constant()
    }

    /// Number of stored samples.
    pub fn num_samples(&self) -> usize {
        self.reader.num_samples()
    }

    /// Did the last update fetch new data.
    pub fn is_data_updated(&self) -> bool {
        self.data_updated
    }

    /// Stored index of the current value.
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Re-fetch on the next update even if the index is unchanged.
    pub fn mark_force_update(&mut self) {
        self.force_update = true;
    }

    /// Refresh for a stored index, clamped into this property's range.
    ///
    /// Fetches when nothing was fetched yet, when a non-constant property
    /// moves to another index, or when forced. A failed read leaves the
    /// previous value and index in place.
    pub fn update(&mut self, index: usize) -> Result<()> {
        let count = self.reader.num_samples();
        if count == 0 {
            self.data_updated = false;
            return Ok(());
        }
        let index = index.min(count - 1);
        let fetch = self.data.is_none()
            || (!self.is_constant() && self.last_index != Some(index))
            || self.force_update;

        if fetch {
            self.data = Some(self.reader.read_raw(index)?);
        }
        self.data_updated = fetch;
        self.last_index = Some(index);
        self.force_update = false;
        Ok(())
    }

    /// Raw bytes of the current value.
    pub fn raw(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Current value as a POD array.
    pub fn values<T: Pod>(&self) -> Result<Vec<T>> {
        let raw = self.data.as_deref().ok_or_else(|| {
            Error::usage(format!("property '{}' has not been updated", self.name()))
        })?;
        cast_pod(self.name(), self.last_index.unwrap_or(0), raw)
    }

    /// Current value as a single POD scalar.
    pub fn value<T: Pod>(&self) -> Result<T> {
        let values = self.values::<T>()?;
        values.first().copied().ok_or_else(|| Error::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: "empty sample".to_string(),
        })
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name())
            .field("last_index", &self.last_index)
            .field("data_updated", &self.data_updated)
            .finish()
    }
}

/// Properties kept sorted by name; names are unique.
#[derive(Debug, Default)]
pub struct PropertyStore {
    properties: Vec<Property>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property at its sorted position.
    pub fn insert(&mut self, property: Property) -> Result<()> {
        match self.position(property.name()) {
            Ok(_) => Err(Error::DuplicateProperty(property.name().to_string())),
            Err(pos) => {
                self.properties.insert(pos, property);
                Ok(())
            }
        }
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property at `index` in name order.
    pub fn get(&self, index: usize) -> Result<&Property> {
        let count = self.properties.len();
        self.properties
            .get(index)
            .ok_or(Error::PropertyOutOfBounds { index, count })
    }

    /// Property by name.
    pub fn by_name(&self, name: &str) -> Option<&Property> {
        self.position(name).ok().map(|i| &self.properties[i])
    }

    /// Iterate in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Refresh every property for a stored index.
    ///
    /// All properties are attempted; the first failure is returned.
    pub fn update_all(&mut self, index: usize) -> Result<()> {
        let mut first_err = None;
        for property in &mut self.properties {
            if let Err(e) = property.update(index) {
                tracing::warn!("property '{}' failed to update: {}", property.name(), e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Force every property to re-fetch on the next update.
    pub fn mark_force_update(&mut self) {
        for property in &mut self.properties {
            property.mark_force_update();
        }
    }

    fn position(&self, name: &str) -> std::result::Result<usize, usize> {
        self.properties
            .binary_search_by(|p| p.name().cmp(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MemoryProperty, TimeSampling};

    fn scalar(name: &str, values: &[f32]) -> Arc<MemoryProperty> {
        Arc::new(MemoryProperty::from_scalars(name, TimeSampling::uniform(1.0, 0.0), values))
    }

    #[test]
    fn test_sorted_and_unique() {
        let mut store = PropertyStore::new();
        store.insert(Property::new(scalar("width", &[1.0]))).unwrap();
        store.insert(Property::new(scalar("alpha", &[1.0]))).unwrap();
        store.insert(Property::new(scalar("mass", &[1.0]))).unwrap();

        let names: Vec<_> = store.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["alpha", "mass", "width"]);

        let err = store.insert(Property::new(scalar("mass", &[2.0]))).unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty(ref n) if n == "mass"));
    }

    #[test]
    fn test_lookup() {
        let mut store = PropertyStore::new();
        store.insert(Property::new(scalar("b", &[1.0]))).unwrap();
        store.insert(Property::new(scalar("a", &[1.0]))).unwrap();

        assert_eq!(store.get(0).unwrap().name(), "a");
        assert!(matches!(store.get(2), Err(Error::PropertyOutOfBounds { index: 2, count: 2 })));
        assert!(store.by_name("b").is_some());
        assert!(store.by_name("c").is_none());
    }

    #[test]
    fn test_refetch_rules() {
        let varying = scalar("v", &[1.0, 2.0, 3.0]);
        let constant = scalar("c", &[5.0, 5.0, 5.0]);
        let mut store = PropertyStore::new();
        store.insert(Property::new(varying.clone())).unwrap();
        store.insert(Property::new(constant.clone())).unwrap();

        store.update_all(0).unwrap();
        store.update_all(1).unwrap();
        store.update_all(1).unwrap();
        store.update_all(2).unwrap();
        assert_eq!(varying.read_count(), 3);
        assert_eq!(constant.read_count(), 1);
        assert_eq!(store.by_name("v").unwrap().value::<f32>().unwrap(), 3.0);

        store.mark_force_update();
        store.update_all(2).unwrap();
        assert_eq!(varying.read_count(), 4);
        assert_eq!(constant.read_count(), 2);
        assert!(store.by_name("c").unwrap().is_data_updated());
    }

    #[test]
    fn test_index_clamped_to_property_range() {
        let short = scalar("s", &[1.0, 2.0]);
        let mut prop = Property::new(short);
        prop.update(10).unwrap();
        assert_eq!(prop.last_index(), Some(1));
        assert_eq!(prop.value::<f32>().unwrap(), 2.0);
    }

    #[test]
    fn test_failed_read_keeps_previous_value() {
        let p = scalar("p", &[1.0, 2.0]);
        let mut prop = Property::new(p.clone());
        prop.update(0).unwrap();
        p.fail_at(Some(1));
        assert!(prop.update(1).unwrap_err().is_decode());
        assert_eq!(prop.last_index(), Some(0));
        assert_eq!(prop.value::<f32>().unwrap(), 1.0);
    }

    #[test]
    fn test_value_before_update() {
        let prop = Property::new(scalar("p", &[1.0]));
        assert!(prop.value::<f32>().unwrap_err().is_usage());
    }
}
