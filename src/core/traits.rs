//! Interfaces between the schema engine and its collaborators.
//!
//! - [`SampleReader`] is the archive side: stored samples as raw bytes.
//! - [`SampleCooker`] is the per-attribute-kind decode strategy.
//!
//! The engine only ever talks to these traits, so archive formats and
//! attribute kinds plug in without touching the update logic.

use bytemuck::Pod;

use crate::core::TimeSampling;
use crate::util::{Error, Result};

// ============================================================================
// Archive side
// ============================================================================

/// Reader interface for one stored, time-sampled property.
pub trait SampleReader: Send + Sync {
    /// Property name.
    fn name(&self) -> &str;

    /// When each stored sample was recorded.
    fn time_sampling(&self) -> &TimeSampling;

    /// Number of stored samples.
    fn num_samples(&self) -> usize;

    /// True if every stored sample holds the same data.
    fn is_constant(&self) -> bool;

    /// Read the raw bytes of one stored sample.
    fn read_raw(&self, index: usize) -> Result<Vec<u8>>;
}

/// Read one stored sample and reinterpret it as a POD array.
pub fn read_pod<T: Pod>(reader: &dyn SampleReader, index: usize) -> Result<Vec<T>> {
    let raw = reader.read_raw(index)?;
    cast_pod(reader.name(), index, &raw)
}

/// Reinterpret raw bytes as a POD array, copying into aligned storage.
pub fn cast_pod<T: Pod>(property: &str, index: usize, raw: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if size == 0 || raw.len() % size != 0 {
        return Err(Error::decode(
            property,
            index,
            format!("{} bytes is not a multiple of element size {}", raw.len(), size),
        ));
    }
    Ok(bytemuck::pod_collect_to_vec(raw))
}

// ============================================================================
// Decode strategy
// ============================================================================

/// Raw bytes fetched by the read stage.
#[derive(Clone, Debug, Default)]
pub struct RawSample {
    /// Stored index of `data`.
    pub index: usize,
    /// Raw bytes of the stored sample.
    pub data: Vec<u8>,
    /// Raw bytes of the following stored sample when blending.
    pub next: Option<Vec<u8>>,
}

/// Inputs of the cook stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CookContext {
    /// Stored index the payload was decoded from.
    pub index: usize,
    /// Position between the stored sample and the next one, in [0, 1].
    pub time_offset: f32,
    /// Seconds between the two bracketing stored samples.
    pub time_interval: f32,
    /// Whether blending is enabled for this cycle.
    pub interpolate: bool,
    /// The cook runs inline on the updating thread.
    pub force_sync: bool,
    /// Velocity multiplier from the stream configuration.
    pub vertex_motion_scale: f32,
}

impl Default for CookContext {
    fn default() -> Self {
        Self {
            index: 0,
            time_offset: 0.0,
            time_interval: 0.0,
            interpolate: false,
            force_sync: false,
            vertex_motion_scale: 1.0,
        }
    }
}

/// Decode strategy for one attribute kind.
///
/// `decode_into` turns raw stored bytes into the payload, `cook_into` turns
/// the decoded payload into the form the runtime consumes. Neither stage
/// performs I/O.
pub trait SampleCooker: Send + Sync + 'static {
    /// Decoded, cooked representation of one sample.
    type Payload: Send + 'static;

    /// Allocate an empty payload for a new sample.
    fn new_payload(&self) -> Self::Payload;

    /// Decode freshly read raw data into the payload.
    fn decode_into(&self, payload: &mut Self::Payload, raw: &RawSample) -> Result<()>;

    /// Produce the consumable data from what was last decoded.
    fn cook_into(&self, payload: &mut Self::Payload, ctx: &CookContext) -> Result<()>;
}
