//! Schema update engine.
//!
//! A [`Schema`] owns the current sample of one streamed object and decides,
//! once per frame, whether that sample has to be read again, re-cooked for a
//! new interpolation offset, or left alone. Decisions are made by a pure
//! planner ([`Schema::plan`]) and then executed inline or through the
//! schema's async job slot.
//!
//! Protocol: `update_sample(t)` then `wait_async()` before reading the
//! sample. A second update that would schedule work while a submitted job
//! is still unobserved is rejected with [`Error::Usage`].

use std::any::Any;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::core::{CookContext, RawSample, SampleBracket, SampleCooker, SampleReader, TimeSampling};
use crate::schema::{
    read_visibility, run_stages, AsyncLoad, Context, JobState, Property, PropertyStore,
    ReadRequest, Sample, SampleHandle, StageExecutor,
};
use crate::util::{Chrono, Error, Result};

/// Inputs of one update cycle: requested time, one-shot flags and config.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleRequest {
    /// Requested time in seconds.
    pub time: Chrono,
    /// Re-fetch even if the stored index is unchanged.
    pub force_update: bool,
    /// Run read and cook inline this cycle.
    pub force_sync: bool,
    /// Configuration: defer work to the scheduler.
    pub async_load: bool,
    /// Configuration: blend between stored samples.
    pub interpolate: bool,
    /// Configuration: velocity multiplier.
    pub vertex_motion_scale: f32,
}

/// What one update cycle does to the sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    /// Read and cook a stored sample.
    Fetching,
    /// Stored index unchanged; re-cook for a new offset.
    Reusing,
    /// Stored index and offset unchanged; nothing to do.
    Skipped,
    /// Constant schema, or interpolation disabled; sample already current.
    Fresh,
}

/// Decisions for one update cycle, computed without side effects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CyclePlan {
    /// Resolved stored index and interpolation bracket.
    pub bracket: SampleBracket,
    /// A new sample has to be allocated first.
    pub allocate: bool,
    /// Read stage to run, if any.
    pub read: Option<ReadRequest>,
    /// Cook stage to run, if any.
    pub cook: Option<CookContext>,
    /// Offset recorded once the cycle commits.
    pub time_offset: f32,
    /// Interval recorded once the cycle commits.
    pub time_interval: f32,
    /// Stages run on the calling thread instead of the scheduler.
    pub inline: bool,
    /// State-machine phase of this cycle.
    pub phase: CyclePhase,
}

impl CyclePlan {
    /// Stored index this cycle resolves to.
    pub fn stored_index(&self) -> usize {
        self.bracket.index
    }

    /// True if any stage will run.
    pub fn has_work(&self) -> bool {
        self.read.is_some() || self.cook.is_some()
    }
}

/// Interpolation bookkeeping carried between cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct InterpolationState {
    last_sample_index: Option<usize>,
    current_time_offset: f32,
    current_time_interval: f32,
    sample_index_changed: bool,
    interpolating: bool,
}

/// Read/cook stage executor bound to one sample.
struct FetchTarget<C: SampleCooker> {
    cooker: Arc<C>,
    reader: Arc<dyn SampleReader>,
    visibility: Option<Arc<dyn SampleReader>>,
    sample: SampleHandle<C::Payload>,
}

impl<C: SampleCooker> StageExecutor for FetchTarget<C> {
    fn read(&mut self, request: &ReadRequest) -> Result<()> {
        let data = self.reader.read_raw(request.index)?;
        let next = match request.next_index {
            Some(next) => Some(self.reader.read_raw(next)?),
            None => None,
        };
        let visibility = match &self.visibility {
            Some(vis) => Some(read_visibility(vis.as_ref(), request.index)?),
            None => None,
        };
        let raw = RawSample { index: request.index, data, next };

        let mut sample = self.sample.lock();
        self.cooker.decode_into(&mut sample.payload, &raw)?;
        if let Some(vis) = visibility {
            sample.visibility = vis.is_drawn();
        }
        Ok(())
    }

    fn cook(&mut self, ctx: &CookContext) -> Result<()> {
        let mut sample = self.sample.lock();
        let mut ctx = *ctx;
        ctx.force_sync |= sample.take_force_sync();
        self.cooker.cook_into(&mut sample.payload, &ctx)
    }
}

/// Streamed schema generic over its decode strategy.
pub struct Schema<C: SampleCooker> {
    context: Arc<Context>,
    reader: Arc<dyn SampleReader>,
    visibility: Option<Arc<dyn SampleReader>>,
    cooker: Arc<C>,
    time_sampling: TimeSampling,
    num_samples: usize,
    sample: Option<SampleHandle<C::Payload>>,
    properties: PropertyStore,
    async_load: AsyncLoad,
    interp: InterpolationState,
    enabled: bool,
    constant: bool,
    data_updated: bool,
    force_update: bool,
    force_sync: bool,
}

impl<C: SampleCooker> Schema<C> {
    /// Create a schema streaming `reader` through `cooker`.
    ///
    /// Fails with [`Error::Configuration`] if the reader's time sampling
    /// cannot resolve times for its stored samples.
    pub fn new(context: Arc<Context>, reader: Arc<dyn SampleReader>, cooker: C) -> Result<Self> {
        let time_sampling = reader.time_sampling().clone();
        let num_samples = reader.num_samples();
        time_sampling.validate(num_samples).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::configuration(format!("schema '{}': {}", reader.name(), msg))
            }
            other => other,
        })?;

        Ok(Self {
            context,
            constant: reader.is_constant(),
            reader,
            visibility: None,
            cooker: Arc::new(cooker),
            time_sampling,
            num_samples,
            sample: None,
            properties: PropertyStore::new(),
            async_load: AsyncLoad::new(),
            interp: InterpolationState::default(),
            enabled: true,
            data_updated: false,
            force_update: false,
            force_sync: false,
        })
    }

    /// Attach a visibility property; a varying one makes the schema non-constant.
    pub fn with_visibility(mut self, visibility: Arc<dyn SampleReader>) -> Self {
        self.constant = self.reader.is_constant() && visibility.is_constant();
        self.visibility = Some(visibility);
        self
    }

    /// Attach an auxiliary property.
    pub fn with_property(mut self, reader: Arc<dyn SampleReader>) -> Result<Self> {
        self.properties.insert(Property::new(reader))?;
        Ok(self)
    }

    /// Schema name (the main property's name).
    pub fn name(&self) -> &str {
        self.reader.name()
    }

    /// Time sampling of the main property.
    pub fn time_sampling(&self) -> &TimeSampling {
        &self.time_sampling
    }

    /// Number of stored samples.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Time span of the stored samples.
    pub fn time_range(&self) -> (Chrono, Chrono) {
        self.time_sampling.time_range(self.num_samples)
    }

    /// Data never changes across stored samples.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// The last update produced new cooked data (or will, once waited on).
    pub fn is_data_updated(&self) -> bool {
        self.data_updated
    }

    /// The last update moved to a different stored index.
    pub fn is_sample_index_changed(&self) -> bool {
        self.interp.sample_index_changed
    }

    /// Stored index used by the last committed update.
    pub fn last_sample_index(&self) -> Option<usize> {
        self.interp.last_sample_index
    }

    /// Blend offset of the last committed update, in [0, 1].
    pub fn current_time_offset(&self) -> f32 {
        self.interp.current_time_offset
    }

    /// Interval between bracketing stored samples of the last update.
    pub fn current_time_interval(&self) -> f32 {
        self.interp.current_time_interval
    }

    /// State of the async job slot.
    pub fn job_state(&self) -> JobState {
        self.async_load.state()
    }

    /// Enable or disable updates. A disabled schema ignores `update_sample`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether updates are processed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-fetch the sample and its properties on the next update.
    pub fn mark_force_update(&mut self) {
        self.force_update = true;
        self.properties.mark_force_update();
    }

    /// Run the next update's stages inline.
    pub fn mark_force_sync(&mut self) {
        self.force_sync = true;
    }

    /// Current sample, if one was ever fetched.
    ///
    /// Call `wait_async()` first; while a job runs the lock is held by the worker.
    pub fn sample(&self) -> Option<MutexGuard<'_, Sample<C::Payload>>> {
        self.sample.as_ref().map(|s| s.lock())
    }

    /// Shared handle to the current sample.
    pub fn sample_handle(&self) -> Option<SampleHandle<C::Payload>> {
        self.sample.clone()
    }

    /// Number of auxiliary properties.
    pub fn num_properties(&self) -> usize {
        self.properties.len()
    }

    /// Auxiliary property by index in name order.
    pub fn property_by_index(&self, index: usize) -> Result<&Property> {
        self.properties.get(index)
    }

    /// Auxiliary property by name.
    pub fn property_by_name(&self, name: &str) -> Option<&Property> {
        self.properties.by_name(name)
    }

    /// Auxiliary properties.
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Build the request for an update at `time` from pending flags and config.
    pub fn request(&self, time: Chrono) -> CycleRequest {
        let config = self.context.config();
        CycleRequest {
            time,
            force_update: self.force_update,
            force_sync: self.force_sync,
            async_load: config.async_load,
            interpolate: config.interpolate_samples,
            vertex_motion_scale: config.vertex_motion_scale,
        }
    }

    /// Decide what an update cycle does, without changing any state.
    pub fn plan(&self, req: &CycleRequest) -> CyclePlan {
        let bracket = self.time_sampling.bracket(req.time, self.num_samples);
        let index = bracket.index;
        let last = self.interp.last_sample_index;

        // Turning interpolation on needs the neighbour sample read
        let fetch = self.sample.is_none()
            || (!self.constant && last != Some(index))
            || (!self.constant && req.interpolate && !self.interp.interpolating)
            || req.force_update;

        // Constant or non-interpolating schemas have nothing to re-cook
        let fresh = self.constant || !req.interpolate;
        let mut active = fetch || !fresh;

        let mut time_offset = self.interp.current_time_offset;
        let mut time_interval = self.interp.current_time_interval;
        if active && req.interpolate {
            let prev_offset = time_offset;
            time_offset = bracket.offset;
            time_interval = bracket.interval as f32;
            if last == Some(index) && prev_offset == time_offset && !req.force_update {
                active = false;
            }
        }

        let read = fetch.then(|| ReadRequest {
            index,
            next_index: (req.interpolate && !self.constant && bracket.next_index != index)
                .then_some(bracket.next_index),
        });
        let cook = active.then(|| CookContext {
            index,
            time_offset,
            time_interval,
            interpolate: req.interpolate,
            force_sync: req.force_sync,
            vertex_motion_scale: req.vertex_motion_scale,
        });

        let phase = if fetch {
            CyclePhase::Fetching
        } else if active {
            CyclePhase::Reusing
        } else if fresh {
            CyclePhase::Fresh
        } else {
            CyclePhase::Skipped
        };

        CyclePlan {
            bracket,
            allocate: self.sample.is_none(),
            read,
            cook,
            time_offset,
            time_interval,
            inline: req.force_sync || !req.async_load,
            phase,
        }
    }

    /// Bring the sample to `time`.
    ///
    /// Inline stages run before this returns and their errors surface here.
    /// Deferred stages are submitted to the scheduler; their errors surface
    /// from [`Schema::wait_async`].
    ///
    /// Auxiliary properties are refreshed for the resolved index even when a
    /// stage fails. A property read failure is returned after any async job
    /// was already submitted, so `wait_async` must still be called.
    #[tracing::instrument(level = "trace", skip(self), fields(schema = %self.reader.name()))]
    pub fn update_sample(&mut self, time: Chrono) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let req = self.request(time);
        let plan = self.plan(&req);

        if self.async_load.is_outstanding() {
            if plan.has_work() {
                tracing::warn!(
                    "schema '{}': update at t={} before the previous async job was waited on",
                    self.name(),
                    time
                );
                return Err(Error::usage(format!(
                    "schema '{}' updated again before wait_async()",
                    self.name()
                )));
            }
        } else {
            self.async_load.reset();
        }

        if plan.has_work() {
            if let Err(e) = self.execute(&plan) {
                // Properties still follow the requested index
                if let Err(prop_err) = self.properties.update_all(plan.stored_index()) {
                    tracing::debug!("schema '{}': {}", self.name(), prop_err);
                }
                return Err(e);
            }
        }

        self.data_updated = plan.cook.is_some();
        self.interp = InterpolationState {
            last_sample_index: Some(plan.stored_index()),
            current_time_offset: plan.time_offset,
            current_time_interval: plan.time_interval,
            sample_index_changed: plan.read.is_some(),
            interpolating: req.interpolate,
        };
        self.force_update = false;
        self.force_sync = false;

        self.properties.update_all(plan.stored_index())
    }

    /// Block until the submitted job (if any) finished.
    ///
    /// A failed job leaves the schema stale: the next update re-fetches.
    pub fn wait_async(&mut self) -> Result<()> {
        self.async_load.wait().inspect_err(|e| {
            tracing::debug!("schema '{}': async job failed: {}", self.reader.name(), e);
            self.mark_stale();
        })
    }

    fn execute(&mut self, plan: &CyclePlan) -> Result<()> {
        let sample = match &self.sample {
            Some(sample) => Arc::clone(sample),
            None => {
                let sample = Arc::new(Mutex::new(Sample::new(self.cooker.new_payload())));
                self.sample = Some(Arc::clone(&sample));
                sample
            }
        };
        if plan.cook.is_some_and(|c| c.force_sync) {
            sample.lock().mark_force_sync();
        }

        match plan.phase {
            CyclePhase::Fetching => tracing::debug!(
                "schema '{}': fetch index {} (offset {})",
                self.name(),
                plan.stored_index(),
                plan.time_offset
            ),
            _ => tracing::trace!(
                "schema '{}': re-cook index {} (offset {})",
                self.name(),
                plan.stored_index(),
                plan.time_offset
            ),
        }

        let mut target = FetchTarget {
            cooker: Arc::clone(&self.cooker),
            reader: Arc::clone(&self.reader),
            visibility: self.visibility.clone(),
            sample,
        };

        if plan.inline {
            return run_stages(&mut target, plan.read.as_ref(), plan.cook.as_ref())
                .inspect_err(|_| self.mark_stale());
        }

        if let Some(read) = plan.read {
            self.async_load.set_read(read);
        }
        if let Some(cook) = plan.cook {
            self.async_load.set_cook(cook);
        }
        if self.async_load.ready() {
            self.async_load
                .submit(self.context.scheduler(), Box::new(target))?;
        }
        Ok(())
    }

    fn mark_stale(&mut self) {
        self.data_updated = false;
        self.interp.last_sample_index = None;
        self.force_update = true;
    }
}

impl<C: SampleCooker> std::fmt::Debug for Schema<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name())
            .field("num_samples", &self.num_samples)
            .field("constant", &self.constant)
            .field("interp", &self.interp)
            .field("job", &self.async_load.state())
            .finish_non_exhaustive()
    }
}

/// Object-safe view of a schema, for driving heterogeneous schemas together.
pub trait StreamedSchema: Send {
    /// Schema name.
    fn name(&self) -> &str;
    /// Bring the sample to `time`.
    fn update_sample(&mut self, time: Chrono) -> Result<()>;
    /// Block until the submitted job finished.
    fn wait_async(&mut self) -> Result<()>;
    /// Re-fetch on the next update.
    fn mark_force_update(&mut self);
    /// Run the next update inline.
    fn mark_force_sync(&mut self);
    /// Data never changes.
    fn is_constant(&self) -> bool;
    /// The last update produced new data.
    fn is_data_updated(&self) -> bool;
    /// Time span of stored samples.
    fn time_range(&self) -> (Chrono, Chrono);
    /// Concrete schema, for typed access to the sample.
    fn as_any(&self) -> &dyn Any;
}

impl<C: SampleCooker> StreamedSchema for Schema<C> {
    fn name(&self) -> &str {
        Schema::name(self)
    }

    fn update_sample(&mut self, time: Chrono) -> Result<()> {
        Schema::update_sample(self, time)
    }

    fn wait_async(&mut self) -> Result<()> {
        Schema::wait_async(self)
    }

    fn mark_force_update(&mut self) {
        Schema::mark_force_update(self)
    }

    fn mark_force_sync(&mut self) {
        Schema::mark_force_sync(self)
    }

    fn is_constant(&self) -> bool {
        Schema::is_constant(self)
    }

    fn is_data_updated(&self) -> bool {
        Schema::is_data_updated(self)
    }

    fn time_range(&self) -> (Chrono, Chrono) {
        Schema::time_range(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
