//! Stream player.
//!
//! Drives a set of schemas through time. The streaming window
//! (`start_time`..`end_time`) is clamped to the media range covered by the
//! schemas, and `current_time` is relative to the window start.
//!
//! Per frame: [`StreamPlayer::update`] starts every schema's update (which
//! may queue async work), [`StreamPlayer::update_end`] waits for all of them.

use std::sync::Arc;

use crate::core::StreamConfig;
use crate::schema::{Context, StreamedSchema};
use crate::util::{Chrono, Result};

/// Plays a set of schemas over a time window.
pub struct StreamPlayer {
    context: Arc<Context>,
    schemas: Vec<Box<dyn StreamedSchema>>,
    media_start: Chrono,
    media_end: Chrono,
    start_time: Chrono,
    end_time: Chrono,
    current_time: Chrono,
    last_update_time: Option<Chrono>,
    force_update: bool,
    update_started: bool,
}

impl StreamPlayer {
    /// Create an empty player sharing `context` with its schemas.
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            schemas: Vec::new(),
            media_start: 0.0,
            media_end: 0.0,
            start_time: 0.0,
            end_time: 0.0,
            current_time: 0.0,
            last_update_time: None,
            force_update: true,
            update_started: false,
        }
    }

    /// Add a schema; the media range and window grow to cover it.
    pub fn add_schema(&mut self, schema: Box<dyn StreamedSchema>) {
        let (start, end) = schema.time_range();
        if self.schemas.is_empty() {
            self.media_start = start;
            self.media_end = end;
        } else {
            self.media_start = self.media_start.min(start);
            self.media_end = self.media_end.max(end);
        }
        self.schemas.push(schema);
        self.start_time = self.media_start;
        self.end_time = self.media_end;
        self.clamp_current_time();
        self.force_update = true;
    }

    /// Shared context.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Number of schemas.
    pub fn num_schemas(&self) -> usize {
        self.schemas.len()
    }

    /// Schema by index.
    pub fn schema(&self, index: usize) -> Option<&dyn StreamedSchema> {
        self.schemas.get(index).map(|s| s.as_ref())
    }

    /// Schema by index, downcast to its concrete type.
    pub fn schema_as<T: 'static>(&self, index: usize) -> Option<&T> {
        self.schemas.get(index)?.as_any().downcast_ref::<T>()
    }

    /// Iterate schemas.
    pub fn schemas(&self) -> impl Iterator<Item = &dyn StreamedSchema> {
        self.schemas.iter().map(|s| s.as_ref())
    }

    /// Start of the media range.
    pub fn media_start_time(&self) -> Chrono {
        self.media_start
    }

    /// End of the media range.
    pub fn media_end_time(&self) -> Chrono {
        self.media_end
    }

    /// Length of the media range.
    pub fn media_duration(&self) -> Chrono {
        self.media_end - self.media_start
    }

    /// Start of the streaming window.
    pub fn start_time(&self) -> Chrono {
        self.start_time
    }

    /// Set the window start, clamped to the media range.
    pub fn set_start_time(&mut self, time: Chrono) {
        self.start_time = clamp(time, self.media_start, self.media_end);
        self.end_time = clamp(self.end_time, self.start_time, self.media_end);
        self.clamp_current_time();
    }

    /// End of the streaming window.
    pub fn end_time(&self) -> Chrono {
        self.end_time
    }

    /// Set the window end, clamped between the window start and media end.
    pub fn set_end_time(&mut self, time: Chrono) {
        self.end_time = clamp(time, self.start_time, self.media_end);
        self.clamp_current_time();
    }

    /// Length of the streaming window.
    pub fn duration(&self) -> Chrono {
        self.end_time - self.start_time
    }

    /// Time relative to the window start.
    pub fn current_time(&self) -> Chrono {
        self.current_time
    }

    /// Set the time relative to the window start, clamped to `[0, duration]`.
    pub fn set_current_time(&mut self, time: Chrono) {
        self.current_time = clamp(time, 0.0, self.duration());
    }

    /// Toggle async loading for subsequent updates.
    pub fn set_async_load(&self, async_load: bool) {
        self.context.update_config(|c| c.async_load = async_load);
    }

    /// Set the velocity multiplier for subsequent updates.
    pub fn set_vertex_motion_scale(&self, scale: f32) {
        self.context.update_config(|c| c.vertex_motion_scale = scale);
    }

    /// Current configuration.
    pub fn config(&self) -> StreamConfig {
        self.context.config()
    }

    /// Run the next `update` even if the time is unchanged.
    pub fn mark_force_update(&mut self) {
        self.force_update = true;
    }

    /// Start updating every schema if the time changed or an update is forced.
    ///
    /// Returns whether an update was started. Every schema is attempted;
    /// the first failure is returned and the same time is retried by the
    /// next `update`.
    pub fn update(&mut self) -> Result<bool> {
        self.clamp_current_time();
        if self.last_update_time == Some(self.current_time) && !self.force_update {
            return Ok(false);
        }

        let time = self.start_time + self.current_time;
        let _span = tracing::info_span!("stream_update", time).entered();
        let mut first_err = None;
        for schema in &mut self.schemas {
            if let Err(e) = schema.update_sample(time) {
                tracing::warn!("schema '{}' failed to update at t={}: {}", schema.name(), time, e);
                first_err.get_or_insert(e);
            }
        }

        self.update_started = true;
        match first_err {
            Some(e) => {
                self.force_update = true;
                Err(e)
            }
            None => {
                self.last_update_time = Some(self.current_time);
                self.force_update = false;
                Ok(true)
            }
        }
    }

    /// Wait for every schema started by `update`.
    ///
    /// If the time moved since the last update and none was started, the
    /// update runs first.
    pub fn update_end(&mut self) -> Result<()> {
        let mut first_err = None;
        self.clamp_current_time();
        if !self.update_started && self.last_update_time != Some(self.current_time) {
            if let Err(e) = self.update() {
                first_err = Some(e);
            }
        }
        if let Err(e) = self.wait_started() {
            first_err.get_or_insert(e);
        }
        first_err.map_or(Ok(()), Err)
    }

    fn wait_started(&mut self) -> Result<()> {
        if !self.update_started {
            return Ok(());
        }
        self.update_started = false;

        let _span = tracing::info_span!("stream_wait").entered();
        let mut first_err = None;
        for schema in &mut self.schemas {
            if let Err(e) = schema.wait_async() {
                tracing::warn!("schema '{}' failed to load: {}", schema.name(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => {
                // Retry this time on the next update
                self.last_update_time = None;
                self.force_update = true;
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Update to `time` and wait for the result.
    pub fn update_immediately(&mut self, time: Chrono) -> Result<()> {
        self.set_current_time(time);
        let started = self.update();
        // Always wait, even when some schema failed to start
        let finished = self.update_end();
        started?;
        finished
    }

    /// Number of schemas whose last update produced new data.
    pub fn num_updated(&self) -> usize {
        self.schemas.iter().filter(|s| s.is_data_updated()).count()
    }

    fn clamp_current_time(&mut self) {
        self.current_time = clamp(self.current_time, 0.0, self.duration());
    }
}

/// Clamp without panicking on an inverted range.
fn clamp(value: Chrono, lo: Chrono, hi: Chrono) -> Chrono {
    value.max(lo).min(hi.max(lo))
}

impl Drop for StreamPlayer {
    fn drop(&mut self) {
        let _ = self.wait_started();
    }
}

impl std::fmt::Debug for StreamPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPlayer")
            .field("schemas", &self.schemas.len())
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("current_time", &self.current_time)
            .finish_non_exhaustive()
    }
}
