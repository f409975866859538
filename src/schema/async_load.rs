//! Single-slot, two-stage async job.
//!
//! A schema stages at most one read and one cook per update cycle. Once
//! submitted, the stages run read-then-cook on whatever context the
//! scheduler picks, and the schema observes completion with [`AsyncLoad::wait`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::core::CookContext;
use crate::schema::AsyncScheduler;
use crate::util::{Error, Result};

/// Inputs of the read stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    /// Stored index to read.
    pub index: usize,
    /// Following stored index, read too when blending.
    pub next_index: Option<usize>,
}

/// Lifecycle of the slot's job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobState {
    /// Nothing submitted, or the last job was observed.
    #[default]
    Idle,
    /// Submitted, not started.
    Queued,
    /// A stage is executing.
    Running,
    /// Finished, result not yet observed.
    Done,
}

/// Executes the stages of a job against one sample.
pub trait StageExecutor: Send {
    /// Read raw data and decode it into the sample.
    fn read(&mut self, request: &ReadRequest) -> Result<()>;

    /// Cook the decoded data.
    fn cook(&mut self, ctx: &CookContext) -> Result<()>;
}

/// Run whichever stages are present, read first.
pub(crate) fn run_stages(
    executor: &mut dyn StageExecutor,
    read: Option<&ReadRequest>,
    cook: Option<&CookContext>,
) -> Result<()> {
    if let Some(request) = read {
        executor.read(request)?;
    }
    if let Some(ctx) = cook {
        executor.cook(ctx)?;
    }
    Ok(())
}

struct CompletionState {
    job: JobState,
    result: Option<Result<()>>,
}

/// Completion signal shared between a slot and its submitted task.
pub(crate) struct Completion {
    state: Mutex<CompletionState>,
    done: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            state: Mutex::new(CompletionState {
                job: JobState::Queued,
                result: None,
            }),
            done: Condvar::new(),
        }
    }

    fn job_state(&self) -> JobState {
        self.state.lock().job
    }

    fn start(&self) {
        self.state.lock().job = JobState::Running;
    }

    fn finish(&self, result: Result<()>) {
        let mut state = self.state.lock();
        state.job = JobState::Done;
        state.result = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock();
        while state.job != JobState::Done {
            self.done.wait(&mut state);
        }
        state.result.take().unwrap_or(Ok(()))
    }
}

/// A submitted job, handed to an [`AsyncScheduler`].
pub struct AsyncTask {
    read: Option<ReadRequest>,
    cook: Option<CookContext>,
    executor: Box<dyn StageExecutor>,
    completion: Arc<Completion>,
}

impl AsyncTask {
    /// Execute read then cook, recording the outcome for the waiting slot.
    ///
    /// Stage errors and panics are captured; they surface from `wait()`.
    pub fn run(self) {
        let AsyncTask { read, cook, mut executor, completion } = self;
        completion.start();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_stages(executor.as_mut(), read.as_ref(), cook.as_ref())
        }));
        let result = outcome.unwrap_or_else(|payload| Err(Error::JobPanicked(panic_message(&*payload))));
        if let Err(e) = &result {
            tracing::debug!("async job failed: {}", e);
        }
        completion.finish(result);
    }
}

impl std::fmt::Debug for AsyncTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTask")
            .field("read", &self.read)
            .field("cook", &self.cook)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// The per-schema job slot.
#[derive(Default)]
pub struct AsyncLoad {
    read: Option<ReadRequest>,
    cook: Option<CookContext>,
    completion: Option<Arc<Completion>>,
}

impl AsyncLoad {
    /// Create an idle slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop staged stages and forget the last submitted job.
    pub fn reset(&mut self) {
        self.read = None;
        self.cook = None;
        self.completion = None;
    }

    /// Stage the read.
    pub fn set_read(&mut self, request: ReadRequest) {
        self.read = Some(request);
    }

    /// Stage the cook.
    pub fn set_cook(&mut self, ctx: CookContext) {
        self.cook = Some(ctx);
    }

    /// True iff a stage was staged since the last reset or submit.
    pub fn ready(&self) -> bool {
        self.read.is_some() || self.cook.is_some()
    }

    /// True while a submitted job has not been observed by `wait()`.
    pub fn is_outstanding(&self) -> bool {
        self.completion.is_some()
    }

    /// Current job state.
    pub fn state(&self) -> JobState {
        self.completion
            .as_ref()
            .map_or(JobState::Idle, |c| c.job_state())
    }

    /// Hand the staged stages to `scheduler`. Returns false if nothing was staged.
    pub fn submit(
        &mut self,
        scheduler: &dyn AsyncScheduler,
        executor: Box<dyn StageExecutor>,
    ) -> Result<bool> {
        if !self.ready() {
            return Ok(false);
        }
        if self.is_outstanding() {
            return Err(Error::usage("previous async job has not been waited on"));
        }
        let completion = Arc::new(Completion::new());
        let task = AsyncTask {
            read: self.read.take(),
            cook: self.cook.take(),
            executor,
            completion: Arc::clone(&completion),
        };
        self.completion = Some(completion);
        scheduler.submit(task);
        Ok(true)
    }

    /// Block until the submitted job finished; no-op when idle.
    pub fn wait(&mut self) -> Result<()> {
        match self.completion.take() {
            Some(completion) => completion.wait(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for AsyncLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLoad")
            .field("read", &self.read)
            .field("cook", &self.cook)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InlineScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records stage order into a shared log.
    struct Recorder {
        log: Arc<Mutex<Vec<&'static str>>>,
        fail_cook: bool,
    }

    impl StageExecutor for Recorder {
        fn read(&mut self, _request: &ReadRequest) -> Result<()> {
            self.log.lock().push("read");
            Ok(())
        }

        fn cook(&mut self, _ctx: &CookContext) -> Result<()> {
            self.log.lock().push("cook");
            if self.fail_cook {
                return Err(Error::decode("P", 0, "bad"));
            }
            Ok(())
        }
    }

    /// Holds tasks until told to run them.
    #[derive(Default)]
    struct Deferred {
        tasks: Mutex<Vec<AsyncTask>>,
        submitted: AtomicUsize,
    }

    impl AsyncScheduler for Deferred {
        fn submit(&self, task: AsyncTask) {
            self.submitted.fetch_add(1, Ordering::Relaxed);
            self.tasks.lock().push(task);
        }
    }

    impl Deferred {
        fn run_all(&self) {
            for task in self.tasks.lock().drain(..) {
                task.run();
            }
        }
    }

    fn recorder(fail_cook: bool) -> (Box<Recorder>, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Box::new(Recorder { log: Arc::clone(&log), fail_cook }), log)
    }

    #[test]
    fn test_wait_when_idle() {
        let mut slot = AsyncLoad::new();
        assert!(!slot.ready());
        assert_eq!(slot.state(), JobState::Idle);
        slot.wait().unwrap();
    }

    #[test]
    fn test_read_then_cook_order() {
        let mut slot = AsyncLoad::new();
        slot.set_cook(CookContext::default());
        slot.set_read(ReadRequest { index: 2, next_index: None });
        assert!(slot.ready());

        let sched = Deferred::default();
        let (exec, log) = recorder(false);
        assert!(slot.submit(&sched, exec).unwrap());
        assert_eq!(slot.state(), JobState::Queued);
        assert!(!slot.ready());

        sched.run_all();
        assert_eq!(slot.state(), JobState::Done);
        slot.wait().unwrap();
        assert_eq!(slot.state(), JobState::Idle);
        assert_eq!(*log.lock(), vec!["read", "cook"]);
    }

    #[test]
    fn test_cook_only_job() {
        let mut slot = AsyncLoad::new();
        slot.set_cook(CookContext::default());
        let (exec, log) = recorder(false);
        slot.submit(&InlineScheduler, exec).unwrap();
        slot.wait().unwrap();
        assert_eq!(*log.lock(), vec!["cook"]);
    }

    #[test]
    fn test_nothing_staged_is_not_submitted() {
        let mut slot = AsyncLoad::new();
        let sched = Deferred::default();
        let (exec, _) = recorder(false);
        assert!(!slot.submit(&sched, exec).unwrap());
        assert_eq!(sched.submitted.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_error_surfaces_from_wait() {
        let mut slot = AsyncLoad::new();
        slot.set_read(ReadRequest { index: 0, next_index: None });
        slot.set_cook(CookContext::default());
        let (exec, _) = recorder(true);
        slot.submit(&InlineScheduler, exec).unwrap();
        assert!(slot.wait().unwrap_err().is_decode());
        // observed once; the slot is idle again
        slot.wait().unwrap();
    }

    #[test]
    fn test_second_submit_without_wait_is_rejected() {
        let mut slot = AsyncLoad::new();
        let sched = Deferred::default();
        slot.set_cook(CookContext::default());
        slot.submit(&sched, recorder(false).0).unwrap();
        slot.set_cook(CookContext::default());
        let err = slot.submit(&sched, recorder(false).0).unwrap_err();
        assert!(err.is_usage());
        sched.run_all();
        slot.wait().unwrap();
    }

    #[test]
    fn test_panic_is_captured() {
        struct Boom;
        impl StageExecutor for Boom {
            fn read(&mut self, _: &ReadRequest) -> Result<()> {
                panic!("decoder exploded");
            }
            fn cook(&mut self, _: &CookContext) -> Result<()> {
                Ok(())
            }
        }

        let mut slot = AsyncLoad::new();
        slot.set_read(ReadRequest { index: 0, next_index: None });
        slot.submit(&InlineScheduler, Box::new(Boom)).unwrap();
        let err = slot.wait().unwrap_err();
        assert!(matches!(err, Error::JobPanicked(ref m) if m.contains("exploded")));
    }

    #[test]
    fn test_reset_discards_staged() {
        let mut slot = AsyncLoad::new();
        slot.set_read(ReadRequest { index: 1, next_index: Some(2) });
        slot.reset();
        assert!(!slot.ready());
    }
}
