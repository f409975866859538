//! Schedulers that execute submitted async jobs.
//!
//! The schema engine never spawns threads itself; it hands finished
//! [`AsyncTask`]s to an [`AsyncScheduler`].

use std::sync::mpsc::{channel, SendError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::schema::AsyncTask;
use crate::util::{Error, Result};

/// Executes submitted jobs on some execution context.
///
/// Every submitted task must eventually be run, otherwise the schema
/// waiting on it blocks forever.
pub trait AsyncScheduler: Send + Sync {
    /// Queue a task for execution.
    fn submit(&self, task: AsyncTask);
}

/// Runs tasks immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl AsyncScheduler for InlineScheduler {
    fn submit(&self, task: AsyncTask) {
        task.run();
    }
}

/// Runs tasks on a rayon pool.
#[derive(Default)]
pub struct RayonScheduler {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonScheduler {
    /// Use rayon's global pool.
    pub fn global() -> Self {
        Self { pool: None }
    }

    /// Use a dedicated pool with `num_threads` workers.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("abc-stream-{i}"))
            .build()
            .map_err(|e| Error::other(format!("failed to build thread pool: {e}")))?;
        Ok(Self { pool: Some(Arc::new(pool)) })
    }
}

impl AsyncScheduler for RayonScheduler {
    fn submit(&self, task: AsyncTask) {
        match &self.pool {
            Some(pool) => pool.spawn(move || task.run()),
            None => rayon::spawn(move || task.run()),
        }
    }
}

/// Commands sent to the worker thread.
enum WorkerCommand {
    /// Run one task.
    Run(AsyncTask),
    /// Stop the worker thread.
    Stop,
}

/// One dedicated background thread running tasks in submission order.
pub struct WorkerThread {
    tx: Sender<WorkerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawn the worker.
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = channel::<WorkerCommand>();
        let handle = thread::Builder::new()
            .name("abc-stream-worker".to_string())
            .spawn(move || {
                // Stop on explicit command or when every sender is gone
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        WorkerCommand::Run(task) => task.run(),
                        WorkerCommand::Stop => break,
                    }
                }
                tracing::debug!("stream worker stopped");
            })?;
        Ok(Self { tx, handle: Some(handle) })
    }

    /// Stop the worker and wait for it to finish queued tasks.
    pub fn stop(&mut self) {
        let _ = self.tx.send(WorkerCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl AsyncScheduler for WorkerThread {
    fn submit(&self, task: AsyncTask) {
        // A stopped worker still has to complete the task
        if let Err(SendError(WorkerCommand::Run(task))) = self.tx.send(WorkerCommand::Run(task)) {
            tracing::warn!("stream worker is stopped, running job inline");
            task.run();
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CookContext;
    use crate::schema::{AsyncLoad, ReadRequest, StageExecutor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Count(Arc<AtomicUsize>);

    impl StageExecutor for Count {
        fn read(&mut self, _: &ReadRequest) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn cook(&mut self, _: &CookContext) -> Result<()> {
            self.0.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }
    }

    fn run_one(sched: &dyn AsyncScheduler) -> usize {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut slot = AsyncLoad::new();
        slot.set_read(ReadRequest { index: 0, next_index: None });
        slot.set_cook(CookContext::default());
        slot.submit(sched, Box::new(Count(Arc::clone(&hits)))).unwrap();
        slot.wait().unwrap();
        hits.load(Ordering::SeqCst)
    }

    #[test]
    fn test_inline() {
        assert_eq!(run_one(&InlineScheduler), 11);
    }

    #[test]
    fn test_rayon_global() {
        assert_eq!(run_one(&RayonScheduler::global()), 11);
    }

    #[test]
    fn test_rayon_pool() {
        let sched = RayonScheduler::with_threads(2).unwrap();
        assert_eq!(run_one(&sched), 11);
    }

    #[test]
    fn test_worker_thread() {
        let worker = WorkerThread::spawn().unwrap();
        for _ in 0..4 {
            assert_eq!(run_one(&worker), 11);
        }
    }

    #[test]
    fn test_stopped_worker_runs_inline() {
        let mut worker = WorkerThread::spawn().unwrap();
        worker.stop();
        assert_eq!(run_one(&worker), 11);
    }
}
