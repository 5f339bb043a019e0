//! Bounded worker pool for asynchronously dispatched tasks.
//!
//! Jobs run on the blocking pool of a dedicated tokio runtime, capped at the
//! pool size; excess jobs queue. Each job owns the sending half of a
//! zero-capacity crossbeam channel and drops it when it ends, even by
//! unwinding or by being discarded unrun at shutdown. Receivers observe the
//! disconnect, so any number of threads can wait on one [`Completion`].

use crossbeam_channel::{Receiver, TryRecvError};
use tokio::runtime::{Builder, Runtime};

use crate::error::Result;
use crate::llog_debug;

/// Waitable signal that a job has ended.
#[derive(Debug, Clone)]
pub struct Completion {
    rx: Receiver<()>,
}

impl Completion {
    pub fn is_finished(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the job has ended.
    pub fn wait(&self) {
        // Nothing is ever sent; recv only returns once the sender is gone.
        let _ = self.rx.recv();
    }
}

pub struct WorkerPool {
    runtime: Option<Runtime>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` jobs at once.
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("lineage-worker")
            .build()?;
        llog_debug!("WorkerPool::new size={}", size);
        Ok(Self {
            runtime: Some(runtime),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `job` and return its completion signal.
    pub fn execute<F>(&self, job: F) -> Completion
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        if let Some(runtime) = &self.runtime {
            runtime.spawn_blocking(move || {
                let _signal = tx;
                job();
            });
        }
        Completion { rx }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // The last scheduler reference may be released on a worker thread,
        // where a blocking shutdown is not allowed.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
