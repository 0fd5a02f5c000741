use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, warn};

use crate::{
    config::{PoolConfig, PoolKind},
    error::OrchestrationError,
    handle::{self, FutureHandle},
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared thread pool executing submitted tasks.
///
/// Cloning is cheap, every clone refers to the same workers. The pool is
/// released by [`WorkerPool::shutdown`] or once the last clone is dropped.
///
/// ```rust
/// use tryout_core::pool::WorkerPool;
///
/// let pool = WorkerPool::cached();
/// let handle = pool.submit(|| Ok(2 + 2)).unwrap();
///
/// assert_eq!(handle.get().unwrap(), 4);
/// pool.shutdown();
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    shutdown: AtomicBool,

    /// Number of tasks being executed right now.
    active: Arc<AtomicUsize>,

    /// Source of task ids and thread name suffixes.
    submitted: AtomicUsize,

    /// Only fixed pools queue work, cached pools hand it to a new thread.
    queue: Option<JobQueue>,
}

impl WorkerPool {
    /// Creates pool that spawns a new thread for every task.
    pub fn cached() -> Self {
        Self::start(PoolConfig::default(), None)
    }

    /// Creates pool with `threads` workers and room for `queue_capacity`
    /// tasks waiting for a free worker.
    pub fn fixed(threads: usize, queue_capacity: usize) -> Result<Self, OrchestrationError> {
        let config = PoolConfig::builder()
            .fixed(threads, queue_capacity)
            .finalize()?;
        Self::from_config(config)
    }

    pub fn from_config(config: PoolConfig) -> Result<Self, OrchestrationError> {
        config.validate()?;

        let kind = config.kind;
        match kind {
            PoolKind::Cached => Ok(Self::start(config, None)),
            PoolKind::Fixed {
                threads,
                queue_capacity,
            } => {
                let (tx, rx) = crossbeam_channel::bounded(queue_capacity);
                let queue = JobQueue {
                    sender: Mutex::new(Some(tx)),
                    receiver: rx.clone(),
                    capacity: queue_capacity,
                };
                let pool = Self::start(config, Some(queue));

                for n in 0..threads {
                    let name = format!("{}-{}", pool.inner.config.thread_name, n);
                    let jobs = rx.clone();
                    let active = pool.inner.active.clone();
                    thread::Builder::new()
                        .name(name)
                        .spawn(move || worker_loop(jobs, active))
                        .map_err(|e| {
                            pool.shutdown();
                            OrchestrationError::Rejected(format!(
                                "could not spawn worker thread: {}",
                                e
                            ))
                        })?;
                }
                debug!(
                    "started fixed worker pool '{}' with {} threads",
                    pool.inner.config.thread_name, threads
                );
                Ok(pool)
            }
        }
    }

    fn start(config: PoolConfig, queue: Option<JobQueue>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                shutdown: AtomicBool::new(false),
                active: Arc::new(AtomicUsize::new(0)),
                submitted: AtomicUsize::new(0),
                queue,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Schedules `task` and returns a handle to its result.
    ///
    /// Fails with `Rejected` when the pool is shut down, its queue is full,
    /// or a worker thread could not be spawned.
    pub fn submit<T, F>(&self, task: F) -> Result<FutureHandle<T>, OrchestrationError>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let id = self.inner.submitted.fetch_add(1, Ordering::SeqCst);
        let (handle, runnable) = handle::task(id, task);

        // On rejection the job is dropped here, which abandons the handle.
        self.execute(id, Box::new(move || runnable.run()))
            .map_err(|e| {
                warn!("task #{} rejected: {}", id, e);
                e
            })?;

        debug!("task #{} submitted", id);
        Ok(handle)
    }

    fn execute(&self, id: usize, job: Job) -> Result<(), OrchestrationError> {
        if self.is_shutdown() {
            return Err(OrchestrationError::Rejected("pool is shut down".into()));
        }

        match &self.inner.queue {
            Some(queue) => queue.push(job),
            None => {
                let active = self.inner.active.clone();
                thread::Builder::new()
                    .name(format!("{}-{}", self.inner.config.thread_name, id))
                    .spawn(move || {
                        active.fetch_add(1, Ordering::SeqCst);
                        job();
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .map(|_| ())
                    .map_err(|e| {
                        OrchestrationError::Rejected(format!("could not spawn worker thread: {}", e))
                    })
            }
        }
    }

    /// Stops accepting work. Already queued and running tasks still complete.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down worker pool '{}'", self.inner.config.thread_name);

        if let Some(queue) = &self.inner.queue {
            // Workers drain what is left and exit once the sender is gone.
            queue.close();
        }
    }

    /// Shuts down and discards tasks that did not start yet.
    /// Their handles resolve to `TaskError::Abandoned`.
    pub fn shutdown_now(&self) {
        self.shutdown();

        if let Some(queue) = &self.inner.queue {
            let dropped = queue.drain();
            if !dropped.is_empty() {
                warn!(
                    "worker pool '{}' discarded {} queued tasks",
                    self.inner.config.thread_name,
                    dropped.len()
                );
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Number of tasks being executed at the moment.
    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Indicates if both handles refer to the same workers.
    pub fn same_pool(&self, other: &WorkerPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::cached()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.inner.config)
            .field("shutdown", &self.is_shutdown())
            .field("active", &self.active_count())
            .finish()
    }
}

fn worker_loop(jobs: Receiver<Job>, active: Arc<AtomicUsize>) {
    for job in jobs.iter() {
        active.fetch_add(1, Ordering::SeqCst);
        job();
        active.fetch_sub(1, Ordering::SeqCst);
    }
    debug!(
        "worker {} exiting",
        thread::current().name().unwrap_or("<unnamed>")
    );
}

/// Bounded channel feeding the workers of a fixed pool. Dropping the pool
/// drops the sender, which lets idle workers exit.
struct JobQueue {
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    capacity: usize,
}

impl JobQueue {
    fn push(&self, job: Job) -> Result<(), OrchestrationError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender
            .as_ref()
            .ok_or_else(|| OrchestrationError::Rejected("pool is shut down".into()))?;

        sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => OrchestrationError::Rejected(format!(
                "queue is full ({} pending tasks)",
                self.capacity
            )),
            TrySendError::Disconnected(_) => {
                OrchestrationError::Rejected("pool is shut down".into())
            }
        })
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn drain(&self) -> Vec<Job> {
        self.receiver.try_iter().collect()
    }
}
