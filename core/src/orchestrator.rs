use std::{
    ops::{Deref, DerefMut},
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    error::{OrchestrationError, TaskError},
    handle::FutureHandle,
    outcome::Outcome,
    pool::WorkerPool,
};

type Task<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send + 'static>;

/// Unit of a batch timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Converts `amount` of this unit into a Duration, saturating on overflow.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(60 * 60)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(24 * 60 * 60)),
        }
    }
}

/// Runs a batch of independent computations on a worker pool.
///
/// Tasks are registered with [`Orchestrator::add`] and run together by
/// [`Orchestrator::execute`]. Registration happens on the owning thread
/// before execution, the borrow taken by `execute` rules out adding tasks
/// while a batch runs.
///
/// ```rust
/// use tryout_core::orchestrator::Orchestrator;
///
/// let mut orchestrator = Orchestrator::create();
/// let handles = orchestrator
///     .add(|| Ok(1 + 2))
///     .add(|| Ok(3 * 3))
///     .execute()
///     .get()
///     .unwrap();
///
/// let values: Vec<i32> = handles.into_iter().map(|h| h.get().unwrap()).collect();
/// assert_eq!(values, vec![3, 9]);
/// orchestrator.close();
/// ```
pub struct Orchestrator<T> {
    pool: WorkerPool,

    /// Registered tasks, taken by the next batch.
    tasks: Vec<Task<T>>,
}

impl<T> Orchestrator<T>
where
    T: Send + 'static,
{
    /// Creates orchestrator backed by a new cached pool.
    pub fn create() -> Self {
        Self::with_pool(WorkerPool::cached())
    }

    /// Creates orchestrator on a caller supplied pool. The pool may be shared
    /// with other orchestrators, closing any of them shuts it down for all.
    pub fn with_pool(pool: WorkerPool) -> Self {
        Self {
            pool,
            tasks: vec![],
        }
    }

    /// Registers new task.
    pub fn add<F>(&mut self, task: F) -> &mut Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.tasks.push(Box::new(task));
        self
    }

    /// Number of tasks waiting for the next batch.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Prepares a batch of all registered tasks. Nothing runs until
    /// [`Batch::get`], [`Batch::on_complete`] or [`Batch::outcomes`] is called.
    pub fn execute(&mut self) -> Batch<'_, T> {
        Batch {
            orchestrator: self,
            timeout: None,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Shuts the worker pool down. Calling it again is a no-op.
    pub fn close(&self) {
        self.pool.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Wraps orchestrator in a guard that closes it when dropped.
    pub fn scoped(self) -> Scoped<T> {
        Scoped { orchestrator: self }
    }

    /// Runs `f` and closes the pool afterwards, also when `f` panics.
    pub fn scope<R, F>(self, f: F) -> R
    where
        F: FnOnce(&mut Orchestrator<T>) -> R,
    {
        let mut guard = self.scoped();
        f(&mut guard)
    }
}

/// Orchestrator that closes its pool on every exit path of the scope owning it.
pub struct Scoped<T> {
    orchestrator: Orchestrator<T>,
}

impl<T> Deref for Scoped<T> {
    type Target = Orchestrator<T>;

    fn deref(&self) -> &Self::Target {
        &self.orchestrator
    }
}

impl<T> DerefMut for Scoped<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.orchestrator
    }
}

impl<T> Drop for Scoped<T> {
    fn drop(&mut self) {
        debug!("leaving orchestrator scope");
        self.orchestrator.pool.shutdown();
    }
}

/// Handle for manual pool shutdown, returned by [`Batch::on_complete`].
#[derive(Debug, Clone)]
pub struct CloseHandle {
    pool: WorkerPool,
}

impl CloseHandle {
    /// Shuts the pool down. Calling it again is a no-op.
    pub fn close(&self) {
        self.pool.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_shutdown()
    }
}

/// One execution of the tasks registered on an orchestrator.
pub struct Batch<'a, T> {
    orchestrator: &'a mut Orchestrator<T>,
    timeout: Option<Duration>,
}

impl<'a, T> Batch<'a, T>
where
    T: Send + 'static,
{
    /// Bounds total wait time of the batch. Tasks still running when the
    /// bound passes are cancelled.
    pub fn with_timeout(self, amount: u64, unit: TimeUnit) -> Self {
        self.with_timeout_duration(unit.to_duration(amount))
    }

    pub fn with_timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs the batch and passes its handles to `callback`.
    ///
    /// Failing tasks do not fail the batch, their errors surface when their
    /// handle is resolved. Scheduling rejection and interruption are returned
    /// as errors and `callback` is not called.
    pub fn on_complete<F>(self, callback: F) -> Result<CloseHandle, OrchestrationError>
    where
        F: FnOnce(Outcome<Vec<FutureHandle<T>>, OrchestrationError>),
    {
        let pool = self.orchestrator.pool.clone();
        let handles = self.run()?;
        callback(Outcome::attempt_value(|| Ok(handles)));
        Ok(CloseHandle { pool })
    }

    /// Runs the batch and returns handles in registration order.
    pub fn get(self) -> Result<Vec<FutureHandle<T>>, OrchestrationError> {
        self.run()
    }

    /// Runs the batch and resolves every handle, in registration order.
    pub fn outcomes(self) -> Result<Vec<Outcome<T, TaskError>>, OrchestrationError> {
        Ok(self.run()?.into_iter().map(FutureHandle::outcome).collect())
    }

    fn run(self) -> Result<Vec<FutureHandle<T>>, OrchestrationError> {
        let Batch {
            orchestrator,
            timeout,
        } = self;
        let tasks = std::mem::take(&mut orchestrator.tasks);
        let pool = &orchestrator.pool;
        let started = Instant::now();
        // A bound too large to represent is the same as no bound.
        let deadline = timeout.and_then(|t| started.checked_add(t));

        debug!(
            "running batch of {} tasks, timeout: {:?}",
            tasks.len(),
            timeout
        );

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            match pool.submit(task) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    cancel_pending(&handles);
                    return Err(e);
                }
            }
        }

        for (idx, handle) in handles.iter().enumerate() {
            let done = match deadline {
                Some(deadline) => handle.wait_until(deadline),
                None => {
                    handle.wait();
                    true
                }
            };

            if !done {
                let cancelled = cancel_pending(&handles[idx..]);
                warn!(
                    "batch timed out after {:?}, cancelled {} tasks",
                    started.elapsed(),
                    cancelled
                );
                break;
            }

            if handle.is_abandoned() {
                cancel_pending(&handles[idx..]);
                return Err(OrchestrationError::Interrupted(format!(
                    "task #{} was discarded by the worker pool",
                    handle.id()
                )));
            }
        }

        debug!("batch finished in {:?}", started.elapsed());
        Ok(handles)
    }
}

/// Cancels every handle that is not done yet, returns how many were cancelled.
fn cancel_pending<T>(handles: &[FutureHandle<T>]) -> usize {
    handles.iter().filter(|h| h.cancel()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_to_duration() {
        assert_eq!(TimeUnit::Nanoseconds.to_duration(5), Duration::from_nanos(5));
        assert_eq!(TimeUnit::Milliseconds.to_duration(1), Duration::from_millis(1));
        assert_eq!(TimeUnit::Minutes.to_duration(2), Duration::from_secs(120));
        assert_eq!(TimeUnit::Days.to_duration(1), Duration::from_secs(86_400));
        assert_eq!(
            TimeUnit::Days.to_duration(u64::MAX),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_execute_takes_registered_tasks() {
        let mut orchestrator = Orchestrator::create();
        orchestrator.add(|| Ok(1)).add(|| Ok(2));
        assert_eq!(orchestrator.len(), 2);

        let handles = orchestrator.execute().get().unwrap();
        assert_eq!(handles.len(), 2);
        assert!(orchestrator.is_empty());

        let handles = orchestrator.execute().get().unwrap();
        assert!(handles.is_empty());
        orchestrator.close();
    }

    #[test]
    fn test_scope_closes_pool() {
        let pool = WorkerPool::cached();
        let value = Orchestrator::with_pool(pool.clone()).scope(|orchestrator| {
            orchestrator.add(|| Ok(7));
            orchestrator.execute().get().unwrap().remove(0).get().unwrap()
        });
        assert_eq!(value, 7);
        assert!(pool.is_shutdown());
    }
}
