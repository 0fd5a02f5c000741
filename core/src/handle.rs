use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use log::{debug, error};

use crate::{error::TaskError, outcome::Outcome};

/// Lifecycle of a single scheduled task.
enum TaskState<T> {
    Pending,
    Running,
    Finished(Result<T, TaskError>),
    Cancelled,
    /// Pool dropped the task without running it.
    Abandoned,
}

impl<T> TaskState<T> {
    fn is_done(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

/// State shared between a handle and the job that resolves it.
struct Slot<T> {
    id: usize,
    state: Mutex<TaskState<T>>,
    changed: Condvar,
}

impl<T> Slot<T> {
    // Every transition leaves the state consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, TaskState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: &mut MutexGuard<'_, TaskState<T>>, next: TaskState<T>) {
        **state = next;
        self.changed.notify_all();
    }
}

/// Creates a pending task: the handle given to the caller and the runnable
/// given to the worker pool.
pub(crate) fn task<T, F>(id: usize, f: F) -> (FutureHandle<T>, Runnable<T, F>)
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let slot = Arc::new(Slot {
        id,
        state: Mutex::new(TaskState::Pending),
        changed: Condvar::new(),
    });
    (
        FutureHandle { slot: slot.clone() },
        Runnable { f: Some(f), slot },
    )
}

/// Worker side of a task. Dropping it without calling `run` marks the task
/// as abandoned so that nobody waits on it forever.
pub(crate) struct Runnable<T, F> {
    f: Option<F>,
    slot: Arc<Slot<T>>,
}

impl<T, F> Runnable<T, F>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    pub(crate) fn run(mut self) {
        let f = match self.f.take() {
            Some(f) => f,
            None => return,
        };

        {
            let mut state = self.slot.lock();
            if !matches!(*state, TaskState::Pending) {
                debug!("task #{} skipped, already resolved before start", self.slot.id);
                return;
            }
            self.slot.set(&mut state, TaskState::Running);
        }

        let result = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TaskError::Failed(e)),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!("task #{} panicked: {}", self.slot.id, msg);
                Err(TaskError::Panicked(msg))
            }
        };

        let mut state = self.slot.lock();
        if matches!(*state, TaskState::Running) {
            self.slot.set(&mut state, TaskState::Finished(result));
        } else {
            // cancelled while running, result is discarded
            debug!("task #{} finished after cancellation", self.slot.id);
        }
    }
}

impl<T, F> Drop for Runnable<T, F> {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        if !state.is_done() {
            debug!("task #{} abandoned", self.slot.id);
            self.slot.set(&mut state, TaskState::Abandoned);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to one independently scheduled unit of work.
///
/// Handles are created by [`crate::pool::WorkerPool::submit`] or by running a
/// batch; the failure of one task is only visible through its own handle.
pub struct FutureHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> FutureHandle<T> {
    /// Task id, unique within the pool that scheduled it.
    pub fn id(&self) -> usize {
        self.slot.id
    }

    /// Indicates if the task finished, failed, was cancelled or abandoned.
    pub fn is_done(&self) -> bool {
        self.slot.lock().is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.lock(), TaskState::Cancelled)
    }

    /// Indicates if the pool discarded the task before it could run.
    pub fn is_abandoned(&self) -> bool {
        matches!(*self.slot.lock(), TaskState::Abandoned)
    }

    /// Requests cancellation. Returns false if the task already completed.
    ///
    /// A task that has not started yet never runs. A running task keeps
    /// running, its result is thrown away once it returns.
    pub fn cancel(&self) -> bool {
        let mut state = self.slot.lock();
        if state.is_done() {
            return false;
        }
        debug!("cancelling task #{}", self.slot.id);
        self.slot.set(&mut state, TaskState::Cancelled);
        true
    }

    /// Blocks until the task is done.
    pub fn wait(&self) {
        let mut state = self.slot.lock();
        while !state.is_done() {
            state = self
                .slot
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the task is done or `deadline` passes.
    /// Returns whether the task is done.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.slot.lock();
        while !state.is_done() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .slot
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Blocks until the task is done and returns its value or its error.
    pub fn get(self) -> Result<T, TaskError> {
        self.wait();
        self.take()
    }

    /// Like [`FutureHandle::get`] but gives the handle back when the task is
    /// still not done after `timeout`.
    pub fn get_timeout(self, timeout: Duration) -> Result<Result<T, TaskError>, Self> {
        let done = match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        };
        if done {
            Ok(self.take())
        } else {
            Err(self)
        }
    }

    /// Resolves the handle into an outcome, blocking until the task is done.
    pub fn outcome(self) -> Outcome<T, TaskError> {
        Outcome::attempt_value(|| self.get())
    }

    fn take(self) -> Result<T, TaskError> {
        let mut state = self.slot.lock();
        match std::mem::replace(&mut *state, TaskState::Abandoned) {
            TaskState::Finished(result) => result,
            TaskState::Cancelled => {
                *state = TaskState::Cancelled;
                Err(TaskError::Cancelled)
            }
            _ => Err(TaskError::Abandoned),
        }
    }
}

impl<T> std::fmt::Debug for FutureHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.slot.lock() {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Finished(Ok(_)) => "succeeded",
            TaskState::Finished(Err(_)) => "failed",
            TaskState::Cancelled => "cancelled",
            TaskState::Abandoned => "abandoned",
        };
        f.debug_struct("FutureHandle")
            .field("id", &self.slot.id)
            .field("state", &state)
            .finish()
    }
}
