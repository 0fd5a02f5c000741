#![allow(dead_code)]
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tryout_core::{FutureHandle, Orchestrator, TaskError, WorkerPool};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Expected resolution of a single task handle.
#[derive(Debug)]
pub enum Expect<T> {
    Value(T),
    Failed(&'static str),
    Cancelled,
}

/// Registers tasks on an orchestrator, runs them as one batch and checks
/// every handle against its expectation.
pub struct BatchCaseBuilder<T> {
    name: Option<String>,
    pool: Option<WorkerPool>,
    timeout: Option<Duration>,
    tasks: Vec<Box<dyn FnOnce() -> anyhow::Result<T> + Send + 'static>>,
    expected: Vec<Expect<T>>,
}

impl<T> BatchCaseBuilder<T>
where
    T: Send + PartialEq + std::fmt::Debug + 'static,
{
    pub fn new() -> Self {
        Self {
            name: None,
            pool: None,
            timeout: None,
            tasks: vec![],
            expected: vec![],
        }
    }

    pub fn name<S: ToString>(mut self, name: S) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn task<F>(mut self, task: F, expected: Expect<T>) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.tasks.push(Box::new(task));
        self.expected.push(expected);
        self
    }

    pub fn run(self) -> anyhow::Result<()> {
        init_logger();
        let name = self.name.unwrap_or_default();
        let pool = self.pool.unwrap_or_default();

        let mut orchestrator = Orchestrator::with_pool(pool).scoped();
        for task in self.tasks {
            orchestrator.add(task);
        }

        let batch = orchestrator.execute();
        let batch = match self.timeout {
            Some(timeout) => batch.with_timeout_duration(timeout),
            None => batch,
        };
        let handles = batch.get()?;

        assert_eq!(
            handles.len(),
            self.expected.len(),
            "test case {}: handle count",
            name
        );

        for (idx, (handle, expected)) in handles.into_iter().zip(self.expected).enumerate() {
            check(&name, idx, handle, expected);
        }
        Ok(())
    }
}

fn check<T>(name: &str, idx: usize, handle: FutureHandle<T>, expected: Expect<T>)
where
    T: PartialEq + std::fmt::Debug,
{
    match (handle.get(), expected) {
        (Ok(value), Expect::Value(want)) => {
            assert_eq!(value, want, "test case {}, task {}", name, idx)
        }
        (Err(TaskError::Failed(e)), Expect::Failed(msg)) => {
            assert_eq!(e.to_string(), msg, "test case {}, task {}", name, idx)
        }
        (Err(TaskError::Cancelled), Expect::Cancelled) => {}
        (got, want) => panic!(
            "test case {}, task {}: got {:?}, expected {:?}",
            name, idx, got, want
        ),
    }
}

/// Task sleeping for `duration` and then counting itself as finished.
pub fn sleeper(
    duration: Duration,
    finished: Arc<AtomicUsize>,
) -> impl FnOnce() -> anyhow::Result<u64> + Send + 'static {
    move || {
        thread::sleep(duration);
        finished.fetch_add(1, Ordering::SeqCst);
        Ok(duration.as_millis() as u64)
    }
}
