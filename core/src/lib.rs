//! Outcome container for fallible computations and a batch orchestrator
//! running such computations concurrently on a shared worker pool.

pub mod config;
pub mod error;
pub mod handle;
pub mod memo;
pub mod orchestrator;
pub mod outcome;
pub mod pool;

pub use error::{OrchestrationError, StateError, TaskError};
pub use handle::FutureHandle;
pub use orchestrator::{Batch, CloseHandle, Orchestrator, Scoped, TimeUnit};
pub use outcome::Outcome;
pub use pool::WorkerPool;
