use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_THREAD_NAME: &str = "tryout-worker";

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

/// How a worker pool executes submitted work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolKind {
    /// Spawns a thread for every task, never saturates.
    #[default]
    Cached,

    /// Fixed number of workers pulling from a bounded queue.
    /// Submissions beyond `queue_capacity` pending tasks are rejected.
    Fixed {
        threads: usize,
        queue_capacity: usize,
    },
}

/// Worker pool configuration. Either built with [`PoolConfig::builder`]
/// or decoded from JSON:
///
/// ```rust
/// use tryout_core::config::{PoolConfig, PoolKind};
///
/// let cfg = PoolConfig::from_json(r#"{"kind":"fixed","threads":2,"queue_capacity":8}"#).unwrap();
/// assert_eq!(cfg.kind, PoolKind::Fixed { threads: 2, queue_capacity: 8 });
/// assert_eq!(cfg.thread_name, "tryout-worker");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(flatten)]
    pub kind: PoolKind,

    /// Prefix for worker thread names, suffixed with the worker index.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            kind: PoolKind::default(),
            thread_name: default_thread_name(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Decodes and validates configuration.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: PoolConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let PoolKind::Fixed {
            threads,
            queue_capacity,
        } = self.kind
        {
            if threads == 0 {
                return Err(ConfigError::Invalid(
                    "fixed pool needs at least one thread".into(),
                ));
            }
            if queue_capacity == 0 {
                return Err(ConfigError::Invalid(
                    "fixed pool queue capacity must be positive".into(),
                ));
            }
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid("thread name must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for PoolConfig struct.
#[derive(Default, Debug)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Switches to a thread-per-task pool.
    pub fn cached(&mut self) -> &mut Self {
        self.config.kind = PoolKind::Cached;
        self
    }

    /// Switches to a pool of `threads` workers with a bounded queue.
    pub fn fixed(&mut self, threads: usize, queue_capacity: usize) -> &mut Self {
        self.config.kind = PoolKind::Fixed {
            threads,
            queue_capacity,
        };
        self
    }

    pub fn thread_name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.config.thread_name = name.into();
        self
    }

    /// Returns built, validated config leaving default at that place.
    pub fn finalize(&mut self) -> Result<PoolConfig, ConfigError> {
        let config = std::mem::take(&mut self.config);
        config.validate()?;
        Ok(config)
    }
}
