//! Centralized configuration and builder for docsweep.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - SweepConfig::from_env() reads DOCSWEEP_* env vars over the defaults.
//! - Optional TOML file (FileConfig) merged on top; CLI flags override both.
//!
//! Defaults:
//! - batch_size = 250 (size of one atomic delete-many)
//! - threads_count = 1
//! - empty_queue_timeout_ms = 2000 (shutdown latency vs. polling cost)
//! - max_attempts = 5 (0 means unbounded retry of the enumeration pass)
//! - backoff 500 ms doubling up to 15 s

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::consts::{
    DEFAULT_BACKOFF_INITIAL_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BATCH_SIZE,
    DEFAULT_EMPTY_QUEUE_TIMEOUT_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_THREADS_COUNT,
    ENV_BACKOFF_INITIAL_MS, ENV_BACKOFF_MAX_MS, ENV_BATCH_SIZE, ENV_EMPTY_QUEUE_TIMEOUT_MS,
    ENV_MAX_ATTEMPTS, ENV_THREADS_COUNT,
};
use crate::retry::RetryPolicy;

/// Top-level configuration of one sweep run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepConfig {
    /// Max references per batch (one delete-many per batch).
    /// Env: DOCSWEEP_BATCH_SIZE (default 250)
    pub batch_size: usize,

    /// Number of delete workers.
    /// Env: DOCSWEEP_THREADS_COUNT (default 1)
    pub threads_count: usize,

    /// How long a worker waits on an empty queue before re-checking the completion flag.
    /// Env: DOCSWEEP_EMPTY_QUEUE_TIMEOUT_MS (default 2000)
    pub empty_queue_timeout_ms: u64,

    /// Max enumeration passes; 0 = retry forever.
    /// Env: DOCSWEEP_MAX_ATTEMPTS (default 5)
    pub max_attempts: u32,

    /// Delay before the second pass; doubles after each failure.
    /// Env: DOCSWEEP_BACKOFF_INITIAL_MS (default 500)
    pub backoff_initial_ms: u64,

    /// Backoff cap.
    /// Env: DOCSWEEP_BACKOFF_MAX_MS (default 15000)
    pub backoff_max_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            threads_count: DEFAULT_THREADS_COUNT,
            empty_queue_timeout_ms: DEFAULT_EMPTY_QUEUE_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

/// Same knobs as SweepConfig, all optional (TOML file layer).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub batch_size: Option<usize>,
    pub threads_count: Option<usize>,
    pub empty_queue_timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff_initial_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parse TOML config {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
}

impl SweepConfig {
    /// Defaults overridden by DOCSWEEP_* env vars (unparsable values are ignored).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>(ENV_BATCH_SIZE) {
            cfg.batch_size = n;
        }
        if let Some(n) = env_parse::<usize>(ENV_THREADS_COUNT) {
            cfg.threads_count = n;
        }
        if let Some(n) = env_parse::<u64>(ENV_EMPTY_QUEUE_TIMEOUT_MS) {
            cfg.empty_queue_timeout_ms = n;
        }
        if let Some(n) = env_parse::<u32>(ENV_MAX_ATTEMPTS) {
            cfg.max_attempts = n;
        }
        if let Some(n) = env_parse::<u64>(ENV_BACKOFF_INITIAL_MS) {
            cfg.backoff_initial_ms = n;
        }
        if let Some(n) = env_parse::<u64>(ENV_BACKOFF_MAX_MS) {
            cfg.backoff_max_ms = n;
        }

        cfg
    }

    /// Overlay values present in a TOML file.
    pub fn merge_file(mut self, file: &FileConfig) -> Self {
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.threads_count {
            self.threads_count = v;
        }
        if let Some(v) = file.empty_queue_timeout_ms {
            self.empty_queue_timeout_ms = v;
        }
        if let Some(v) = file.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = file.backoff_initial_ms {
            self.backoff_initial_ms = v;
        }
        if let Some(v) = file.backoff_max_ms {
            self.backoff_max_ms = v;
        }
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_threads_count(mut self, n: usize) -> Self {
        self.threads_count = n;
        self
    }

    pub fn with_empty_queue_timeout_ms(mut self, ms: u64) -> Self {
        self.empty_queue_timeout_ms = ms;
        self
    }

    /// 0 = unbounded.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_backoff_ms(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.backoff_initial_ms = initial_ms;
        self.backoff_max_ms = max_ms;
        self
    }

    /// Finish the builder: validated configuration.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be > 0"));
        }
        if self.threads_count == 0 {
            return Err(anyhow!("threads_count must be > 0"));
        }
        if self.empty_queue_timeout_ms == 0 {
            return Err(anyhow!("empty_queue_timeout_ms must be > 0"));
        }
        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(anyhow!(
                "backoff_initial_ms ({}) must not exceed backoff_max_ms ({})",
                self.backoff_initial_ms,
                self.backoff_max_ms
            ));
        }
        Ok(())
    }

    pub fn empty_queue_timeout(&self) -> Duration {
        Duration::from_millis(self.empty_queue_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let max = if self.max_attempts == 0 {
            None
        } else {
            Some(self.max_attempts)
        };
        RetryPolicy::new(
            max,
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

impl fmt::Display for SweepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SweepConfig {{ \
             batch_size: {}, \
             threads_count: {}, \
             empty_queue_timeout_ms: {}, \
             max_attempts: {}, \
             backoff_ms: {}..{} \
             }}",
            self.batch_size,
            self.threads_count,
            self.empty_queue_timeout_ms,
            if self.max_attempts == 0 {
                "unbounded".to_string()
            } else {
                self.max_attempts.to_string()
            },
            self.backoff_initial_ms,
            self.backoff_max_ms,
        )
    }
}
