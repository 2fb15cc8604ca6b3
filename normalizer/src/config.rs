use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Queue capacity must be non-zero")]
    ZeroQueueCapacity,

    #[error("Store retry attempts must be at least 1")]
    NoRetryAttempts,

    #[error("Maximum deliveries must be at least 1")]
    NoDeliveries,

    #[error("Column separator cannot be empty")]
    EmptySeparator,
}

/// Normalization worker-pool configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Number of concurrent workers draining the delivery queue
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Delivery queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Deliveries per record before it is quarantined instead of re-queued
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
    /// Separator joining nested keys into flattened column names
    #[serde(default = "default_column_separator")]
    pub column_separator: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            retry: RetryConfig::default(),
            max_deliveries: default_max_deliveries(),
            column_separator: default_column_separator(),
        }
    }
}

impl Config {
    /// Validates the normalizer configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::NoWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::ZeroQueueCapacity);
        }
        if self.retry.max_attempts == 0 {
            return Err(ValidationError::NoRetryAttempts);
        }
        if self.max_deliveries == 0 {
            return Err(ValidationError::NoDeliveries);
        }
        if self.column_separator.is_empty() {
            return Err(ValidationError::EmptySeparator);
        }
        Ok(())
    }
}

/// Bounds on retries of transient store failures within one delivery.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step between attempts
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Delay before a re-queued delivery becomes visible again
    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: default_retry_attempts(),
            backoff_ms: default_backoff_ms(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_column_separator() -> String {
    "__".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_redelivery_delay_ms() -> u64 {
    1000
}
