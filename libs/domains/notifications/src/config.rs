//! Delivery configuration.
//!
//! Values are fixed per deployment and read from the environment:
//!
//! | Variable                          | Default |
//! |-----------------------------------|---------|
//! | `NOTIFY_RATE_LIMIT_MAX_REQUESTS`  | 10      |
//! | `NOTIFY_RATE_LIMIT_WINDOW_MS`     | 60000   |
//! | `NOTIFY_CHUNK_SIZE`               | 3       |
//! | `NOTIFY_CHUNK_DELAY_MS`           | 60000   |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{NotificationError, NotificationResult};

pub const DEFAULT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_CHUNK_SIZE: usize = 3;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 60_000;

/// Parse an environment variable, falling back to `default` when unset.
fn env_parse<T: FromStr>(key: &str, default: T) -> NotificationResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            NotificationError::Config(format!("failed to parse {key}='{raw}'"))
        }),
        Err(_) => Ok(default),
    }
}

/// Sliding-window bounds for outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Calls admitted per window, greater than zero.
    pub max_requests: u32,
    /// Window length, greater than zero.
    pub window: Duration,
}

impl RateLimiterConfig {
    pub fn new(max_requests: u32, window: Duration) -> NotificationResult<Self> {
        if max_requests == 0 {
            return Err(NotificationError::Config(
                "rate limiter max_requests must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(NotificationError::Config(
                "rate limiter window must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    pub fn from_env() -> NotificationResult<Self> {
        let max_requests = env_parse("NOTIFY_RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS)?;
        let window_ms = env_parse("NOTIFY_RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)?;
        Self::new(max_requests, Duration::from_millis(window_ms))
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
        }
    }
}

/// Chunking used by the throttled batch strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Notifications per chunk, greater than zero.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub chunk_delay: Duration,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_delay: Duration) -> NotificationResult<Self> {
        if chunk_size == 0 {
            return Err(NotificationError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_delay,
        })
    }

    pub fn from_env() -> NotificationResult<Self> {
        let chunk_size = env_parse("NOTIFY_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let delay_ms = env_parse("NOTIFY_CHUNK_DELAY_MS", DEFAULT_CHUNK_DELAY_MS)?;
        Self::new(chunk_size, Duration::from_millis(delay_ms))
    }

    /// Number of chunks a batch of `len` notifications is split into.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: Duration::from_millis(DEFAULT_CHUNK_DELAY_MS),
        }
    }
}

/// Combined configuration for the delivery strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Sliding window for single sends on throttled channels.
    pub rate_limiter: RateLimiterConfig,
    /// Chunk size and pause for throttled batches.
    pub chunking: ChunkingConfig,
}

impl DeliveryConfig {
    pub fn from_env() -> NotificationResult<Self> {
        Ok(Self {
            rate_limiter: RateLimiterConfig::from_env()?,
            chunking: ChunkingConfig::from_env()?,
        })
    }

    /// Set the rate limiter bounds
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiterConfig) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Set the chunking used for throttled batches
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }
}
