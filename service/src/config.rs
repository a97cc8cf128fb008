//! Configuration management for the queue-routing service.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Redis log store configuration.
    pub redis: RedisConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Assignment-log consumer configuration.
    pub consumer: ConsumerConfig,
    /// Queue behavior tuning.
    pub queue: QueueConfig,
}

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Consumer-group worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer group name on the assignment log.
    pub group: String,
    /// This replica's consumer name. Defaults to `consumer-<pid>`.
    pub consumer_name: String,
    /// Maximum entries fetched per poll.
    pub batch_size: usize,
    /// Blocking-read timeout per poll, in milliseconds.
    pub block_ms: u64,
    /// Delay before retrying after a poll failure, in milliseconds.
    pub retry_delay_ms: u64,
}

/// Queue behavior tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default minutes of service per queue position.
    pub average_service_minutes: u32,
    /// Default per-counter backlog cap when the directory sets none.
    pub max_queue_length: usize,
    /// Timeout for each external identity lookup, in milliseconds.
    pub lookup_timeout_ms: u64,
    /// TTL of the counter online marker, in seconds.
    pub presence_ttl_secs: u64,
    /// Capacity of the background effect queue.
    pub effect_queue_capacity: usize,
    /// On-time tolerance around the appointment start, in minutes.
    pub on_time_tolerance_minutes: i64,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parsed("PORT", 8080),
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            },
            consumer: ConsumerConfig {
                group: env::var("CONSUMER_GROUP")
                    .unwrap_or_else(|_| "ticket-processors".to_string()),
                consumer_name: env::var("CONSUMER_NAME")
                    .unwrap_or_else(|_| format!("consumer-{}", std::process::id())),
                batch_size: env_parsed("CONSUMER_BATCH_SIZE", 10),
                block_ms: env_parsed("CONSUMER_BLOCK_MS", 1000),
                retry_delay_ms: env_parsed("CONSUMER_RETRY_DELAY_MS", 5000),
            },
            queue: QueueConfig {
                average_service_minutes: env_parsed("AVERAGE_SERVICE_MINUTES", 15),
                max_queue_length: env_parsed("MAX_QUEUE_LENGTH", 10),
                lookup_timeout_ms: env_parsed("LOOKUP_TIMEOUT_MS", 500),
                presence_ttl_secs: env_parsed("PRESENCE_TTL_SECS", 60),
                effect_queue_capacity: env_parsed("EFFECT_QUEUE_CAPACITY", 256),
                on_time_tolerance_minutes: env_parsed("ON_TIME_TOLERANCE_MINUTES", 20),
            },
        }
    }
}

impl QueueConfig {
    /// Lookup timeout as a [`Duration`].
    #[must_use]
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Presence TTL as a [`Duration`].
    #[must_use]
    pub const fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::from_env();
        assert_eq!(config.queue.average_service_minutes, 15);
        assert_eq!(config.queue.on_time_tolerance_minutes, 20);
        assert!(config.consumer.batch_size > 0);
        assert!(config.queue.effect_queue_capacity > 0);
    }
}
