//! Configuration types.
//!
//! Every field has a production default so an empty file (or no file at all)
//! produces a working configuration. Field names are the recognized option
//! names; they appear verbatim in TOML and as `RINGFORGE_`-prefixed
//! environment variables.

use serde::{Deserialize, Serialize};

/// Event bus backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    /// In-process bounded per-topic log.
    #[default]
    Local,
    /// Kafka-shaped streaming backend.
    Kafka,
    /// Pulsar-shaped streaming backend.
    Pulsar,
}

impl BusBackend {
    /// Whether this backend is a long-haul streaming queue.
    #[must_use]
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Kafka | Self::Pulsar)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatOption {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// Structured JSON lines.
    Json,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter (`trace` .. `error`).
    pub level: String,
    /// Output format.
    pub format: LogFormatOption,
    /// Extra per-crate directives (`ringforge_events=trace`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormatOption::default(),
            directives: Vec::new(),
        }
    }
}

/// Root configuration for the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Socket address the gateway listens on.
    pub listen_addr: String,
    /// Region tag of this hub instance; `"local"` disables affinity (dev mode).
    pub local_region: String,

    /// Event bus backend.
    pub event_bus_backend: BusBackend,
    /// Broker addresses for streaming backends.
    pub bus_brokers: Vec<String>,
    /// Client identifier presented to the brokers.
    pub bus_client_id: String,
    /// In-flight publish ceiling before `backpressure` is returned.
    pub bus_max_queue_size: usize,
    /// Publish deadline in milliseconds.
    pub bus_publish_timeout_ms: u64,
    /// Replay deadline in milliseconds.
    pub bus_replay_timeout_ms: u64,
    /// Per-topic entry cap of the local backend.
    pub local_bus_max_events_per_topic: usize,

    /// Challenge TTL in milliseconds.
    pub challenge_ttl_ms: u64,
    /// Challenge sweep interval in milliseconds.
    pub challenge_sweep_ms: u64,

    /// Scheduler tick interval in milliseconds.
    pub task_tick_ms: u64,
    /// Default task TTL in milliseconds.
    pub task_default_ttl_ms: u64,
    /// Maximum task TTL in milliseconds.
    pub task_max_ttl_ms: u64,
    /// Age past terminal at which task rows are purged, in milliseconds.
    pub task_cleanup_cutoff_ms: u64,

    /// Offline direct-message TTL in seconds.
    pub dm_queue_ttl_seconds: u64,
    /// Offline TTL for high/critical priority messages, in seconds.
    pub dm_queue_ttl_high_priority_seconds: u64,

    /// Per-session action budget per second.
    pub session_actions_per_second: u32,
    /// Per-session action burst allowance.
    pub session_actions_burst: u32,
    /// Grace interval for in-flight work on shutdown, in milliseconds.
    pub drain_grace_ms: u64,

    /// Logging configuration.
    pub logging: LoggingSection,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7410".to_owned(),
            local_region: "local".to_owned(),
            event_bus_backend: BusBackend::Local,
            bus_brokers: Vec::new(),
            bus_client_id: "ringforge-hub".to_owned(),
            bus_max_queue_size: 5000,
            bus_publish_timeout_ms: 10_000,
            bus_replay_timeout_ms: 15_000,
            local_bus_max_events_per_topic: 10_000,
            challenge_ttl_ms: 30_000,
            challenge_sweep_ms: 60_000,
            task_tick_ms: 1000,
            task_default_ttl_ms: 30_000,
            task_max_ttl_ms: 300_000,
            task_cleanup_cutoff_ms: 300_000,
            dm_queue_ttl_seconds: 300,
            dm_queue_ttl_high_priority_seconds: 86_400,
            session_actions_per_second: 50,
            session_actions_burst: 100,
            drain_grace_ms: 5000,
            logging: LoggingSection::default(),
        }
    }
}

impl HubConfig {
    /// Validate ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        if self.task_tick_ms == 0 {
            return Err(crate::ConfigError::Invalid {
                field: "task_tick_ms".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        if self.task_max_ttl_ms == 0 || self.task_default_ttl_ms > self.task_max_ttl_ms {
            return Err(crate::ConfigError::Invalid {
                field: "task_default_ttl_ms".to_owned(),
                reason: "must be positive and at most task_max_ttl_ms".to_owned(),
            });
        }
        if self.bus_max_queue_size == 0 {
            return Err(crate::ConfigError::Invalid {
                field: "bus_max_queue_size".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        if self.local_bus_max_events_per_topic == 0 {
            return Err(crate::ConfigError::Invalid {
                field: "local_bus_max_events_per_topic".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        if self.event_bus_backend.is_streaming() && self.bus_brokers.is_empty() {
            return Err(crate::ConfigError::Invalid {
                field: "bus_brokers".to_owned(),
                reason: "streaming backend requires at least one broker".to_owned(),
            });
        }
        Ok(())
    }
}
