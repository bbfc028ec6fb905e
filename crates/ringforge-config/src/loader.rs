//! Config file loading with environment overrides.
//!
//! Load order:
//! 1. Built-in defaults
//! 2. The TOML file at the given path, when present
//! 3. `RINGFORGE_<FIELD>` environment variables (scalar fields only)
//! 4. Validation

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{BusBackend, HubConfig};

/// Load the hub configuration.
///
/// `path` is optional; a missing file is not an error, only a malformed one.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the file is malformed, an environment
/// override does not parse, or validation fails.
pub fn load(path: Option<&Path>) -> ConfigResult<HubConfig> {
    let mut config = match path {
        Some(p) if p.exists() => {
            let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                path: p.display().to_string(),
                source,
            })?;
            let parsed: HubConfig =
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: p.display().to_string(),
                    source,
                })?;
            info!(path = %p.display(), "loaded config file");
            parsed
        }
        Some(p) => {
            debug!(path = %p.display(), "config file absent, using defaults");
            HubConfig::default()
        }
        None => HubConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut HubConfig) -> ConfigResult<()> {
    if let Ok(v) = std::env::var("RINGFORGE_LISTEN_ADDR") {
        config.listen_addr = v;
    }
    if let Ok(v) = std::env::var("RINGFORGE_LOCAL_REGION") {
        config.local_region = v;
    }
    if let Ok(v) = std::env::var("RINGFORGE_EVENT_BUS_BACKEND") {
        config.event_bus_backend = match v.as_str() {
            "local" => BusBackend::Local,
            "kafka" => BusBackend::Kafka,
            "pulsar" => BusBackend::Pulsar,
            other => {
                return Err(ConfigError::EnvOverride {
                    var: "RINGFORGE_EVENT_BUS_BACKEND".to_owned(),
                    reason: format!("unknown backend {other:?}"),
                });
            }
        };
    }
    if let Ok(v) = std::env::var("RINGFORGE_BUS_BROKERS") {
        config.bus_brokers = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
    }
    if let Ok(v) = std::env::var("RINGFORGE_BUS_CLIENT_ID") {
        config.bus_client_id = v;
    }
    override_u64(&mut config.challenge_ttl_ms, "RINGFORGE_CHALLENGE_TTL_MS")?;
    override_u64(&mut config.challenge_sweep_ms, "RINGFORGE_CHALLENGE_SWEEP_MS")?;
    override_u64(&mut config.task_tick_ms, "RINGFORGE_TASK_TICK_MS")?;
    override_u64(&mut config.task_default_ttl_ms, "RINGFORGE_TASK_DEFAULT_TTL_MS")?;
    override_u64(&mut config.task_max_ttl_ms, "RINGFORGE_TASK_MAX_TTL_MS")?;
    override_u64(
        &mut config.task_cleanup_cutoff_ms,
        "RINGFORGE_TASK_CLEANUP_CUTOFF_MS",
    )?;
    override_u64(&mut config.dm_queue_ttl_seconds, "RINGFORGE_DM_QUEUE_TTL_SECONDS")?;
    override_u64(
        &mut config.dm_queue_ttl_high_priority_seconds,
        "RINGFORGE_DM_QUEUE_TTL_HIGH_PRIORITY_SECONDS",
    )?;
    override_u64(&mut config.bus_publish_timeout_ms, "RINGFORGE_BUS_PUBLISH_TIMEOUT_MS")?;
    override_u64(&mut config.bus_replay_timeout_ms, "RINGFORGE_BUS_REPLAY_TIMEOUT_MS")?;
    override_usize(&mut config.bus_max_queue_size, "RINGFORGE_BUS_MAX_QUEUE_SIZE")?;
    override_usize(
        &mut config.local_bus_max_events_per_topic,
        "RINGFORGE_LOCAL_BUS_MAX_EVENTS_PER_TOPIC",
    )?;
    if let Ok(v) = std::env::var("RINGFORGE_LOG_LEVEL") {
        config.logging.level = v;
    }
    Ok(())
}

fn override_u64(target: &mut u64, var: &str) -> ConfigResult<()> {
    if let Ok(v) = std::env::var(var) {
        *target = v.parse().map_err(|_| ConfigError::EnvOverride {
            var: var.to_owned(),
            reason: format!("expected integer, got {v:?}"),
        })?;
    }
    Ok(())
}

fn override_usize(target: &mut usize, var: &str) -> ConfigResult<()> {
    if let Ok(v) = std::env::var(var) {
        *target = v.parse().map_err(|_| ConfigError::EnvOverride {
            var: var.to_owned(),
            reason: format!("expected integer, got {v:?}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_without_file() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.task_tick_ms, 1000);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let cfg = load(Some(Path::new("/nonexistent/ringforge.toml"))).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:7410");
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "listen_addr = \"0.0.0.0:9000\"\ntask_tick_ms = 250").unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.task_tick_ms, 250);
        // Untouched fields keep defaults.
        assert_eq!(cfg.dm_queue_ttl_seconds, 300);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "listen_addr = [not toml").unwrap();
        assert!(matches!(load(Some(&path)), Err(ConfigError::Parse { .. })));
    }
}
