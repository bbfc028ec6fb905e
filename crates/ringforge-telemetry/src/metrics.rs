//! Prometheus metrics for the hub.

use std::sync::Arc;

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// The hub's metric set, backed by a dedicated Prometheus registry.
#[derive(Clone)]
pub struct HubMetrics {
    registry: Arc<Registry>,
    /// Lifetime accepted WebSocket connections.
    pub connections_total: IntCounter,
    /// Currently attached sessions.
    pub connections_active: IntGauge,
    /// Auth attempts by method and outcome.
    pub auth_attempts: IntCounterVec,
    /// Events published to the bus, by kind.
    pub bus_events_published: IntCounterVec,
    /// Bus publish failures, by reason.
    pub bus_publish_failures: IntCounterVec,
    /// Activity/direct messages routed, by scope.
    pub messages_routed: IntCounterVec,
    /// Task transitions, by resulting status.
    pub task_transitions: IntCounterVec,
}

impl HubMetrics {
    /// Build the metric set on a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Metrics`] when registration fails.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let connections_total = IntCounter::with_opts(Opts::new(
            "ringforge_connections_total",
            "Lifetime accepted WebSocket connections",
        ))
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        let connections_active = IntGauge::with_opts(Opts::new(
            "ringforge_connections_active",
            "Currently attached sessions",
        ))
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        let auth_attempts = IntCounterVec::new(
            Opts::new("ringforge_auth_attempts_total", "Auth attempts"),
            &["method", "outcome"],
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        let bus_events_published = IntCounterVec::new(
            Opts::new(
                "ringforge_bus_events_published_total",
                "Events published to the bus",
            ),
            &["kind"],
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        let bus_publish_failures = IntCounterVec::new(
            Opts::new(
                "ringforge_bus_publish_failures_total",
                "Bus publish failures",
            ),
            &["reason"],
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        let messages_routed = IntCounterVec::new(
            Opts::new("ringforge_messages_routed_total", "Messages routed"),
            &["scope"],
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        let task_transitions = IntCounterVec::new(
            Opts::new("ringforge_task_transitions_total", "Task transitions"),
            &["status"],
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

        for collector in [
            Box::new(connections_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(connections_active.clone()),
            Box::new(auth_attempts.clone()),
            Box::new(bus_events_published.clone()),
            Box::new(bus_publish_failures.clone()),
            Box::new(messages_routed.clone()),
            Box::new(task_transitions.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            connections_total,
            connections_active,
            auth_attempts,
            bus_events_published,
            bus_publish_failures,
            messages_routed,
            task_transitions,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Metrics`] when encoding fails.
    pub fn render(&self) -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
