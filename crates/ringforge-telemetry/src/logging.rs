//! Logging setup over tracing-subscriber.

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// Structured JSON lines.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level filter.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Extra per-crate directives (`ringforge_events=trace`).
    pub directives: Vec<String>,
}

impl LogConfig {
    /// Create a config at the given base level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a filter directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|_| TelemetryError::InvalidDirective(self.level.clone()))?;
        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|_| TelemetryError::InvalidDirective(directive.clone()))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level when set.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] on a malformed filter, or
/// [`TelemetryError::AlreadyInitialized`] when a subscriber is already
/// installed (tests install one per process; callers may ignore that case).
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => config.build_filter()?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|_| TelemetryError::AlreadyInitialized)
}
