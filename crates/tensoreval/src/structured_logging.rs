//! `tracing` subscriber setup for evaluation runs.
//!
//! Only compiled with the `structured-logging` feature. The crate itself logs
//! through the `log` facade; this module installs a subscriber for
//! applications and reports metric results as structured events with
//! [`record_results`].
//!
//! ```no_run
//! use tensoreval::structured_logging::{LogFormat, TracingLogger};
//!
//! TracingLogger::builder()
//!     .with_format(LogFormat::Json)
//!     .with_env_filter("tensoreval=debug")
//!     .build()
//!     .expect("logger already installed");
//! ```

use crate::metrics::MetricValue;
use crate::{EvalError, EvalResult};
use std::collections::HashMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, colored.
    #[default]
    Pretty,
    /// One line per event, no colors.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Builder for the global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct TracingLoggerBuilder {
    format: LogFormat,
    level: String,
    env_filter: Option<String>,
    with_targets: bool,
}

impl Default for TracingLoggerBuilder {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            env_filter: None,
            with_targets: true,
        }
    }
}

impl TracingLoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Fallback level when neither a filter nor `RUST_LOG` is set.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Filter directives such as `"tensoreval=trace"`; overrides the level.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn with_targets(mut self, enabled: bool) -> Self {
        self.with_targets = enabled;
        self
    }

    fn filter(&self) -> EvalResult<EnvFilter> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives).map_err(|e| {
                EvalError::InvalidConfig(format!("Invalid env filter '{}': {}", directives, e))
            }),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the subscriber. Fails if one is already installed.
    pub fn build(self) -> EvalResult<TracingLogger> {
        let filter = self.filter()?;
        let base = fmt::layer().with_target(self.with_targets);
        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            LogFormat::Pretty => registry.with(base.pretty()).try_init(),
            LogFormat::Compact => registry.with(base.with_ansi(false).compact()).try_init(),
            LogFormat::Json => registry.with(base.json()).try_init(),
        };
        installed.map_err(|e| {
            EvalError::InvalidConfig(format!("Failed to initialize tracing: {}", e))
        })?;
        Ok(TracingLogger {
            format: self.format,
        })
    }
}

/// Handle for an installed subscriber.
#[derive(Debug)]
pub struct TracingLogger {
    format: LogFormat,
}

impl TracingLogger {
    pub fn builder() -> TracingLoggerBuilder {
        TracingLoggerBuilder::new()
    }

    /// Pretty output at `info`, honoring `RUST_LOG`.
    pub fn init() -> EvalResult<Self> {
        Self::builder().build()
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

/// Emit one `info` event per metric result, sorted by name.
pub fn record_results(step: usize, results: &HashMap<String, MetricValue>) {
    let mut names: Vec<&String> = results.keys().collect();
    names.sort();
    for name in names {
        match &results[name] {
            MetricValue::Scalar(value) => {
                tracing::info!(step, metric = %name, value, "metric result");
            }
            MetricValue::Vector(values) => {
                tracing::info!(step, metric = %name, values = ?values.to_vec(), "metric result");
            }
        }
    }
}
