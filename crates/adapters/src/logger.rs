//! Tracing-backed logger adapter.

use embranch_ports::{LogEvent, LogLevel, LoggerPort};

/// Logger emitting structured events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger;

impl TracingLogger {
    /// Create a tracing-backed logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LoggerPort for TracingLogger {
    fn log(&self, event: LogEvent) {
        let fields = event
            .fields
            .as_ref()
            .map(|fields| serde_json::to_string(fields).unwrap_or_default())
            .unwrap_or_default();

        match event.level {
            LogLevel::Debug => {
                tracing::debug!(event = %event.event, fields = %fields, "{}", event.message);
            },
            LogLevel::Info => {
                tracing::info!(event = %event.event, fields = %fields, "{}", event.message);
            },
            LogLevel::Warn => {
                tracing::warn!(event = %event.event, fields = %fields, "{}", event.message);
            },
            LogLevel::Error => {
                tracing::error!(event = %event.event, fields = %fields, "{}", event.message);
            },
        }
    }
}
