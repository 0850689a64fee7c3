//! Operator-facing notifications.

use kc_project::default_notification_timeout_ms;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Sink for notifications raised by a running loop.
pub trait Reporter {
    fn report(&mut self, severity: Severity, message: &str);
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    loop_id: String,
    notification_timeout_ms: f64,
}

impl TracingReporter {
    pub fn new(loop_id: impl Into<String>, notification_timeout_ms: f64) -> Self {
        Self {
            loop_id: loop_id.into(),
            notification_timeout_ms,
        }
    }

    /// Reporter with the configuration's default notification timeout.
    pub fn for_loop(loop_id: impl Into<String>) -> Self {
        Self::new(loop_id, default_notification_timeout_ms())
    }

    pub fn notification_timeout_ms(&self) -> f64 {
        self.notification_timeout_ms
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, severity: Severity, message: &str) {
        let timeout_ms = self.notification_timeout_ms;
        match severity {
            Severity::Info => tracing::info!(loop_id = %self.loop_id, "{message}"),
            Severity::Warning => {
                tracing::warn!(loop_id = %self.loop_id, timeout_ms, "{message}")
            }
            Severity::Fatal => tracing::error!(loop_id = %self.loop_id, "{message}"),
        }
    }
}

/// Keeps every notification in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    entries: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, severity: Severity, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((severity, message.to_string()));
    }
}
