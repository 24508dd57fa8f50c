//! Severity-tagged logging collaborator.
//!
//! The collector and plugin report through the [`Logger`] trait instead of
//! calling `tracing` directly, so the host framework (or a test) decides where
//! plugin messages go. [`TracingLogger`] is the default and forwards to
//! `tracing` with the plugin name as a field.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::plugin::PLUGIN_NAME;

/// Severity of a plugin log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Destination for plugin log messages.
pub trait Logger: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log(&self, severity: Severity, message: &str) {
        (**self).log(severity, message)
    }
}

/// Forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => error!(plugin = PLUGIN_NAME, "{}", message),
            Severity::Warning => warn!(plugin = PLUGIN_NAME, "{}", message),
            Severity::Info => info!(plugin = PLUGIN_NAME, "{}", message),
        }
    }
}

/// Keeps every message in memory. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded messages in arrival order.
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns recorded messages of the given severity.
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, severity: Severity, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((severity, message.to_string()));
    }
}
