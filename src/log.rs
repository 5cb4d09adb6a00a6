//! Injected logging capability for the watchdog.
//!
//! The watchdog never assumes a global subscriber; callers hand it a sink or
//! nothing. Without a sink it behaves identically, it just stays quiet.
use std::fmt;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

/// A structured `key=value` pair attached to a message.
pub type Field<'a> = (&'static str, &'a dyn fmt::Display);

/// Receives leveled diagnostic messages with structured context.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]);
}

/// Forwards messages to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]) {
        let context = render_fields(fields);
        match level {
            Level::Debug => tracing::debug!(%context, "{message}"),
            Level::Info => tracing::info!(%context, "{message}"),
            Level::Warn => tracing::warn!(%context, "{message}"),
        }
    }
}

fn render_fields(fields: &[Field<'_>]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}
