//! Output-stability watchdog.
//!
//! Polls a file written by an external process and hands back its full
//! contents once the size has stopped changing for a configured window.
//! Useful for recovering output from an agent that crashed or hung without
//! signalling completion.

pub mod config;
pub mod log;
pub mod runner;
pub mod stability;
pub mod watchdog;

pub use config::WatchdogConfig;
pub use log::{Level, LogSink, TracingSink};
pub use watchdog::{ResultReceiver, StopHandle, Watchdog};
