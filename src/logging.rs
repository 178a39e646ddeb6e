//! Logging capability handed to the shard manager at construction.
//!
//! The manager never reaches for a global logger; it only talks to the
//! `ShardLogger` it was built with.

use log::{Level, LevelFilter};
use std::fmt;

pub const LOG_TARGET: &str = "shardmgr";

pub trait ShardLogger: Send + Sync {
    fn log(&self, message: fmt::Arguments<'_>);
    fn warn(&self, message: fmt::Arguments<'_>);
    fn error(&self, message: fmt::Arguments<'_>);
    fn debug(&self, message: fmt::Arguments<'_>);
}

/// Forwards to the `log` crate facade.
///
/// `log` messages are emitted at `Info`. An optional threshold drops
/// messages before they reach the facade.
#[derive(Debug, Clone, Copy)]
pub struct LogFacade {
    threshold: LevelFilter,
}

impl LogFacade {
    pub fn new() -> Self {
        Self {
            threshold: LevelFilter::Trace,
        }
    }

    pub fn with_threshold(threshold: LevelFilter) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> LevelFilter {
        self.threshold
    }

    fn emit(&self, level: Level, message: fmt::Arguments<'_>) {
        if level <= self.threshold {
            log::log!(target: LOG_TARGET, level, "{}", message);
        }
    }
}

impl Default for LogFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardLogger for LogFacade {
    fn log(&self, message: fmt::Arguments<'_>) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: fmt::Arguments<'_>) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: fmt::Arguments<'_>) {
        self.emit(Level::Error, message);
    }

    fn debug(&self, message: fmt::Arguments<'_>) {
        self.emit(Level::Debug, message);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl ShardLogger for NoopLogger {
    fn log(&self, _message: fmt::Arguments<'_>) {}
    fn warn(&self, _message: fmt::Arguments<'_>) {}
    fn error(&self, _message: fmt::Arguments<'_>) {}
    fn debug(&self, _message: fmt::Arguments<'_>) {}
}
