//! In-memory log ring shared between the process logger and the dashboard.
//!
//! The dashboard cannot let `env_logger` write to the terminal it is drawing
//! on, so records are captured here and rendered as a panel instead.
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A captured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Log entry severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warning,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.pad(label)
    }
}

impl LogEntry {
    /// Create a new log entry with the current timestamp
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn from_record(record: &log::Record<'_>) -> Self {
        Self::new(
            record.level().into(),
            record.target(),
            record.args().to_string(),
        )
    }
}

/// Bounded buffer of recent log entries; the oldest are dropped first.
pub struct LogBuffer {
    entries: Vec<LogEntry>,
    max_entries: usize,
}

pub type SharedLogBuffer = Arc<Mutex<LogBuffer>>;

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn shared(max_entries: usize) -> SharedLogBuffer {
        Arc::new(Mutex::new(Self::new(max_entries)))
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(0..excess);
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The newest `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// `log::Log` implementation that copies every record accepted by the
/// env_logger filter into a [`LogBuffer`], optionally forwarding it to
/// env_logger's own output as well.
pub struct BufferLogger {
    inner: env_logger::Logger,
    buffer: SharedLogBuffer,
    forward: bool,
}

impl BufferLogger {
    pub fn new(inner: env_logger::Logger, buffer: SharedLogBuffer, forward: bool) -> Self {
        Self {
            inner,
            buffer,
            forward,
        }
    }

    /// Install as the global logger, honouring `RUST_LOG` (default `info`).
    pub fn install(buffer: SharedLogBuffer, forward: bool) -> Result<()> {
        let inner =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .build();
        let max_level = inner.filter();
        log::set_boxed_logger(Box::new(Self::new(inner, buffer, forward)))
            .context("a global logger is already installed")?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        if self.forward {
            self.inner.log(record);
        }
        self.buffer.lock().push(LogEntry::from_record(record));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}
