//! Log sinks receiving captured lines as they stream

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Source of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Stdout => f.write_str("stdout"),
            LogSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// Severity a line was logged at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Stdout lines and execution bookkeeping
    Debug,
    /// Progress messages
    Info,
    /// Stderr lines and cleanup problems
    Warning,
}

/// A single line as received by a [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Level the line was logged at
    pub level: LogLevel,
    /// The raw line, without trailing newline
    pub line: String,
}

/// Receiver for lines produced while running commands.
///
/// A sink is handed to every multiplexer and executor explicitly. Lines are
/// delivered as soon as they are recognized, while the child is still running.
pub trait LogSink: Send + Sync {
    /// Log a line at debug level
    fn debug(&self, line: &str);

    /// Log a line at info level
    fn info(&self, line: &str);

    /// Log a line at warning level
    fn warning(&self, line: &str);
}

/// Sink forwarding every line to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn debug(&self, line: &str) {
        tracing::debug!(target: "capture_exec", "{}", line);
    }

    fn info(&self, line: &str) {
        tracing::info!(target: "capture_exec", "{}", line);
    }

    fn warning(&self, line: &str) {
        tracing::warn!(target: "capture_exec", "{}", line);
    }
}

/// Sink keeping an in-order transcript of everything it received
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records received so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines received at `level`, in arrival order
    pub fn lines(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.line)
            .collect()
    }

    fn push(&self, level: LogLevel, line: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                line: line.to_string(),
            });
    }
}

impl LogSink for MemorySink {
    fn debug(&self, line: &str) {
        self.push(LogLevel::Debug, line);
    }

    fn info(&self, line: &str) {
        self.push(LogLevel::Info, line);
    }

    fn warning(&self, line: &str) {
        self.push(LogLevel::Warning, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.debug("one");
        sink.warning("two");
        sink.debug("three");

        assert_eq!(sink.lines(LogLevel::Debug), vec!["one", "three"]);
        assert_eq!(sink.lines(LogLevel::Warning), vec!["two"]);
        assert_eq!(sink.records()[1].line, "two");
    }

    #[test]
    fn test_log_source_display() {
        assert_eq!(LogSource::Stdout.to_string(), "stdout");
        assert_eq!(LogSource::Stderr.to_string(), "stderr");
    }
}
