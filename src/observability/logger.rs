//! Structured JSON logger
//!
//! - Structured logs (JSON), one log line = one event
//! - Deterministic key ordering
//! - Synchronous, no buffering

use std::fmt;
use std::io::{self, Write};

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger that outputs JSON lines.
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields.
    ///
    /// Fields are output in the order given, after `event` and `severity`.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stdout());
    }

    /// Log an INFO event.
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log a WARN event.
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Internal log implementation that writes to a given writer.
    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut output = String::with_capacity(128);
        output.push('{');
        output.push_str(&format!("\"event\":{:?}", event));
        output.push_str(&format!(",\"severity\":\"{}\"", severity));
        for (k, v) in fields {
            output.push_str(&format!(",{:?}:{:?}", k, v));
        }
        output.push('}');
        output.push('\n');
        // Best effort: observability must never fail the operation
        let _ = writer.write_all(output.as_bytes());
    }

    #[cfg(test)]
    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buf = Vec::new();
        Self::log_to_writer(severity, event, fields, &mut buf);
        String::from_utf8(buf).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_and_severity_first() {
        let line = Logger::render(Severity::Info, "PLAN_FROZEN", &[("cost", "42")]);
        assert!(line.starts_with("{\"event\":\"PLAN_FROZEN\",\"severity\":\"INFO\""));
        assert!(line.contains("\"cost\":\"42\""));
        assert!(line.ends_with("}\n"));
    }

    #[test]
    fn test_log_to_file() {
        use std::io::{Read, Seek, SeekFrom};
        let mut f = tempfile::tempfile().unwrap();
        Logger::log_to_writer(Severity::Info, "TEMPINDEX_BUILT", &[("rows", "3")], &mut f);
        f.seek(SeekFrom::Start(0)).unwrap();
        let mut line = String::new();
        f.read_to_string(&mut line).unwrap();
        assert!(line.contains("\"rows\":\"3\""));
    }

    #[test]
    fn test_deterministic_output() {
        let a = Logger::render(Severity::Warn, "PLAN_CACHE_OVERFLOW", &[("entries", "21")]);
        let b = Logger::render(Severity::Warn, "PLAN_CACHE_OVERFLOW", &[("entries", "21")]);
        assert_eq!(a, b);
    }
}
