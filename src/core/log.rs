//! CS-004: Logger handle shared by the engine and the drivers.
//!
//! Library code never prints. Lines go through a [`LogSink`]; the default sink
//! forwards to `tracing`, tests capture lines with [`MemorySink`].

use std::sync::{Arc, Mutex};

/// Severity of a log line. `Verbose` and `ExtraVerbose` map to tracing's
/// `debug` and `trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    ExtraVerbose,
    Verbose,
    Info,
    Warn,
    Error,
}

/// Destination for log lines.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards every line to the `tracing` macros.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ExtraVerbose => tracing::trace!("{}", message),
            Level::Verbose => tracing::debug!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }
    }
}

/// Keeps lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages logged at exactly `level`.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

/// Cheap-to-clone logger handle.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Logger")
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Logger { sink }
    }

    /// A logger writing into a fresh [`MemorySink`], returned alongside it.
    pub fn memory() -> (Logger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (Logger::new(sink.clone()), sink)
    }

    pub fn log(&self, level: Level, message: &str) {
        self.sink.log(level, message);
    }

    pub fn extra_verbose(&self, message: &str) {
        self.log(Level::ExtraVerbose, message);
    }

    pub fn verbose(&self, message: &str) {
        self.log(Level::Verbose, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}
