use std::fmt;

use colored::{ColoredString, Colorize};

/// Category of a log entry, used by destinations to filter what they receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogSource {
    #[default]
    Normal,
    Debug,
    Error,
    /// As a filter, accepts every category.
    All,
}

impl LogSource {
    /// Whether a destination filtering on `self` receives entries of `source`.
    pub fn accepts(self, source: LogSource) -> bool {
        self == LogSource::All || self == source
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogSource::Normal => "NORMAL",
            LogSource::Debug => "DEBUG",
            LogSource::Error => "ERROR",
            LogSource::All => "ALL",
        }
    }

    pub fn colored(self) -> ColoredString {
        match self {
            LogSource::Normal => self.as_str().green(),
            LogSource::Debug => self.as_str().blue(),
            LogSource::Error => self.as_str().red(),
            LogSource::All => self.as_str().normal(),
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for LogSource {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error | log::Level::Warn => LogSource::Error,
            log::Level::Info => LogSource::Normal,
            log::Level::Debug | log::Level::Trace => LogSource::Debug,
        }
    }
}

/// Metadata fields sealed into every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoField {
    Clock,
    Date,
    Time,
    Thread,
}

/// Metadata of a job. Unset fields are filled in when the entry is sealed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogInfo {
    pub clock: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub thread: Option<String>,
}

impl LogInfo {
    pub fn get(&self, field: InfoField) -> Option<&str> {
        match field {
            InfoField::Clock => self.clock.as_deref(),
            InfoField::Date => self.date.as_deref(),
            InfoField::Time => self.time.as_deref(),
            InfoField::Thread => self.thread.as_deref(),
        }
    }

    pub fn set(&mut self, field: InfoField, value: impl Into<String>) {
        let slot = match field {
            InfoField::Clock => &mut self.clock,
            InfoField::Date => &mut self.date,
            InfoField::Time => &mut self.time,
            InfoField::Thread => &mut self.thread,
        };
        *slot = Some(value.into());
    }

    /// Fills `field` with `value()` unless it was already set.
    pub fn fill_with(&mut self, field: InfoField, value: impl FnOnce() -> String) {
        if self.get(field).is_none() {
            self.set(field, value());
        }
    }
}

/// A sealed log entry. Shared as `Arc<LogJob>` and never mutated once queued.
#[derive(Debug, Clone, Default)]
pub struct LogJob {
    pub source: LogSource,
    /// Echo on the console even if no console destination accepts `source`.
    pub stdio: bool,
    pub newline: bool,
    /// Write `text` verbatim, bypassing templates.
    pub raw: bool,
    pub text: String,
    pub info: LogInfo,
}

impl LogJob {
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        Self {
            source,
            newline: true,
            text: text.into(),
            ..Default::default()
        }
    }
}
