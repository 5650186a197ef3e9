//! # pipelog
//! Asynchronous multi-destination logging pipeline with a single writer thread.
//!
//! Entries are built on the calling thread by a [`LogProducer`] and handed to a
//! background worker, which formats them and writes them to every destination
//! whose category filter accepts them.
//!
//! ## Usage
//! ```rust
//! use pipelog::{LogSource, ProducerFlag, pipeline_config};
//!
//! let pipeline = pipeline_config().build().unwrap();
//! pipeline.init().unwrap();
//! pipeline
//!     .producer(LogSource::Normal)
//!     .append("Hello, world! ")
//!     .append(42)
//!     .apply(ProducerFlag::Flush);
//! pipeline.wait_end(); // drains the queue
//! ```
//!
//! ## Logging to files
//! The log file is created if it does not exist and appended to if it does.
//!
//! ```rust
//! use pipelog::{LogSource, pipeline_config};
//!
//! std::fs::remove_file("/tmp/pipelog_doc.log").ok();
//! let pipeline = pipeline_config()
//!     .no_default_formats()
//!     .with_log_file("/tmp/pipelog_doc.log", LogSource::All, "{source}: {text}")
//!     .build()
//!     .expect("Unable to create log file");
//! pipeline.init().unwrap();
//! pipeline.producer(LogSource::Error).append("disk full");
//! pipeline.wait_end();
//! assert_eq!(std::fs::read_to_string("/tmp/pipelog_doc.log").unwrap(), "ERROR: disk full\n");
//! ```
//!
//! ## With the `log` facade
//! ```rust
//! use pipelog::pipeline_config;
//!
//! let _guard = pipeline_config().install_global().unwrap();
//! log::info!("Hello, world!");
//! // guard drains the queue when dropped
//! ```

mod producer;
mod worker;

pub use pipelog_core::{
    CriticalSection, DestinationKind, Destinations, InfoField, LogJob, LogSource, LogStderr,
    LogStdout, LogWriter, MutexValue, OwnedMutex, PIPELOG_CONFIG, PipelogError, SharedBuffer,
    Template, ThreadIdRegistry, utils,
};
pub use producer::{LogProducer, ProducerFlag};
pub use worker::Pipeline;

use log::{LevelFilter, Log};
use std::{fmt::Write, path::PathBuf, time::Duration};

/// Bridges the `log` facade into a pipeline.
struct PipelineLogger {
    pipeline: Pipeline,
    level: LevelFilter,
}

impl Log for PipelineLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut producer = self.pipeline.producer(record.level().into());
        let _ = write!(producer, "{}", record.args());
        producer.flush();
    }

    fn flush(&self) {}
}

/// Guard returned by [`ConfigBuilder::install_global`].
/// Drains and stops the pipeline when dropped.
pub struct LoggerGuard {
    pipeline: Pipeline,
}

impl LoggerGuard {
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        self.pipeline.wait_end();
    }
}

/// Builder for configuring a [`Pipeline`].
pub struct ConfigBuilder {
    stdout: Box<dyn LogWriter>,
    stderr: Box<dyn LogWriter>,
    default_formats: bool,
    stdout_formats: Vec<(LogSource, Template)>,
    stderr_formats: Vec<(LogSource, Template)>,
    log_files: Vec<(PathBuf, LogSource, Template)>,
    flush_interval: Duration,
    log_level: LevelFilter,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            stdout: Box::new(LogStdout),
            stderr: Box::new(LogStderr),
            default_formats: true,
            stdout_formats: Vec::new(),
            stderr_formats: Vec::new(),
            log_files: Vec::new(),
            flush_interval: PIPELOG_CONFIG.flush_interval(),
            log_level: LevelFilter::Info,
        }
    }
}

impl ConfigBuilder {
    /// Builds the pipeline. The worker is not started until [`Pipeline::init`].
    pub fn build(self) -> Result<Pipeline, PipelogError> {
        let Self {
            stdout,
            stderr,
            default_formats,
            stdout_formats,
            stderr_formats,
            log_files,
            flush_interval,
            log_level: _,
        } = self;
        let mut destinations = Destinations::new(stdout, stderr);
        if default_formats {
            destinations.format_stdout(LogSource::Normal, "[{time}] {text}");
            destinations.format_stderr(LogSource::Error, "[{time}] {source}: {text}");
        }
        for (source, template) in stdout_formats {
            destinations.format_stdout(source, template);
        }
        for (source, template) in stderr_formats {
            destinations.format_stderr(source, template);
        }
        for (path, filter, template) in log_files {
            destinations.add_log_file(path, filter, template)?;
        }
        Ok(Pipeline::new(destinations, flush_interval))
    }

    /// Sets the stdout template for a category.
    pub fn with_stdout_format(mut self, source: LogSource, template: impl Into<Template>) -> Self {
        self.stdout_formats.push((source, template.into()));
        self
    }

    /// Sets the stderr template for a category.
    pub fn with_stderr_format(mut self, source: LogSource, template: impl Into<Template>) -> Self {
        self.stderr_formats.push((source, template.into()));
        self
    }

    /// Adds a log file. It is opened by [`ConfigBuilder::build`].
    pub fn with_log_file<P: Into<PathBuf>>(
        mut self,
        path: P,
        filter: LogSource,
        template: impl Into<Template>,
    ) -> Self {
        self.log_files.push((path.into(), filter, template.into()));
        self
    }

    /// Skip the built-in console formats
    pub fn no_default_formats(self) -> Self {
        Self {
            default_formats: false,
            ..self
        }
    }

    /// Replaces the console streams, e.g. with a [`SharedBuffer`] to capture output.
    pub fn with_console_writers(
        self,
        stdout: impl LogWriter + 'static,
        stderr: impl LogWriter + 'static,
    ) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            ..self
        }
    }

    /// How often buffered file output is flushed. Defaults to `PIPELOG_FLUSH_INTERVAL_MS`.
    pub fn with_flush_interval(self, flush_interval: Duration) -> Self {
        Self {
            flush_interval,
            ..self
        }
    }

    /// Maximum level forwarded by the `log` facade
    pub fn with_level(self, log_level: LevelFilter) -> Self {
        Self { log_level, ..self }
    }

    /// Builds and starts the pipeline and routes the `log` facade into it.
    /// Returns a guard that drains and stops the pipeline when dropped.
    #[must_use = "LoggerGuard must be kept alive to ensure logs are written. Do \"let _guard = pipeline_config().install_global()?;\""]
    pub fn install_global(self) -> Result<LoggerGuard, PipelogError> {
        let level = self.log_level;
        let pipeline = self.build()?;
        pipeline.init()?;
        log::set_boxed_logger(Box::new(PipelineLogger {
            pipeline: pipeline.clone(),
            level,
        }))?;
        log::set_max_level(level);
        Ok(LoggerGuard { pipeline })
    }
}

/// Returns a default ConfigBuilder for configuring a pipeline.
pub fn pipeline_config() -> ConfigBuilder {
    ConfigBuilder::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_formats() {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let pipeline = pipeline_config()
            .with_console_writers(out.clone(), err.clone())
            .build()
            .unwrap();
        pipeline.init().unwrap();
        pipeline.producer(LogSource::Normal).append("hello");
        pipeline.producer(LogSource::Error).append("oops");
        pipeline.producer(LogSource::Debug).append("hidden");
        pipeline.wait_end();
        let out = out.contents();
        let err = err.contents();
        assert!(out.starts_with('[') && out.ends_with("] hello\n"), "{out}");
        assert!(err.ends_with("ERROR: oops\n"), "{err}");
        assert!(!out.contains("hidden") && !err.contains("hidden"));
    }

    #[test]
    fn test_builder_overrides_and_files() {
        let path = "/tmp/pipelog_test_builder.log";
        fs::remove_file(path).ok();
        let out = SharedBuffer::new();
        let pipeline = pipeline_config()
            .with_console_writers(out.clone(), SharedBuffer::new())
            .with_stdout_format(LogSource::Normal, "{text}")
            .with_stdout_format(LogSource::Debug, "dbg {text}")
            .with_log_file(path, LogSource::Debug, "{text}")
            .with_flush_interval(Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(pipeline.destination_count(), 4);
        pipeline.init().unwrap();
        pipeline.producer(LogSource::Normal).append("a");
        pipeline.producer(LogSource::Debug).append("b");
        pipeline.wait_end();
        assert_eq!(out.contents(), "a\ndbg b\n");
        assert_eq!(fs::read_to_string(path).unwrap(), "b\n");
    }

    #[test]
    fn test_builder_reports_unopenable_file() {
        let result = pipeline_config()
            .with_log_file("/nonexistent_pipelog_dir/app.log", LogSource::All, "{text}")
            .build();
        assert!(matches!(result, Err(PipelogError::Configuration { .. })));
    }

    #[test]
    fn test_logger_maps_levels() {
        let out = SharedBuffer::new();
        let pipeline = pipeline_config()
            .no_default_formats()
            .with_console_writers(out.clone(), SharedBuffer::new())
            .with_stdout_format(LogSource::All, "{source} {text}")
            .build()
            .unwrap();
        let logger = PipelineLogger {
            pipeline: pipeline.clone(),
            level: LevelFilter::Debug,
        };
        for (level, text) in [
            (log::Level::Warn, "careful"),
            (log::Level::Info, "fyi"),
            (log::Level::Debug, "details"),
            (log::Level::Trace, "filtered"),
        ] {
            logger.log(
                &log::Record::builder()
                    .level(level)
                    .args(format_args!("{text}"))
                    .build(),
            );
        }
        pipeline.wait_end();
        assert_eq!(out.contents(), "ERROR careful\nNORMAL fyi\nDEBUG details\n");
    }
}
