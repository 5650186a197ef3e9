use std::path::{Path, PathBuf};

use crate::{
    error::PipelogError,
    job::{LogJob, LogSource},
    log_writer::{LogFile, LogWriter},
    template::Template,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationKind {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// A configured sink with its category filter and format template.
pub struct Destination {
    kind: DestinationKind,
    filter: LogSource,
    template: Template,
    file: Option<LogFile>,
}

impl Destination {
    pub fn kind(&self) -> &DestinationKind {
        &self.kind
    }

    pub fn filter(&self) -> LogSource {
        self.filter
    }
}

/// Ordered registry of destinations plus the console streams they share.
///
/// Entries are only ever appended; changing a console format edits its entry
/// in place so registry order is stable.
pub struct Destinations {
    stdout: Box<dyn LogWriter>,
    stderr: Box<dyn LogWriter>,
    entries: Vec<Destination>,
    write_failures: u64,
}

fn render_line(job: &LogJob, template: &Template, colored: bool) -> String {
    let mut line = if job.raw {
        job.text.clone()
    } else {
        template.render(job, colored)
    };
    if job.newline {
        line.push('\n');
    }
    line
}

impl Destinations {
    pub fn new(stdout: Box<dyn LogWriter>, stderr: Box<dyn LogWriter>) -> Self {
        Self {
            stdout,
            stderr,
            entries: Vec::new(),
            write_failures: 0,
        }
    }

    pub fn entries(&self) -> &[Destination] {
        &self.entries
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    fn set_console_format(&mut self, kind: DestinationKind, source: LogSource, template: Template) {
        let existing = self
            .entries
            .iter_mut()
            .find(|entry| entry.kind == kind && entry.filter == source);
        match existing {
            Some(entry) => entry.template = template,
            None => self.entries.push(Destination {
                kind,
                filter: source,
                template,
                file: None,
            }),
        }
    }

    /// Sets the stdout template for `source`, adding the destination if needed.
    pub fn format_stdout(&mut self, source: LogSource, template: impl Into<Template>) {
        self.set_console_format(DestinationKind::Stdout, source, template.into());
    }

    /// Sets the stderr template for `source`, adding the destination if needed.
    pub fn format_stderr(&mut self, source: LogSource, template: impl Into<Template>) {
        self.set_console_format(DestinationKind::Stderr, source, template.into());
    }

    /// Opens `path` for appending and registers it. Nothing is registered on failure.
    pub fn add_log_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        filter: LogSource,
        template: impl Into<Template>,
    ) -> Result<(), PipelogError> {
        let path = path.as_ref();
        let file = LogFile::new(path).map_err(|source| PipelogError::Configuration {
            path: path.to_path_buf(),
            source,
        })?;
        self.entries.push(Destination {
            kind: DestinationKind::File(path.to_path_buf()),
            filter,
            template: template.into(),
            file: Some(file),
        });
        Ok(())
    }

    /// Formats `job` and writes it to every accepting destination, in order.
    /// Write failures are counted, never returned.
    pub fn dispatch(&mut self, job: &LogJob) {
        let Self {
            stdout,
            stderr,
            entries,
            write_failures,
        } = self;
        let mut echoed = false;
        for entry in entries.iter_mut() {
            if !entry.filter.accepts(job.source) {
                continue;
            }
            let writer: &mut dyn LogWriter = match (&entry.kind, entry.file.as_mut()) {
                (_, Some(file)) => file,
                (DestinationKind::Stderr, None) => {
                    echoed = true;
                    &mut **stderr
                }
                _ => {
                    echoed = true;
                    &mut **stdout
                }
            };
            let line = render_line(job, &entry.template, writer.colored());
            if writer.write_text(&line).is_err() {
                *write_failures += 1;
            }
        }
        if job.stdio && !echoed {
            let line = render_line(job, &Template::parse("{text}"), false);
            if stdout.write_text(&line).is_err() {
                *write_failures += 1;
            }
        }
    }

    pub fn flush(&mut self) {
        let mut failures = 0;
        for file in self.entries.iter_mut().filter_map(|entry| entry.file.as_mut()) {
            if file.flush().is_err() {
                failures += 1;
            }
        }
        if self.stdout.flush().is_err() {
            failures += 1;
        }
        if self.stderr.flush().is_err() {
            failures += 1;
        }
        self.write_failures += failures;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_writer::SharedBuffer;
    use std::{fs, io};

    struct FailingWriter;

    impl LogWriter for FailingWriter {
        fn write_text(&mut self, _: &str) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture() -> (Destinations, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let destinations = Destinations::new(Box::new(out.clone()), Box::new(err.clone()));
        (destinations, out, err)
    }

    #[test]
    fn test_dispatch_filters_and_orders() {
        let (mut destinations, out, err) = capture();
        destinations.format_stdout(LogSource::Normal, "out: {text}");
        destinations.format_stdout(LogSource::All, "all: {text}");
        destinations.format_stderr(LogSource::Error, "err: {source} {text}");
        destinations.dispatch(&LogJob::new(LogSource::Normal, "one"));
        destinations.dispatch(&LogJob::new(LogSource::Error, "two"));
        assert_eq!(out.contents(), "out: one\nall: one\nall: two\n");
        assert_eq!(err.contents(), "err: ERROR two\n");
    }

    #[test]
    fn test_format_replaces_in_place() {
        let (mut destinations, out, _) = capture();
        destinations.format_stdout(LogSource::Normal, "a {text}");
        destinations.format_stderr(LogSource::Normal, "b {text}");
        destinations.format_stdout(LogSource::Normal, "c {text}");
        assert_eq!(destinations.entries().len(), 2);
        assert_eq!(destinations.entries()[0].kind(), &DestinationKind::Stdout);
        destinations.dispatch(&LogJob::new(LogSource::Normal, "x"));
        assert_eq!(out.contents(), "c x\n");
    }

    #[test]
    fn test_raw_newline_and_stdio_echo() {
        let (mut destinations, out, _) = capture();
        destinations.format_stdout(LogSource::Normal, "[{source}] {text}");
        let mut raw = LogJob::new(LogSource::Normal, "verbatim");
        raw.raw = true;
        raw.newline = false;
        destinations.dispatch(&raw);
        // no console destination accepts Debug, stdio forces an echo
        let mut echo = LogJob::new(LogSource::Debug, "echoed");
        echo.stdio = true;
        destinations.dispatch(&echo);
        destinations.dispatch(&LogJob::new(LogSource::Debug, "dropped"));
        assert_eq!(out.contents(), "verbatimechoed\n");
    }

    #[test]
    fn test_add_log_file_failure_registers_nothing() {
        let (mut destinations, out, _) = capture();
        destinations.format_stdout(LogSource::All, "{text}");
        let result = destinations.add_log_file(
            "/nonexistent_pipelog_dir/app.log",
            LogSource::All,
            "{text}",
        );
        assert!(matches!(result, Err(PipelogError::Configuration { .. })));
        assert_eq!(destinations.entries().len(), 1);
        destinations.dispatch(&LogJob::new(LogSource::Normal, "still here"));
        assert_eq!(out.contents(), "still here\n");
    }

    #[test]
    fn test_file_destination() {
        let path = "/tmp/pipelog_test_destinations_file.log";
        fs::remove_file(path).ok();
        let (mut destinations, _, _) = capture();
        destinations
            .add_log_file(path, LogSource::Error, "{source}|{text}")
            .unwrap();
        destinations.dispatch(&LogJob::new(LogSource::Normal, "skipped"));
        destinations.dispatch(&LogJob::new(LogSource::Error, "kept"));
        destinations.flush();
        assert_eq!(fs::read_to_string(path).unwrap(), "ERROR|kept\n");
    }

    #[test]
    fn test_write_failures_are_counted() {
        let mut destinations = Destinations::new(Box::new(FailingWriter), Box::new(FailingWriter));
        destinations.format_stdout(LogSource::All, "{text}");
        destinations.format_stderr(LogSource::Error, "{text}");
        destinations.dispatch(&LogJob::new(LogSource::Error, "lost"));
        assert_eq!(destinations.write_failures(), 2);
    }
}
