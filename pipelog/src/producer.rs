use std::{
    fmt::{self, Display, Write},
    sync::Arc,
};

use pipelog_core::{InfoField, LogInfo, LogJob, LogSource, utils};

use crate::worker::Pipeline;

/// Flags that change how a [`LogProducer`] emits its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerFlag {
    /// Emit the entry now.
    Flush,
    /// Append a line break to the text.
    NewLine,
    /// Append a line break, then emit.
    FlushLine,
    /// Do not terminate the written entry with a line break.
    NoNewline,
    /// Write the text verbatim, skipping destination templates.
    Raw,
    /// Echo to stdout even if no console destination takes this category.
    Stdio,
    /// Format and write on the calling thread instead of queueing.
    ThisThread,
}

/// Builds one log entry on the calling thread.
///
/// Text is accumulated with [`LogProducer::append`] (or `write!`) and emitted by
/// [`LogProducer::flush`]. Anything appended but not flushed is emitted when the
/// producer is dropped. Never fails: sink errors are absorbed by the pipeline.
pub struct LogProducer<'a> {
    pipeline: &'a Pipeline,
    source: LogSource,
    buffer: String,
    info: LogInfo,
    stdio: bool,
    newline: bool,
    raw: bool,
    this_thread: bool,
    pending: bool,
}

impl<'a> LogProducer<'a> {
    pub fn new(pipeline: &'a Pipeline, source: LogSource) -> Self {
        Self {
            pipeline,
            source,
            buffer: String::new(),
            info: LogInfo::default(),
            stdio: false,
            newline: true,
            raw: false,
            this_thread: false,
            pending: false,
        }
    }

    pub fn append(&mut self, value: impl Display) -> &mut Self {
        let _ = write!(self.buffer, "{value}");
        self.pending = true;
        self
    }

    /// Appends `bytes` as two-digit hexadecimal pairs.
    pub fn append_hex(&mut self, bytes: &[u8]) -> &mut Self {
        self.append(utils::hex_pairs(bytes))
    }

    /// Appends `value` in `base`, zero-padded to `width`.
    pub fn append_num(&mut self, value: u64, base: u32, width: usize) -> &mut Self {
        self.append(utils::format_radix(value, base, width))
    }

    /// Sets a metadata field explicitly; it will not be overwritten on flush.
    pub fn with_info(&mut self, field: InfoField, value: impl Into<String>) -> &mut Self {
        self.info.set(field, value);
        self
    }

    pub fn apply(&mut self, flag: ProducerFlag) -> &mut Self {
        match flag {
            ProducerFlag::Flush => self.flush(),
            ProducerFlag::NewLine => {
                self.append('\n');
            }
            ProducerFlag::FlushLine => {
                self.append('\n');
                self.flush();
            }
            ProducerFlag::NoNewline => self.newline = false,
            ProducerFlag::Raw => self.raw = true,
            ProducerFlag::Stdio => self.stdio = true,
            ProducerFlag::ThisThread => self.this_thread = true,
        }
        self
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Takes the accumulated text without emitting it.
    pub fn pull_buffer(&mut self) -> String {
        self.pending = false;
        std::mem::take(&mut self.buffer)
    }

    /// Seals the metadata and emits the accumulated text as one entry.
    pub fn flush(&mut self) {
        let mut info = self.info.clone();
        info.fill_with(InfoField::Clock, utils::clock);
        info.fill_with(InfoField::Date, utils::date);
        info.fill_with(InfoField::Time, utils::time);
        info.fill_with(InfoField::Thread, || self.pipeline.thread_id().to_string());
        let job = LogJob {
            source: self.source,
            stdio: self.stdio,
            newline: self.newline,
            raw: self.raw,
            text: std::mem::take(&mut self.buffer),
            info,
        };
        self.pending = false;
        if self.this_thread {
            self.pipeline.do_log(&job);
        } else {
            self.pipeline.submit(Arc::new(job));
        }
    }
}

impl Write for LogProducer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s);
        Ok(())
    }
}

impl Drop for LogProducer<'_> {
    fn drop(&mut self) {
        if self.pending {
            self.flush();
        }
    }
}
