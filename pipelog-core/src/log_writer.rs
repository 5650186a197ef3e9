use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

/// A sink that formatted entries are written to.
pub trait LogWriter: Send {
    /// Writes `text` exactly as given; line endings are the caller's concern.
    fn write_text(&mut self, text: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Whether `{source}` should be rendered with terminal colors.
    fn colored(&self) -> bool {
        false
    }
}

/// Appends to a file, creating it if needed. Output is buffered until flushed.
pub struct LogFile {
    file: BufWriter<File>,
}

impl LogFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let file = File::options().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }
}

impl LogWriter for LogFile {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Default, Debug)]
pub struct LogStdout;

impl LogWriter for LogStdout {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }

    fn colored(&self) -> bool {
        true
    }
}

#[derive(Default, Debug)]
pub struct LogStderr;

impl LogWriter for LogStderr {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        io::stderr().lock().write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }

    fn colored(&self) -> bool {
        true
    }
}

/// In-memory sink whose clones share one buffer. Used to capture console output.
#[derive(Default, Debug, Clone)]
pub struct SharedBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl LogWriter for SharedBuffer {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_log_file_appends() {
    let path = "/tmp/pipelog_test_log_file.log";
    std::fs::remove_file(path).ok();
    let mut log_file = LogFile::new(path).unwrap();
    log_file.write_text("Hello, world!\n").unwrap();
    log_file.flush().unwrap();
    drop(log_file);
    let mut log_file = LogFile::new(path).unwrap();
    log_file.write_text("rust is awesome !\n").unwrap();
    log_file.flush().unwrap();
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "Hello, world!\nrust is awesome !\n"
    );
}

#[test]
fn test_log_file_unwritable_path() {
    assert!(LogFile::new("/nonexistent_pipelog_dir/sub/app.log").is_err());
}

#[test]
fn test_shared_buffer_clones_share_contents() {
    let buffer = SharedBuffer::new();
    let mut writer = buffer.clone();
    writer.write_text("a\n").unwrap();
    writer.write_text("b").unwrap();
    assert_eq!(buffer.contents(), "a\nb");
    assert!(!writer.colored());
}
