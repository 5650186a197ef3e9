use std::{path::PathBuf, thread::ThreadId};

/// Errors reported by the pipeline and its primitives.
///
/// Producer-side operations never return these; they are surfaced only by
/// configuration and lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum PipelogError {
    /// A file destination could not be opened.
    #[error("Unable to open log file {}: {source}", .path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timed lock attempt expired before the mutex was released.
    #[error("Timed out waiting for lock")]
    LockTimeout,

    /// The queue was used before `init()` or after `wait_end()`.
    #[error("Log queue is not running")]
    QueueUnavailable,

    /// `unlock()` was called by a thread that does not hold the mutex.
    #[error("Mutex is held by thread {holder:?}, not by the caller")]
    NotOwner { holder: ThreadId },

    /// The pipeline was already shut down and cannot be restarted.
    #[error("Log pipeline has been shut down")]
    Terminated,

    /// The global `log` facade already has a logger.
    #[error("Unable to install global logger: {0}")]
    SetLogger(#[from] log::SetLoggerError),
}
