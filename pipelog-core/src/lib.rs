//! # pipelog-core
//! Core primitives for pipelog - owned mutex, thread ids, templates and sinks.

mod config;
mod destinations;
mod error;
mod job;
mod log_writer;
mod mutex;
mod template;
mod thread_ids;
pub mod utils;

pub use config::{PIPELOG_CONFIG, PipelogConfig};
pub use destinations::{Destination, DestinationKind, Destinations};
pub use error::PipelogError;
pub use job::{InfoField, LogInfo, LogJob, LogSource};
pub use log_writer::{LogFile, LogStderr, LogStdout, LogWriter, SharedBuffer};
pub use mutex::{CriticalSection, MutexValue, MutexValueGuard, OwnedMutex};
pub use template::{Placeholder, Segment, Template};
pub use thread_ids::ThreadIdRegistry;
