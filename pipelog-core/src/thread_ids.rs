use std::thread::{self, ThreadId};

use crate::mutex::MutexValue;

/// Maps thread identities to small sequential ids, in first-seen order.
///
/// Lookup is a linear scan, which is fine for the handful of threads a process
/// usually logs from. Ids are never reused.
#[derive(Debug, Default)]
pub struct ThreadIdRegistry {
    threads: MutexValue<Vec<ThreadId>>,
}

impl ThreadIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_assign(&self, thread: ThreadId) -> usize {
        let mut threads = self.threads.lock_data();
        if let Some(id) = threads.iter().position(|known| *known == thread) {
            return id;
        }
        threads.push(thread);
        threads.len() - 1
    }

    pub fn current(&self) -> usize {
        self.get_or_assign(thread::current().id())
    }

    pub fn len(&self) -> usize {
        self.threads.lock_data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
