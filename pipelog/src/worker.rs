use std::{
    path::Path,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use pipelog_core::{
    CriticalSection, Destinations, LogJob, LogSource, MutexValue, OwnedMutex, PipelogError,
    Template, ThreadIdRegistry, utils,
};

use crate::producer::LogProducer;

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

enum WorkerMessage {
    Job(Arc<LogJob>),
    Shutdown,
}

enum Lifecycle {
    Idle,
    Running {
        sender: Sender<WorkerMessage>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// State shared with the worker thread.
struct Shared {
    destinations: MutexValue<Destinations>,
    threads: ThreadIdRegistry,
}

struct Inner {
    shared: Arc<Shared>,
    lifecycle: MutexValue<Lifecycle>,
    /// Held for the whole of `wait_end` so concurrent callers all wait for the join.
    shutdown: OwnedMutex,
    flush_interval: Duration,
}

impl Inner {
    fn wait_end(&self) {
        let _serial = CriticalSection::new(&self.shutdown);
        let previous = std::mem::replace(&mut *self.lifecycle.lock_data(), Lifecycle::Stopped);
        if let Lifecycle::Running { sender, handle } = previous {
            // Every job was sent while the lifecycle lock was held in `Running`,
            // so the shutdown marker is behind all of them.
            let _ = sender.send(WorkerMessage::Shutdown);
            drop(sender);
            let _ = handle.join();
        }
        self.shared.destinations.lock_data().flush();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.wait_end();
    }
}

fn spawn_worker(shared: Arc<Shared>, flush_interval: Duration) -> (Sender<WorkerMessage>, JoinHandle<()>) {
    let (sender, receiver) = unbounded::<WorkerMessage>();
    let handle = thread::spawn(move || {
        let mut last_flush = Instant::now();
        let mut dirty = false;
        loop {
            match receiver.recv_timeout(flush_interval) {
                Ok(WorkerMessage::Job(job)) => {
                    let mut destinations = shared.destinations.lock_data();
                    destinations.dispatch(&job);
                    dirty = true;
                    // Flush periodically even under sustained load
                    if last_flush.elapsed() >= flush_interval {
                        destinations.flush();
                        last_flush = Instant::now();
                        dirty = false;
                    }
                }
                Ok(WorkerMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if dirty {
                        shared.destinations.lock_data().flush();
                        dirty = false;
                    }
                    last_flush = Instant::now();
                }
            }
        }
        shared.destinations.lock_data().flush();
    });
    (sender, handle)
}

/// The logging pipeline: a job queue drained by one background thread into an
/// ordered set of destinations.
///
/// Cloning is cheap and every clone drives the same pipeline. The worker is
/// shut down (draining the queue) by [`Pipeline::wait_end`] or when the last
/// clone is dropped. A pipeline cannot be restarted once shut down.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    pub fn new(destinations: Destinations, flush_interval: Duration) -> Self {
        utils::start_clock();
        // A zero timeout would make the idle worker spin
        let flush_interval = flush_interval.max(MIN_FLUSH_INTERVAL);
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    destinations: MutexValue::new(destinations),
                    threads: ThreadIdRegistry::new(),
                }),
                lifecycle: MutexValue::new(Lifecycle::Idle),
                shutdown: OwnedMutex::new(),
                flush_interval,
            }),
        }
    }

    /// Returns whether this call moved the pipeline from idle to running.
    fn start(&self) -> Result<bool, PipelogError> {
        let mut lifecycle = self.inner.lifecycle.lock_data();
        match *lifecycle {
            Lifecycle::Running { .. } => Ok(false),
            Lifecycle::Stopped => Err(PipelogError::Terminated),
            Lifecycle::Idle => {
                let (sender, handle) =
                    spawn_worker(Arc::clone(&self.inner.shared), self.inner.flush_interval);
                *lifecycle = Lifecycle::Running { sender, handle };
                Ok(true)
            }
        }
    }

    /// Starts the worker thread. Calling it again while running does nothing.
    pub fn init(&self) -> Result<(), PipelogError> {
        self.start().map(|_| ())
    }

    /// Starts the worker and adds a file destination accepting every category.
    /// If the pipeline is already running this does nothing, file included.
    pub fn init_with_file<P: AsRef<Path>>(
        &self,
        path: P,
        template: impl Into<Template>,
    ) -> Result<(), PipelogError> {
        if self.start()? {
            self.add_log_file(path, LogSource::All, template)?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.inner.lifecycle.lock_data(), Lifecycle::Running { .. })
    }

    /// Hands `job` to the worker. Fails with [`PipelogError::QueueUnavailable`]
    /// before [`Pipeline::init`] or after [`Pipeline::wait_end`].
    pub fn queue(&self, job: Arc<LogJob>) -> Result<(), PipelogError> {
        let lifecycle = self.inner.lifecycle.lock_data();
        match &*lifecycle {
            Lifecycle::Running { sender, .. } => sender
                .send(WorkerMessage::Job(job))
                .map_err(|_| PipelogError::QueueUnavailable),
            _ => Err(PipelogError::QueueUnavailable),
        }
    }

    /// Queues `job`, or writes it on the calling thread if the queue is not running.
    pub fn submit(&self, job: Arc<LogJob>) {
        if self.queue(Arc::clone(&job)).is_err() {
            self.do_log(&job);
        }
    }

    /// Formats and writes `job` on the calling thread, then flushes the sinks.
    /// Serialized with the worker through the destinations lock.
    pub fn do_log(&self, job: &LogJob) {
        let mut destinations = self.inner.shared.destinations.lock_data();
        destinations.dispatch(job);
        destinations.flush();
    }

    /// Drains the queue, stops the worker and waits for it to exit.
    pub fn wait_end(&self) {
        self.inner.wait_end();
    }

    pub fn format_stdout(&self, source: LogSource, template: impl Into<Template>) {
        self.inner
            .shared
            .destinations
            .lock_data()
            .format_stdout(source, template);
    }

    pub fn format_stderr(&self, source: LogSource, template: impl Into<Template>) {
        self.inner
            .shared
            .destinations
            .lock_data()
            .format_stderr(source, template);
    }

    pub fn add_log_file<P: AsRef<Path>>(
        &self,
        path: P,
        filter: LogSource,
        template: impl Into<Template>,
    ) -> Result<(), PipelogError> {
        self.inner
            .shared
            .destinations
            .lock_data()
            .add_log_file(path, filter, template)
    }

    /// Number of sink writes and flushes that failed and were dropped.
    pub fn write_failures(&self) -> u64 {
        self.inner.shared.destinations.lock_data().write_failures()
    }

    pub fn destination_count(&self) -> usize {
        self.inner.shared.destinations.lock_data().entries().len()
    }

    /// Compact id of the calling thread.
    pub fn thread_id(&self) -> usize {
        self.inner.shared.threads.current()
    }

    pub fn producer(&self, source: LogSource) -> LogProducer<'_> {
        LogProducer::new(self, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipelog_core::SharedBuffer;
    use std::{collections::HashSet, fs};

    fn capture_pipeline(template: &str) -> (Pipeline, SharedBuffer) {
        let out = SharedBuffer::new();
        let mut destinations = Destinations::new(Box::new(out.clone()), Box::new(SharedBuffer::new()));
        destinations.format_stdout(LogSource::All, template);
        (Pipeline::new(destinations, Duration::from_millis(10)), out)
    }

    #[test]
    fn test_init_is_idempotent_and_one_shot() {
        let (pipeline, _) = capture_pipeline("{text}");
        assert!(!pipeline.is_running());
        pipeline.init().unwrap();
        pipeline.init().unwrap();
        assert!(pipeline.is_running());
        pipeline.wait_end();
        assert!(!pipeline.is_running());
        assert!(matches!(pipeline.init(), Err(PipelogError::Terminated)));
        // second wait_end is a no-op
        pipeline.wait_end();
    }

    #[test]
    fn test_queue_unavailable_falls_back_to_direct_dispatch() {
        let (pipeline, out) = capture_pipeline("{text}");
        let job = Arc::new(LogJob::new(LogSource::Normal, "before init"));
        assert!(matches!(
            pipeline.queue(Arc::clone(&job)),
            Err(PipelogError::QueueUnavailable)
        ));
        pipeline.submit(job);
        pipeline.init().unwrap();
        pipeline.wait_end();
        pipeline.submit(Arc::new(LogJob::new(LogSource::Normal, "after end")));
        assert_eq!(out.contents(), "before init\nafter end\n");
    }

    #[test]
    fn test_fifo_per_thread() {
        let (pipeline, out) = capture_pipeline("{text}");
        pipeline.init().unwrap();
        for i in 0..500 {
            pipeline
                .queue(Arc::new(LogJob::new(LogSource::Normal, format!("line{i:03}"))))
                .unwrap();
        }
        pipeline.wait_end();
        let expected: Vec<String> = (0..500).map(|i| format!("line{i:03}")).collect();
        let lines: Vec<String> = out.contents().lines().map(String::from).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_concurrent_producers_no_loss_no_duplication() {
        let (pipeline, out) = capture_pipeline("{text}");
        pipeline.init().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pipeline = pipeline.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        pipeline
                            .queue(Arc::new(LogJob::new(LogSource::Normal, format!("t{t}-{i}"))))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        pipeline.wait_end();
        let contents = out.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2000);
        let unique: HashSet<&str> = lines.iter().copied().collect();
        assert_eq!(unique.len(), 2000);
    }

    #[test]
    fn test_wait_end_from_many_threads_blocks_until_drained() {
        let (pipeline, out) = capture_pipeline("{text}");
        pipeline.init().unwrap();
        for i in 0..100 {
            pipeline
                .queue(Arc::new(LogJob::new(LogSource::Normal, format!("{i}"))))
                .unwrap();
        }
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                let out = out.clone();
                thread::spawn(move || {
                    pipeline.wait_end();
                    out.contents().lines().count()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 100);
        }
    }

    #[test]
    fn test_add_log_file_failure_leaves_other_destinations() {
        let (pipeline, out) = capture_pipeline("{text}");
        pipeline.init().unwrap();
        let result = pipeline.add_log_file("/nonexistent_pipelog_dir/app.log", LogSource::All, "{text}");
        assert!(matches!(result, Err(PipelogError::Configuration { .. })));
        assert_eq!(pipeline.destination_count(), 1);
        pipeline
            .queue(Arc::new(LogJob::new(LogSource::Normal, "ok")))
            .unwrap();
        pipeline.wait_end();
        assert_eq!(out.contents(), "ok\n");
    }

    #[test]
    fn test_init_with_file() {
        let path = "/tmp/pipelog_test_init_with_file.log";
        fs::remove_file(path).ok();
        let (pipeline, _) = capture_pipeline("{text}");
        pipeline.init_with_file(path, "{source} {text}").unwrap();
        pipeline
            .queue(Arc::new(LogJob::new(LogSource::Debug, "to file")))
            .unwrap();
        pipeline.wait_end();
        assert_eq!(fs::read_to_string(path).unwrap(), "DEBUG to file\n");
    }

    #[test]
    fn test_init_with_file_twice_registers_once() {
        let path = "/tmp/pipelog_test_init_with_file_twice.log";
        fs::remove_file(path).ok();
        let (pipeline, _) = capture_pipeline("{text}");
        pipeline.init_with_file(path, "{text}").unwrap();
        pipeline.init_with_file(path, "{text}").unwrap();
        assert_eq!(pipeline.destination_count(), 2);
        pipeline
            .queue(Arc::new(LogJob::new(LogSource::Normal, "once")))
            .unwrap();
        pipeline.wait_end();
        assert_eq!(fs::read_to_string(path).unwrap(), "once\n");
    }

    #[test]
    fn test_zero_flush_interval_is_clamped() {
        let (out, err) = (SharedBuffer::new(), SharedBuffer::new());
        let destinations = Destinations::new(Box::new(out), Box::new(err));
        let pipeline = Pipeline::new(destinations, Duration::ZERO);
        assert_eq!(pipeline.inner.flush_interval, MIN_FLUSH_INTERVAL);
        pipeline.init().unwrap();
        pipeline.wait_end();
    }

    #[test]
    fn test_drop_drains_queue() {
        let path = "/tmp/pipelog_test_drop_drains.log";
        fs::remove_file(path).ok();
        {
            let (pipeline, _) = capture_pipeline("{text}");
            pipeline.init_with_file(path, "{text}").unwrap();
            for i in 0..50 {
                pipeline
                    .queue(Arc::new(LogJob::new(LogSource::Normal, format!("m{i}"))))
                    .unwrap();
            }
        }
        assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 50);
    }

    #[test]
    fn test_format_change_applies_to_later_jobs() {
        let (pipeline, out) = capture_pipeline("a:{text}");
        pipeline.do_log(&LogJob::new(LogSource::Normal, "1"));
        pipeline.format_stdout(LogSource::All, "b:{text}");
        pipeline.do_log(&LogJob::new(LogSource::Normal, "2"));
        assert_eq!(out.contents(), "a:1\nb:2\n");
        assert_eq!(pipeline.write_failures(), 0);
    }
}
