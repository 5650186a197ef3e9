use pipelog::{InfoField, LogSource, ProducerFlag, pipeline_config, utils};

fn main() {
    utils::start_clock();
    let log_path = std::env::temp_dir().join(utils::log_file_name("pipelog_threads_"));
    let pipeline = pipeline_config()
        .with_stdout_format(LogSource::Normal, "{time} [{thread}] {text}")
        .with_log_file(&log_path, LogSource::All, "{date} {clock} #{thread} {source} {text}")
        .build()
        .expect("Unable to create log file");
    pipeline.init().unwrap();

    pipeline
        .producer(LogSource::Normal)
        .with_info(InfoField::Thread, "main")
        .append("Hello, world!");

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || {
                for j in 0..3 {
                    pipeline
                        .producer(LogSource::Normal)
                        .append(format!("message {j} from thread {i}"));
                }
                pipeline
                    .producer(LogSource::Error)
                    .append("payload: ")
                    .append_hex(&[i as u8, 0xff]);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // written before this call returns, not queued
    pipeline
        .producer(LogSource::Normal)
        .apply(ProducerFlag::ThisThread)
        .append("all threads joined");

    pipeline.wait_end();
    println!(
        "last line of {} is:\n\t{}",
        log_path.display(),
        std::fs::read_to_string(&log_path)
            .unwrap()
            .trim_end()
            .lines()
            .last()
            .unwrap()
    );
}
