use std::{sync::LazyLock, time::Duration};

use derive_from_env::FromEnv;

#[derive(FromEnv)]
#[from_env(prefix = "PIPELOG")]
#[allow(non_snake_case)]
pub struct PipelogConfig {
    #[from_env(default = "100")]
    pub FLUSH_INTERVAL_MS: u64,
}

impl PipelogConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.FLUSH_INTERVAL_MS.max(1))
    }
}

pub static PIPELOG_CONFIG: LazyLock<PipelogConfig> = LazyLock::new(|| {
    PipelogConfig::from_env().expect("Invalid PIPELOG_* environment configuration")
});
