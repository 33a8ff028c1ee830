use std::time::Duration;

/// Top-level knobs for the job dispatcher (§4.9). `workers` is the only
/// one exposed on the command line; the rest are fixed by the spec.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub workers: usize,
    pub channel_capacity: usize,
    pub per_file_timeout: Duration,
}

impl EngineConfig {
    pub const DEFAULT_WORKERS: usize = 8;
    pub const CHANNEL_CAPACITY: usize = 100;
    pub const PER_FILE_TIMEOUT: Duration = Duration::from_secs(180);

    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            channel_capacity: Self::CHANNEL_CAPACITY,
            per_file_timeout: Self::PER_FILE_TIMEOUT,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WORKERS)
    }
}
