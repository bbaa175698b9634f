// Queue Domain Model

/// Queue identifier
pub type QueueId = String;

/// Name of the queue route-map jobs are submitted to
pub const DEFAULT_QUEUE: &str = "default";

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub name: QueueId,
    /// Worker loops polling this queue inside one process
    pub max_workers: usize,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, max_workers: usize) -> Self {
        Self {
            name: name.into(),
            max_workers: max_workers.max(1),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE, 1)
    }
}
