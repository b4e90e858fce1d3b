use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Squad-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetch: FetchConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub job: Vec<JobConfig>,
}

/// Fetch layer configuration: retries, timeouts and backoff bases
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Maximum attempts per logical request
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of idle sessions kept in the pool
    #[serde(rename = "pool-size", default = "default_pool_size")]
    pub pool_size: usize,

    /// Base backoff for HTTP 429 responses (seconds)
    #[serde(rename = "rate-limit-delay-secs", default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: u64,

    /// Base backoff for HTTP 403 responses (seconds)
    #[serde(rename = "block-delay-secs", default = "default_block_delay")]
    pub block_delay_secs: u64,

    /// Base backoff for transient errors (seconds)
    #[serde(rename = "error-delay-secs", default = "default_error_delay")]
    pub error_delay_secs: u64,

    /// Cap applied to any single backoff sleep (seconds)
    #[serde(rename = "max-delay-secs", default = "default_max_delay")]
    pub max_delay_secs: u64,
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

/// Progress hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressConfig {
    /// Capacity of the internal publish queue
    #[serde(rename = "queue-size", default = "default_queue_size")]
    pub queue_size: usize,

    /// Capacity of each subscriber's delivery channel
    #[serde(rename = "subscriber-buffer", default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Default minimum interval between events for one (job, item) pair
    #[serde(rename = "min-interval-ms", default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Consecutive failed deliveries before a subscriber is dropped
    #[serde(rename = "max-strikes", default = "default_max_strikes")]
    pub max_strikes: u32,

    /// Interval between keepalive pings to subscribers (seconds)
    #[serde(rename = "heartbeat-secs", default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Drop a subscriber after this long without a keepalive (seconds)
    #[serde(
        rename = "keepalive-timeout-secs",
        default = "default_keepalive_timeout_secs"
    )]
    pub keepalive_timeout_secs: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            subscriber_buffer: default_subscriber_buffer(),
            min_interval_ms: default_min_interval_ms(),
            max_strikes: default_max_strikes(),
            heartbeat_secs: default_heartbeat_secs(),
            keepalive_timeout_secs: default_keepalive_timeout_secs(),
        }
    }
}

/// Per-job-kind configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Job kind, the name used by the cancel registry and progress hub
    pub kind: String,

    /// Path to the JSON file listing crawl targets for this job
    #[serde(rename = "targets-path")]
    pub targets_path: String,

    /// Path to the JSON checkpoint store for this job
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Number of concurrent workers (keep small, sites differ in tolerance)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Persist the checkpoint store every N completed items
    #[serde(rename = "save-every", default = "default_save_every")]
    pub save_every: usize,

    /// Override of the progress rate-limit interval for this job (ms)
    #[serde(rename = "min-interval-ms")]
    pub min_interval_ms: Option<u64>,
}

fn default_workers() -> usize {
    1
}

fn default_save_every() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    45
}

fn default_pool_size() -> usize {
    6
}

fn default_rate_limit_delay() -> u64 {
    20
}

fn default_block_delay() -> u64 {
    30
}

fn default_error_delay() -> u64 {
    5
}

fn default_max_delay() -> u64 {
    120
}

fn default_queue_size() -> usize {
    1024
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_min_interval_ms() -> u64 {
    100
}

fn default_max_strikes() -> u32 {
    3
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_keepalive_timeout_secs() -> u64 {
    90
}
