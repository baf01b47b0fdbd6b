use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Where the hourly log objects live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Bucket holding the log export.
    pub bucket: String,

    /// Path prefix under the bucket, up to but not including the
    /// date components, e.g. `cloudsql.googleapis.com/mysql-slow.log`.
    pub prefix: String,

    /// Suffix appended after the window's time span in the object name.
    #[serde(default = "default_object_suffix")]
    pub object_suffix: String,

    /// Storage API base URL. Overridable for emulators and tests.
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,
}

/// Destination table and load-job behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub project: String,
    pub dataset: String,
    pub table: String,

    /// Warehouse API base URL. Overridable for emulators and tests.
    #[serde(default = "default_warehouse_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub empty_batch: EmptyBatchPolicy,

    /// How often to poll a submitted load job for completion.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Per-request timeout for warehouse calls.
    #[serde(default = "default_warehouse_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// What to do when a window yields zero matching records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyBatchPolicy {
    /// Skip the warehouse entirely. The default: a quiet hour is
    /// normal and a zero-row job is pure overhead.
    #[default]
    Skip,
    /// Submit a header-only load job anyway, leaving a job-id audit
    /// trail for every window.
    Submit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total attempts per object, counting the first.
    #[serde(default = "default_fetch_attempts")]
    pub attempts: usize,

    /// Backoff before the first retry; doubles per attempt.
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Per-request timeout for storage reads.
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: default_fetch_attempts(),
            initial_backoff: default_initial_backoff(),
            timeout: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wall-clock bound on a whole run, including load-job polling.
    #[serde(default = "default_deadline", with = "humantime_serde")]
    pub deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline: default_deadline(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the bearer token used for both the
    /// storage and warehouse APIs.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

fn default_object_suffix() -> String {
    "_S0.json".to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_warehouse_endpoint() -> String {
    "https://bigquery.googleapis.com".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_warehouse_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_attempts() -> usize {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_deadline() -> Duration {
    Duration::from_secs(300)
}

fn default_token_env() -> String {
    "SLOWQ_ACCESS_TOKEN".to_string()
}
