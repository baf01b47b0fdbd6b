pub mod bigquery;

pub use bigquery::BigQueryWarehouse;

use crate::config::types::EmptyBatchPolicy;
use crate::parse::{SlowQueryRecord, COLUMNS};
use crate::window::TimeWindow;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    /// A record could not be represented in the interchange format.
    /// Should not occur given the record's typing; fatal if it does.
    #[error("failed to serialize batch to csv: {0}")]
    Serialization(#[from] csv::Error),

    #[error("failed to stage serialized batch: {0}")]
    Staging(#[from] std::io::Error),

    #[error("load job '{job_id}' failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("warehouse request failed: {0}")]
    Request(String),
}

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub job_id: String,
    pub rows_loaded: usize,
}

/// Capability handed to the pipeline by the bootstrap.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit one atomic CSV load job. `job_id` is caller-chosen;
    /// resubmitting an id must not create a second job.
    async fn submit_load_job(
        &self,
        job_id: &str,
        table: &TableReference,
        csv: Vec<u8>,
    ) -> Result<JobHandle, LoadError>;

    /// Block until the job reaches a terminal state.
    async fn await_job(&self, handle: &JobHandle) -> Result<LoadResult, LoadError>;
}

/// Serialize a batch to the CSV interchange form: a header row naming
/// the normalized columns, then one row per record. Quoting covers
/// newlines, commas, and quotes embedded in the query text. Staging is
/// purely in memory; nothing touches the filesystem.
pub fn serialize_batch(batch: &[SlowQueryRecord]) -> Result<Vec<u8>, LoadError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    if batch.is_empty() {
        // serialize() below writes the header as a side effect of the
        // first row; a degenerate batch still needs one.
        writer.write_record(COLUMNS)?;
    }
    for record in batch {
        writer.serialize(record)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| LoadError::Staging(e.into_error()))
}

/// Submits parsed batches as single all-or-nothing load jobs.
pub struct WarehouseLoader<W> {
    warehouse: W,
    table: TableReference,
    empty_batch: EmptyBatchPolicy,
}

impl<W: Warehouse> WarehouseLoader<W> {
    pub fn new(warehouse: W, table: TableReference, empty_batch: EmptyBatchPolicy) -> Self {
        Self {
            warehouse,
            table,
            empty_batch,
        }
    }

    /// Deterministic job id keyed by destination table and window
    /// start. A double-fired or rerun window resolves to the same id,
    /// so the warehouse's job dedup prevents a second commit.
    pub fn job_id(&self, window: &TimeWindow) -> String {
        format!("slowq_{}_{}", self.table.table, window.job_key())
    }

    pub async fn load(
        &self,
        window: &TimeWindow,
        batch: &[SlowQueryRecord],
    ) -> Result<LoadResult, LoadError> {
        let job_id = self.job_id(window);

        if batch.is_empty() && self.empty_batch == EmptyBatchPolicy::Skip {
            info!(job_id = %job_id, table = %self.table, "empty batch, skipping warehouse load");
            return Ok(LoadResult {
                job_id,
                rows_loaded: 0,
            });
        }

        let csv = serialize_batch(batch)?;
        debug!(
            job_id = %job_id,
            table = %self.table,
            rows = batch.len(),
            bytes = csv.len(),
            "submitting load job"
        );
        let handle = self.warehouse.submit_load_job(&job_id, &self.table, csv).await?;
        self.warehouse.await_job(&handle).await
    }
}
