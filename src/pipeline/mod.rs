use crate::config::types::SourceConfig;
use crate::config::ConfigError;
use crate::fetch::{FetchError, LogFetcher, ObjectStore};
use crate::load::{LoadError, Warehouse, WarehouseLoader};
use crate::parse::{ParseError, RecordParser};
use crate::window::{resolve, LogObjectReference, TimeWindow};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("run exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    /// Process exit code per failure stage, so the external scheduler
    /// can distinguish them without parsing log output.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 2,
            RunError::Fetch(_) => 3,
            RunError::Parse(_) => 4,
            RunError::Load(_) => 5,
            RunError::DeadlineExceeded(_) => 6,
            RunError::Cancelled => 130,
        }
    }
}

/// What one run did, for the final log line and for tests.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub window: TimeWindow,
    pub object: LogObjectReference,
    pub entries_seen: usize,
    pub no_payload: usize,
    pub dropped: usize,
    pub records: usize,
    pub rows_loaded: usize,
    pub job_id: String,
}

/// Sequential fetch-parse-load orchestration for one hourly window.
/// Stages run strictly in order; a stage failure aborts the run before
/// the warehouse is touched, so a failed run commits nothing.
pub struct Pipeline<S, W> {
    source: SourceConfig,
    fetcher: LogFetcher<S>,
    parser: RecordParser,
    loader: WarehouseLoader<W>,
    deadline: Duration,
}

impl<S: ObjectStore, W: Warehouse> Pipeline<S, W> {
    pub fn new(
        source: SourceConfig,
        fetcher: LogFetcher<S>,
        loader: WarehouseLoader<W>,
        deadline: Duration,
    ) -> Self {
        Self {
            source,
            fetcher,
            parser: RecordParser::new(),
            loader,
            deadline,
        }
    }

    /// Process the fully elapsed hour preceding `now`, bounded by the
    /// configured deadline.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        let window = TimeWindow::preceding(now);
        match tokio::time::timeout(self.deadline, self.run_window(window)).await {
            Ok(result) => result,
            Err(_) => Err(RunError::DeadlineExceeded(self.deadline)),
        }
    }

    async fn run_window(&self, window: TimeWindow) -> Result<RunReport, RunError> {
        let object = resolve(&window, &self.source);
        info!(
            window_start = %window.start(),
            window_end = %window.end(),
            object = %object.uri(),
            "starting run"
        );

        let bytes = self.fetcher.fetch(&object).await?;
        let (records, summary) = self.parser.parse(&bytes)?;

        // Counts are logged before the load so a load failure still
        // leaves the parse outcome on record.
        info!(
            entries_seen = summary.entries_seen,
            no_payload = summary.no_payload,
            dropped = summary.dropped,
            records = records.len(),
            "parsed log object"
        );

        let result = self.loader.load(&window, &records).await?;
        info!(
            job_id = %result.job_id,
            rows_loaded = result.rows_loaded,
            "run complete"
        );

        Ok(RunReport {
            window,
            object,
            entries_seen: summary.entries_seen,
            no_payload: summary.no_payload,
            dropped: summary.dropped,
            records: records.len(),
            rows_loaded: result.rows_loaded,
            job_id: result.job_id,
        })
    }
}
