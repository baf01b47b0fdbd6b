pub mod gcs;

pub use gcs::GcsObjectStore;

use crate::window::LogObjectReference;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    /// The object does not exist yet, e.g. the export has not flushed
    /// the window. Not retried here: the external scheduler retries
    /// the whole run.
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    Denied(String),

    #[error("transient storage error: {0}")]
    Transient(String),

    #[error("storage request failed: {0}")]
    Permanent(String),

    #[error("fetch retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

/// Capability handed to the pipeline by the bootstrap. How the handle
/// was authenticated is not this crate's concern.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Retrieve the object's full contents: all bytes or an error,
    /// never a partial result.
    async fn fetch(&self, reference: &LogObjectReference) -> Result<Vec<u8>, FetchError>;
}

const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Wraps an object store with bounded exponential backoff on
/// transient failures. `NotFound` and permanent errors fail fast.
pub struct LogFetcher<S> {
    store: S,
    max_attempts: usize,
    initial_backoff: Duration,
}

impl<S: ObjectStore> LogFetcher<S> {
    pub fn new(store: S, max_attempts: usize, initial_backoff: Duration) -> Self {
        Self {
            store,
            max_attempts,
            initial_backoff,
        }
    }

    pub async fn fetch(&self, reference: &LogObjectReference) -> Result<Vec<u8>, FetchError> {
        let mut attempts = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.store.fetch(reference).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::Transient(reason)) => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        error!(
                            object = %reference.uri(),
                            attempts,
                            last = %reason,
                            "fetch retries exhausted"
                        );
                        return Err(FetchError::RetriesExhausted {
                            attempts,
                            last: reason,
                        });
                    }
                    warn!(
                        object = %reference.uri(),
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %reason,
                        "transient fetch failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, BACKOFF_CAP);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedStore {
        failures_before_success: usize,
        error: fn(String) -> FetchError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn fetch(&self, reference: &LogObjectReference) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err((self.error)(reference.uri()))
            } else {
                Ok(b"contents".to_vec())
            }
        }
    }

    fn reference() -> LogObjectReference {
        LogObjectReference {
            bucket: "b".to_string(),
            path: "p/2024/05/01/13:00:00_13:59:59_S0.json".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = ScriptedStore {
            failures_before_success: 2,
            error: FetchError::Transient,
            calls: AtomicUsize::new(0),
        };
        let fetcher = LogFetcher::new(store, 3, Duration::from_millis(1));

        let bytes = fetcher.fetch(&reference()).await.unwrap();
        assert_eq!(bytes, b"contents");
        assert_eq!(fetcher.store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausting_retries_surfaces_last_error() {
        let store = ScriptedStore {
            failures_before_success: usize::MAX,
            error: FetchError::Transient,
            calls: AtomicUsize::new(0),
        };
        let fetcher = LogFetcher::new(store, 3, Duration::from_millis(1));

        let err = fetcher.fetch(&reference()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(fetcher.store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_fails_fast() {
        let store = ScriptedStore {
            failures_before_success: usize::MAX,
            error: FetchError::NotFound,
            calls: AtomicUsize::new(0),
        };
        let fetcher = LogFetcher::new(store, 3, Duration::from_millis(1));

        let err = fetcher.fetch(&reference()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
        assert_eq!(fetcher.store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denied_fails_fast() {
        let store = ScriptedStore {
            failures_before_success: usize::MAX,
            error: FetchError::Denied,
            calls: AtomicUsize::new(0),
        };
        let fetcher = LogFetcher::new(store, 3, Duration::from_millis(1));

        let err = fetcher.fetch(&reference()).await.unwrap_err();
        assert!(matches!(err, FetchError::Denied(_)));
        assert_eq!(fetcher.store.calls.load(Ordering::SeqCst), 1);
    }
}
