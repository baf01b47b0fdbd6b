use super::{FetchError, ObjectStore};
use crate::window::LogObjectReference;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Thin client for a GCS-style JSON API (`alt=media` object reads).
/// The bearer token is injected by the bootstrap; obtaining it is the
/// caller's concern. The endpoint is overridable for testing.
pub struct GcsObjectStore {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GcsObjectStore {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Permanent(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn object_url(&self, reference: &LogObjectReference) -> Result<reqwest::Url, FetchError> {
        let base = format!("{}/storage/v1/b/{}/o/", self.endpoint, reference.bucket);
        let mut url =
            reqwest::Url::parse(&base).map_err(|e| FetchError::Permanent(e.to_string()))?;
        // The object name is one path segment; Url percent-encodes the
        // embedded slashes.
        url.path_segments_mut()
            .map_err(|_| FetchError::Permanent(format!("endpoint cannot carry a path: {base}")))?
            .pop_if_empty()
            .push(&reference.path);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn fetch(&self, reference: &LogObjectReference) -> Result<Vec<u8>, FetchError> {
        let url = self.object_url(reference)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        match status {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::Transient(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(reference.uri())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(FetchError::Denied(reference.uri()))
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Err(
                FetchError::Transient(format!("status {status} for {}", reference.uri())),
            ),
            status if status.is_server_error() => Err(FetchError::Transient(format!(
                "status {status} for {}",
                reference.uri()
            ))),
            status => Err(FetchError::Permanent(format!(
                "status {status} for {}",
                reference.uri()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_encodes_name_as_single_segment() {
        let store = GcsObjectStore::new(
            "https://storage.googleapis.com",
            "token",
            Duration::from_secs(5),
        )
        .unwrap();
        let url = store
            .object_url(&LogObjectReference {
                bucket: "log-export".to_string(),
                path: "cloudsql.googleapis.com/mysql-slow.log/2024/05/01/13:00:00_13:59:59_S0.json"
                    .to_string(),
            })
            .unwrap();

        assert_eq!(url.host_str(), Some("storage.googleapis.com"));
        assert!(url.path().starts_with("/storage/v1/b/log-export/o/"));
        // Slashes inside the object name are escaped, not segments.
        assert!(url.path().contains("%2F"));
        assert_eq!(url.query(), Some("alt=media"));
    }

    #[test]
    fn test_trailing_endpoint_slash_is_tolerated() {
        let store =
            GcsObjectStore::new("http://localhost:8080/", "token", Duration::from_secs(5)).unwrap();
        let url = store
            .object_url(&LogObjectReference {
                bucket: "b".to_string(),
                path: "p.json".to_string(),
            })
            .unwrap();
        assert_eq!(url.path(), "/storage/v1/b/b/o/p.json");
    }
}
