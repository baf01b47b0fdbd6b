use super::{JobHandle, LoadError, LoadResult, TableReference, Warehouse};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const MULTIPART_BOUNDARY: &str = "slowq_load_boundary";

/// Thin client for a BigQuery-style load-job API. The job
/// configuration and the CSV bytes travel in one multipart/related
/// upload; the job is then polled until terminal. The token is
/// injected by the bootstrap; the endpoint is overridable for testing.
pub struct BigQueryWarehouse {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    project: String,
    poll_interval: Duration,
}

impl BigQueryWarehouse {
    pub fn new(
        endpoint: &str,
        token: &str,
        project: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
            project: project.to_string(),
            poll_interval,
        })
    }

    /// Load-job configuration: CSV source with the header row skipped,
    /// appending to the destination table. The schema is explicit
    /// rather than autodetected; the record's typing is fixed.
    fn job_config(&self, job_id: &str, table: &TableReference) -> serde_json::Value {
        json!({
            "jobReference": {
                "projectId": self.project,
                "jobId": job_id,
            },
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": table.project,
                        "datasetId": table.dataset,
                        "tableId": table.table,
                    },
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "allowQuotedNewlines": true,
                    "writeDisposition": "WRITE_APPEND",
                    "schema": {
                        "fields": [
                            { "name": "query_time", "type": "FLOAT" },
                            { "name": "lock_time", "type": "FLOAT" },
                            { "name": "rows_sent", "type": "INTEGER" },
                            { "name": "rows_examined", "type": "INTEGER" },
                            { "name": "timestamp", "type": "INTEGER" },
                            { "name": "user_host", "type": "STRING" },
                            { "name": "query", "type": "STRING" },
                        ],
                    },
                },
            },
        })
    }

    fn multipart_body(config: &serde_json::Value, csv: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(csv.len() + 512);
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{config}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: text/csv\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(csv);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        body
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn submit_load_job(
        &self,
        job_id: &str,
        table: &TableReference,
        csv: Vec<u8>,
    ) -> Result<JobHandle, LoadError> {
        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.endpoint, self.project
        );
        let body = Self::multipart_body(&self.job_config(job_id, table), &csv);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| LoadError::Request(e.to_string()))?;

        let status = response.status();
        match status {
            status if status.is_success() => Ok(JobHandle {
                job_id: job_id.to_string(),
            }),
            // The id already exists: an earlier run for this window
            // submitted it. Await that job instead of failing, which
            // is what makes reruns of a committed window no-ops.
            StatusCode::CONFLICT => {
                warn!(job_id, "load job already exists, awaiting existing job");
                Ok(JobHandle {
                    job_id: job_id.to_string(),
                })
            }
            status => {
                let detail = response.text().await.unwrap_or_default();
                Err(LoadError::JobFailed {
                    job_id: job_id.to_string(),
                    reason: format!("submit returned status {status}: {detail}"),
                })
            }
        }
    }

    async fn await_job(&self, handle: &JobHandle) -> Result<LoadResult, LoadError> {
        let url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.endpoint, self.project, handle.job_id
        );

        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| LoadError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(LoadError::JobFailed {
                    job_id: handle.job_id.clone(),
                    reason: format!("job poll returned status {}", response.status()),
                });
            }

            let job: serde_json::Value = response
                .json()
                .await
                .map_err(|e| LoadError::Request(e.to_string()))?;

            let state = job
                .pointer("/status/state")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN");
            if state != "DONE" {
                debug!(job_id = %handle.job_id, state, "load job still running");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            if let Some(error) = job.pointer("/status/errorResult") {
                let reason = error
                    .pointer("/message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unspecified error")
                    .to_string();
                return Err(LoadError::JobFailed {
                    job_id: handle.job_id.clone(),
                    reason,
                });
            }

            // The API returns the row count as a string.
            let rows_loaded = job
                .pointer("/statistics/load/outputRows")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            return Ok(LoadResult {
                job_id: handle.job_id.clone(),
                rows_loaded,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_config_declares_full_schema() {
        let warehouse = BigQueryWarehouse::new(
            "https://bigquery.googleapis.com",
            "token",
            "proj",
            Duration::from_secs(5),
            Duration::from_millis(100),
        )
        .unwrap();
        let table = TableReference {
            project: "proj".to_string(),
            dataset: "ops".to_string(),
            table: "slow_queries".to_string(),
        };

        let config = warehouse.job_config("slowq_slow_queries_20240501T13", &table);

        assert_eq!(
            config.pointer("/jobReference/jobId").unwrap(),
            "slowq_slow_queries_20240501T13"
        );
        assert_eq!(config.pointer("/configuration/load/skipLeadingRows").unwrap(), 1);
        let fields = config
            .pointer("/configuration/load/schema/fields")
            .unwrap()
            .as_array()
            .unwrap();
        let names: Vec<&str> = fields
            .iter()
            .map(|f| f.pointer("/name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "query_time",
                "lock_time",
                "rows_sent",
                "rows_examined",
                "timestamp",
                "user_host",
                "query"
            ]
        );
    }

    #[test]
    fn test_multipart_body_wraps_config_and_csv() {
        let config = json!({ "a": 1 });
        let body = BigQueryWarehouse::multipart_body(&config, b"h\r\n1\r\n");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{MULTIPART_BOUNDARY}\r\n")));
        assert!(text.contains("Content-Type: application/json"));
        assert!(text.contains("Content-Type: text/csv"));
        assert!(text.ends_with(&format!("--{MULTIPART_BOUNDARY}--\r\n")));
    }
}
