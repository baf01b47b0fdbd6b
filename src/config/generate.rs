pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# SLOWQ CONFIGURATION
# =============================================================================
# This file configures where hourly slow-query log objects are read from and
# which warehouse table parsed records are loaded into.
#
# Values support $env{VAR_NAME} expansion at load time.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/slowq/config.yml
#   3. /etc/slowq/config.yml

# =============================================================================
# SOURCE (required)
# =============================================================================
# The log export writes one object per hour under
#   {prefix}/YYYY/MM/DD/HH:00:00_HH:59:59{object_suffix}

source:
  bucket: my-log-export-bucket
  prefix: cloudsql.googleapis.com/mysql-slow.log
  # Suffix after the window's time span in the object name
  object_suffix: _S0.json
  # Storage API base URL; override for an emulator
  endpoint: https://storage.googleapis.com

# =============================================================================
# WAREHOUSE (required)
# =============================================================================
# Destination table for parsed records. Each run appends via a single
# all-or-nothing load job keyed by the window, so reruns do not duplicate rows.

warehouse:
  project: my-project
  dataset: ops
  table: slow_queries
  # Warehouse API base URL; override for an emulator
  endpoint: https://bigquery.googleapis.com
  # What to do when a window has zero matching records:
  #   skip    - do not contact the warehouse (default)
  #   submit  - submit a header-only job for an audit trail
  empty_batch: skip
  # How often to poll a submitted load job
  poll_interval: 2s
  # Per-request timeout for warehouse calls
  timeout: 30s

# =============================================================================
# FETCH (optional)
# =============================================================================
# Retry behavior for storage reads. Only transient failures are retried;
# missing objects and access denials fail immediately.

fetch:
  # Total attempts per object, counting the first
  attempts: 3
  # Backoff before the first retry; doubles per attempt
  initial_backoff: 500ms
  # Per-request timeout
  timeout: 30s

# =============================================================================
# PIPELINE (optional)
# =============================================================================

pipeline:
  # Wall-clock bound on a whole run, including load-job polling
  deadline: 5m

# =============================================================================
# AUTH (optional)
# =============================================================================
# The bearer token for both APIs is read from this environment variable.

auth:
  token_env: SLOWQ_ACCESS_TOKEN
"#
    .to_string()
}
