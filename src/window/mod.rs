use crate::config::types::SourceConfig;
use chrono::{DateTime, Utc};

/// Hour-aligned half-open interval `[start, start + 1h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
}

impl TimeWindow {
    /// The whole hour behind `now`: `floor_to_hour(now - 1h)`.
    ///
    /// The log export flushes an object per hour, so the hour that just
    /// closed is the newest one guaranteed to exist.
    pub fn preceding(now: DateTime<Utc>) -> Self {
        let shifted = now - chrono::Duration::hours(1);
        let secs = shifted.timestamp();
        let floored = secs - secs.rem_euclid(3600);
        Self {
            start: DateTime::from_timestamp(floored, 0)
                .expect("hour-aligned timestamp is representable"),
        }
    }

    /// Inclusive start of the window.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive end of the window.
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::hours(1)
    }

    /// Compact identifier for keying load jobs, e.g. `20240501T13`.
    pub fn job_key(&self) -> String {
        self.start.format("%Y%m%dT%H").to_string()
    }
}

/// Location of one exported log object. Fully determined by the window
/// and the source configuration; immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogObjectReference {
    pub bucket: String,
    pub path: String,
}

impl LogObjectReference {
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.path)
    }
}

/// Canonical object path for the window's log segment:
/// `{prefix}/YYYY/MM/DD/HH:00:00_HH:59:59{suffix}`.
///
/// Pure and deterministic. Malformed configuration (empty bucket or
/// prefix) is rejected at startup, before this runs.
pub fn resolve(window: &TimeWindow, source: &SourceConfig) -> LogObjectReference {
    let start = window.start();
    let date = start.format("%Y/%m/%d");
    let hour = start.format("%H");
    let path = format!(
        "{}/{}/{}:00:00_{}:59:59{}",
        source.prefix.trim_end_matches('/'),
        date,
        hour,
        hour,
        source.object_suffix
    );
    LogObjectReference {
        bucket: source.bucket.clone(),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> SourceConfig {
        SourceConfig {
            bucket: "log-export".to_string(),
            prefix: "cloudsql.googleapis.com/mysql-slow.log".to_string(),
            object_suffix: "_S0.json".to_string(),
            endpoint: "https://storage.googleapis.com".to_string(),
        }
    }

    #[test]
    fn test_preceding_is_one_hour_behind_and_aligned() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 37, 12).unwrap();
        let window = TimeWindow::preceding(now);

        assert_eq!(window.start(), Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());
        assert_eq!(window.end(), Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_preceding_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 37, 12).unwrap();
        assert_eq!(TimeWindow::preceding(now), TimeWindow::preceding(now));
    }

    #[test]
    fn test_preceding_exactly_on_the_hour() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
        let window = TimeWindow::preceding(now);
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_preceding_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 30, 0).unwrap();
        let window = TimeWindow::preceding(now);
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2024, 4, 30, 23, 0, 0).unwrap());

        let reference = resolve(&window, &source());
        assert_eq!(
            reference.path,
            "cloudsql.googleapis.com/mysql-slow.log/2024/04/30/23:00:00_23:59:59_S0.json"
        );
    }

    #[test]
    fn test_resolve_path_shape() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 37, 12).unwrap();
        let window = TimeWindow::preceding(now);
        let reference = resolve(&window, &source());

        assert_eq!(reference.bucket, "log-export");
        assert_eq!(
            reference.path,
            "cloudsql.googleapis.com/mysql-slow.log/2024/05/01/13:00:00_13:59:59_S0.json"
        );
        assert_eq!(
            reference.uri(),
            "gs://log-export/cloudsql.googleapis.com/mysql-slow.log/2024/05/01/13:00:00_13:59:59_S0.json"
        );
    }

    #[test]
    fn test_resolve_trims_trailing_prefix_slash() {
        let mut cfg = source();
        cfg.prefix = "cloudsql.googleapis.com/mysql-slow.log/".to_string();
        let window = TimeWindow::preceding(Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap());
        let reference = resolve(&window, &cfg);
        assert!(!reference.path.contains("//"));
    }

    #[test]
    fn test_job_key() {
        let window = TimeWindow::preceding(Utc.with_ymd_and_hms(2024, 5, 1, 14, 10, 0).unwrap());
        assert_eq!(window.job_key(), "20240501T13");
    }
}
