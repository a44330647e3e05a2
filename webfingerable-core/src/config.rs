use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;

/// Options for configuring a verification run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub database: PathBuf,
    pub blocklist: Option<PathBuf>,
    pub page_size: usize,
    /// Upper bound on domains read in one run; `None` reads them all.
    pub quota: Option<usize>,
    /// Maximum number of probes in flight.
    pub concurrency: usize,
    /// Accounts checked more recently than this are left alone.
    pub recheck_after: Duration,
    pub request_timeout: Duration,
    /// URL scheme for probe requests.
    pub scheme: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            database: PathBuf::from("webfingerable.db"),
            blocklist: None,
            page_size: 100,
            quota: None,
            concurrency: 20,
            recheck_after: Duration::from_secs(60 * 60 * 24),
            request_timeout: Duration::from_secs(30),
            scheme: "https".to_string(),
        }
    }
}

impl RunOptions {
    /// Unix-seconds cutoff: accounts last checked before this are due.
    pub fn expiry(&self) -> i64 {
        let window = i64::try_from(self.recheck_after.as_secs()).unwrap_or(i64::MAX);
        Utc::now().timestamp().saturating_sub(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.page_size, 100);
        assert_eq!(options.concurrency, 20);
        assert_eq!(options.quota, None);
        assert_eq!(options.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_expiry_is_one_window_ago() {
        let options = RunOptions::default();
        let now = Utc::now().timestamp();
        let expiry = options.expiry();
        assert!(expiry <= now - 86_400);
        assert!(expiry >= now - 86_400 - 5);
    }

    #[test]
    fn test_huge_window_saturates() {
        let options = RunOptions {
            recheck_after: Duration::MAX,
            ..RunOptions::default()
        };
        assert!(options.expiry() < 0);
    }
}
