use crate::data::Database;
use crate::error::Result;
use tracing::debug;
use uuid::Uuid;
use webfingerable_scanner::ProbeResult;

/// Writes one results row per finished probe.
#[derive(Clone)]
pub struct ResultSink {
    db: Database,
}

impl ResultSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn next_id() -> String {
        Uuid::now_v7().to_string()
    }

    /// Returns the id of the inserted row.
    pub fn persist_success(&self, result: &ProbeResult) -> Result<String> {
        let id = Self::next_id();
        self.db.insert_result(&id, result)?;
        debug!("<< {} {} {}", result.domain, result.status.as_str(), id);
        Ok(id)
    }

    /// Minimal error row for a probe that raised instead of returning.
    pub fn persist_failure(&self, domain: &str, cause: &str) -> Result<String> {
        let id = Self::next_id();
        self.db.insert_failure(&id, domain, cause)?;
        debug!("<< {} error {} ({})", domain, id, cause);
        Ok(id)
    }
}
