use crate::error::{Result, StoreError};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, named_params};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use webfingerable_scanner::{AccountLedger, ProbeResult};

/// Domains due for a check, paged by the cursor.
///
/// Domains stamped at or after `:run_started` stay in the set, so the run's
/// own bookkeeping never shifts the offsets of pages not yet read.
pub const SELECT_DOMAINS: &str = "SELECT domain FROM domains \
    WHERE last_checked_at IS NULL OR last_checked_at < :expiry \
    OR last_checked_at >= :run_started \
    ORDER BY domain LIMIT :limit OFFSET :offset";

/// Named parameters for [`SELECT_DOMAINS`].
pub fn due_domain_params(expiry: i64, run_started: i64) -> Vec<(String, Value)> {
    vec![
        (":expiry".to_string(), Value::Integer(expiry)),
        (":run_started".to_string(), Value::Integer(run_started)),
    ]
}

/// Shared handle to the SQLite store. Cheap to clone; every clone talks to
/// the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub domain: String,
    pub uri: Option<String>,
    pub url: Option<String>,
    pub last_checked_at: Option<i64>,
    pub status: Option<String>,
}

/// A persisted results row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: String,
    pub domain: String,
    pub actor: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub webfinger_status: i32,
    pub webfinger_location: Option<String>,
    pub hostmeta_status: i32,
    pub hostmeta_location: Option<String>,
    pub nodeinfo_status: i32,
    pub updated_at: i64,
}

/// Unix seconds, the unit of `last_checked_at`.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

impl Database {
    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        // Workers write concurrently
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
    username TEXT NOT NULL,
    domain TEXT NOT NULL,
    uri TEXT,
    url TEXT,
    last_checked_at INTEGER,  -- unix seconds
    status TEXT,
    PRIMARY KEY (username, domain)
);

CREATE INDEX IF NOT EXISTS idx_accounts_domain ON accounts(domain, last_checked_at);

CREATE TABLE IF NOT EXISTS results (
    id TEXT PRIMARY KEY,      -- uuid v7, sorts by creation time
    domain TEXT NOT NULL,
    actor TEXT,
    status TEXT NOT NULL CHECK(status IN ('ok', 'error', 'unknown')),
    error TEXT,
    webfinger_status INTEGER NOT NULL DEFAULT -1,
    webfinger_location TEXT,
    hostmeta_status INTEGER NOT NULL DEFAULT -1,
    hostmeta_location TEXT,
    nodeinfo_status INTEGER NOT NULL DEFAULT -1,
    nodeinfo TEXT,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);

CREATE INDEX IF NOT EXISTS idx_results_domain ON results(domain);

CREATE VIEW IF NOT EXISTS domains AS
    SELECT domain, MAX(last_checked_at) AS last_checked_at
    FROM accounts
    GROUP BY domain;
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Check that `query` compiles against the current schema.
    pub fn prepare_check(&self, query: &str) -> Result<()> {
        self.lock()?.prepare_cached(query)?;
        Ok(())
    }

    /// Run a paged query: `params` plus `:limit`/`:offset`.
    pub fn fetch_page<T>(
        &self,
        query: &str,
        params: &[(String, Value)],
        limit: usize,
        offset: usize,
        map_row: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let limit = limit as i64;
        let offset = offset as i64;

        let mut bound: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();
        bound.push((":limit", &limit));
        bound.push((":offset", &offset));

        debug!("Fetching page limit={} offset={}", limit, offset);

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(query)?;
        let rows = stmt
            .query_map(bound.as_slice(), map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    // Account operations
    pub fn insert_account(&self, username: &str, domain: &str) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO accounts (username, domain) VALUES (:username, :domain)",
            named_params! { ":username": username, ":domain": domain },
        )?;
        Ok(())
    }

    /// Insert the account unless it already exists. Returns true if inserted.
    pub fn ensure_account(&self, username: &str, domain: &str) -> Result<bool> {
        let inserted = self.lock()?.execute(
            "INSERT OR IGNORE INTO accounts (username, domain) VALUES (:username, :domain)",
            named_params! { ":username": username, ":domain": domain },
        )?;
        Ok(inserted > 0)
    }

    pub fn get_account(&self, username: &str, domain: &str) -> Result<Option<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT username, domain, uri, url, last_checked_at, status
             FROM accounts WHERE domain = :domain AND username = :username",
        )?;

        let account = stmt
            .query_row(named_params! { ":domain": domain, ":username": username }, |row| {
                Ok(Account {
                    username: row.get(0)?,
                    domain: row.get(1)?,
                    uri: row.get(2)?,
                    url: row.get(3)?,
                    last_checked_at: row.get(4)?,
                    status: row.get(5)?,
                })
            })
            .optional()?;
        Ok(account)
    }

    pub fn select_account(&self, domain: &str, expiry: i64) -> Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT username FROM accounts
             WHERE domain = :domain AND (last_checked_at IS NULL OR last_checked_at < :expiry)
             ORDER BY username LIMIT 1",
        )?;

        let username = stmt
            .query_row(named_params! { ":domain": domain, ":expiry": expiry }, |row| row.get(0))
            .optional()?;
        Ok(username)
    }

    pub fn record_check(&self, domain: &str, username: &str, status: &str) -> Result<()> {
        self.lock()?.execute(
            "UPDATE accounts SET status = :status, last_checked_at = :now
             WHERE domain = :domain AND username = :username",
            named_params! {
                ":status": status,
                ":now": current_timestamp(),
                ":domain": domain,
                ":username": username,
            },
        )?;
        Ok(())
    }

    // Result operations
    pub fn insert_result(&self, id: &str, result: &ProbeResult) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO results (
                id, domain, actor, status, error, webfinger_status, webfinger_location,
                hostmeta_status, hostmeta_location, nodeinfo_status, nodeinfo
            ) VALUES (
                :id, :domain, :actor, :status, :error, :webfinger_status, :webfinger_location,
                :hostmeta_status, :hostmeta_location, :nodeinfo_status, :nodeinfo
            )",
            named_params! {
                ":id": id,
                ":domain": &result.domain,
                ":actor": &result.actor,
                ":status": result.status.as_str(),
                ":error": result.error.map(|kind| kind.as_str()),
                ":webfinger_status": result.webfinger_status,
                ":webfinger_location": &result.webfinger_location,
                ":hostmeta_status": result.hostmeta_status,
                ":hostmeta_location": &result.hostmeta_location,
                ":nodeinfo_status": result.nodeinfo_status,
                ":nodeinfo": &result.nodeinfo,
            },
        )?;
        Ok(())
    }

    pub fn insert_failure(&self, id: &str, domain: &str, error: &str) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO results (id, domain, status, error) VALUES (:id, :domain, 'error', :error)",
            named_params! { ":id": id, ":domain": domain, ":error": error },
        )?;
        Ok(())
    }

    pub fn get_results_for_domain(&self, domain: &str) -> Result<Vec<StoredResult>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, domain, actor, status, error, webfinger_status, webfinger_location,
                    hostmeta_status, hostmeta_location, nodeinfo_status, updated_at
             FROM results WHERE domain = :domain ORDER BY id",
        )?;

        let results = stmt
            .query_map(named_params! { ":domain": domain }, |row| {
                Ok(StoredResult {
                    id: row.get(0)?,
                    domain: row.get(1)?,
                    actor: row.get(2)?,
                    status: row.get(3)?,
                    error: row.get(4)?,
                    webfinger_status: row.get(5)?,
                    webfinger_location: row.get(6)?,
                    hostmeta_status: row.get(7)?,
                    hostmeta_location: row.get(8)?,
                    nodeinfo_status: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(results)
    }

    pub fn count_results(&self) -> Result<i64> {
        let count = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl AccountLedger for Database {
    type Error = StoreError;

    fn select_account(&self, domain: &str, expiry: i64) -> Result<Option<String>> {
        Database::select_account(self, domain, expiry)
    }

    fn record_check(&self, domain: &str, username: &str, status: &str) -> Result<()> {
        Database::record_check(self, domain, username, status)
    }
}
