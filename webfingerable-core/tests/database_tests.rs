// Tests for the account and result store

use rusqlite::params;
use tempfile::TempDir;
use webfingerable_core::data::Database;
use webfingerable_scanner::{AccountLedger, FailureKind, ProbeResult, ProbeStatus};

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

// Separate connection so the test can rewind timestamps
fn set_checked(path: &std::path::Path, username: &str, domain: &str, at: i64) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute(
        "UPDATE accounts SET last_checked_at = ?1 WHERE username = ?2 AND domain = ?3",
        params![at, username, domain],
    )
    .unwrap();
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(Database::exists(&db_path));
}

#[test]
fn test_database_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let db = Database::new(&db_path).unwrap();
        db.insert_account("alice", "example.social").unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    assert!(db.get_account("alice", "example.social").unwrap().is_some());
}

#[test]
fn test_database_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path).unwrap();
    drop(db);

    Database::drop(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

// ============================================================================
// Account Tests
// ============================================================================

#[test]
fn test_insert_and_get_account() {
    let (_temp_dir, db) = create_test_db();

    db.insert_account("alice", "example.social").unwrap();
    let account = db.get_account("alice", "example.social").unwrap().unwrap();

    assert_eq!(account.username, "alice");
    assert_eq!(account.domain, "example.social");
    assert_eq!(account.last_checked_at, None);
    assert_eq!(account.status, None);
}

#[test]
fn test_duplicate_account_is_rejected() {
    let (_temp_dir, db) = create_test_db();

    db.insert_account("alice", "example.social").unwrap();
    assert!(db.insert_account("alice", "example.social").is_err());
    // Same username on another domain is a different account
    assert!(db.insert_account("alice", "other.social").is_ok());
}

#[test]
fn test_ensure_account() {
    let (_temp_dir, db) = create_test_db();

    assert!(db.ensure_account("alice", "example.social").unwrap());
    assert!(!db.ensure_account("alice", "example.social").unwrap());
}

#[test]
fn test_select_account_orders_by_username() {
    let (_temp_dir, db) = create_test_db();

    db.insert_account("zed", "example.social").unwrap();
    db.insert_account("bob", "example.social").unwrap();
    db.insert_account("alice", "other.social").unwrap();

    let selected = db.select_account("example.social", 1_000).unwrap();
    assert_eq!(selected.as_deref(), Some("bob"));
}

#[test]
fn test_select_account_skips_recently_checked() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();

    db.insert_account("alice", "example.social").unwrap();
    db.insert_account("bob", "example.social").unwrap();
    set_checked(&db_path, "alice", "example.social", 500);
    set_checked(&db_path, "bob", "example.social", 50);

    assert_eq!(db.select_account("example.social", 100).unwrap().as_deref(), Some("bob"));
    assert_eq!(db.select_account("example.social", 10).unwrap(), None);
    assert_eq!(db.select_account("missing.social", 100).unwrap(), None);
}

#[test]
fn test_record_check_stamps_account() {
    let (_temp_dir, db) = create_test_db();

    db.insert_account("alice", "example.social").unwrap();
    db.record_check("example.social", "alice", "not_found").unwrap();

    let account = db.get_account("alice", "example.social").unwrap().unwrap();
    assert_eq!(account.status.as_deref(), Some("not_found"));
    let checked = account.last_checked_at.unwrap();
    assert!(checked > 0);

    // Checked just now, so no longer due against an older cutoff
    assert_eq!(db.select_account("example.social", checked).unwrap(), None);
    assert_eq!(
        db.select_account("example.social", checked + 1).unwrap().as_deref(),
        Some("alice")
    );
}

#[test]
fn test_ledger_trait_uses_store() {
    let (_temp_dir, db) = create_test_db();
    db.insert_account("alice", "example.social").unwrap();

    let selected = AccountLedger::select_account(&db, "example.social", i64::MAX).unwrap();
    assert_eq!(selected.as_deref(), Some("alice"));

    AccountLedger::record_check(&db, "example.social", "alice", "ok").unwrap();
    let account = db.get_account("alice", "example.social").unwrap().unwrap();
    assert_eq!(account.status.as_deref(), Some("ok"));
}

// ============================================================================
// Domain View Tests
// ============================================================================

#[test]
fn test_domains_view_uses_latest_check() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();

    db.insert_account("alice", "example.social").unwrap();
    db.insert_account("bob", "example.social").unwrap();
    set_checked(&db_path, "alice", "example.social", 100);
    set_checked(&db_path, "bob", "example.social", 300);

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let (count, latest): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), MAX(last_checked_at) FROM domains WHERE domain = 'example.social'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(latest, 300);
}

// ============================================================================
// Result Tests
// ============================================================================

#[test]
fn test_insert_result_round_trips_fields() {
    let (_temp_dir, db) = create_test_db();

    let mut result = ProbeResult::new("example.social", "alice");
    result.status = ProbeStatus::Error;
    result.error = Some(FailureKind::DomainNotFound);

    db.insert_result("0001", &result).unwrap();

    let rows = db.get_results_for_domain("example.social").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "0001");
    assert_eq!(rows[0].status, "error");
    assert_eq!(rows[0].error.as_deref(), Some("domain_not_found"));
    assert_eq!(rows[0].webfinger_status, -1);
    assert_eq!(rows[0].hostmeta_status, -1);
    assert_eq!(rows[0].nodeinfo_status, -1);
    assert!(rows[0].updated_at > 0);
}

#[test]
fn test_result_ids_are_unique() {
    let (_temp_dir, db) = create_test_db();

    let result = ProbeResult::new("example.social", "alice");
    db.insert_result("same", &result).unwrap();
    assert!(db.insert_result("same", &result).is_err());
    assert_eq!(db.count_results().unwrap(), 1);
}

#[test]
fn test_insert_failure() {
    let (_temp_dir, db) = create_test_db();

    db.insert_failure("0002", "example.social", "Missing username for example.social")
        .unwrap();

    let rows = db.get_results_for_domain("example.social").unwrap();
    assert_eq!(rows[0].status, "error");
    assert_eq!(rows[0].actor, None);
    assert_eq!(
        rows[0].error.as_deref(),
        Some("Missing username for example.social")
    );
}
