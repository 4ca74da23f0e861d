//! Test Utilities Module
//!
//! Shared test infrastructure for unit and integration tests of the scorecard
//! API. Enable via the `test-utils` feature flag.
//!
//! - `TestStore`: Temporary file-backed scoring store with automatic cleanup
//! - `test_connection`: In-memory store, schema applied and fixtures seeded
//! - `seed_fixtures`: Two projects with a small, hand-checked scoring dataset
//!
//! # Fixture scores (project `DEFAULT`, no criteria)
//!
//! | Score | Value |
//! |---|---|
//! | total | 82 |
//! | CDE | 93.3 |
//! | profiling | 90 |
//! | testing | 76.7 |
//!
//! # Usage
//!
//! ```rust,ignore
//! use dq_scorecard_api::test_utils::TestStore;
//!
//! #[tokio::test]
//! async fn test_health() {
//!     let store = TestStore::seeded().await.unwrap();
//!     let app = store.router();
//!     // drive `app` with tower::ServiceExt::oneshot
//! }
//! ```

use axum::Router;
use dq_scorecard_core::{init_sqlite_schema, Result, ScorecardError};
use dq_scorecard_storage::{LocalSqliteBackend, ScoringBackend};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

use crate::{build_router, AppState};

/// Project holding the scoring fixtures.
pub const DEFAULT_PROJECT: &str = "DEFAULT";

/// Second project, used to check that queries stay inside their project.
pub const OTHER_PROJECT: &str = "OTHER";

// ============================================================================
// Test Store
// ============================================================================

/// A scoring store in a temporary directory, deleted when dropped.
pub struct TestStore {
    _temp_dir: TempDir,
    db_path: PathBuf,
    backend: Arc<LocalSqliteBackend>,
}

impl TestStore {
    /// Create and initialize an empty store.
    pub async fn new() -> Result<Self> {
        let temp_dir = tempdir()
            .map_err(|e| ScorecardError::Other(format!("Failed to create temp dir: {}", e)))?;
        let db_path = temp_dir.path().join("test_scorecard.db");
        let backend = Arc::new(LocalSqliteBackend::new(&db_path));
        backend.initialize().await?;

        Ok(Self {
            _temp_dir: temp_dir,
            db_path,
            backend,
        })
    }

    /// Create a store and load [`seed_fixtures`] into it.
    pub async fn seeded() -> Result<Self> {
        let store = Self::new().await?;
        let conn = store.backend.get_connection().await?;
        tokio::task::spawn_blocking(move || seed_fixtures(&conn))
            .await
            .map_err(|e| ScorecardError::Other(format!("Task join error: {}", e)))??;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.backend.clone())
    }

    /// Full application router over this store.
    pub fn router(&self) -> Router {
        build_router(self.state())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Open an in-memory store with the schema and fixtures applied.
///
/// Panics on failure; intended for unit tests only.
pub fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory store");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("enable foreign keys");
    init_sqlite_schema(&conn).expect("initialize store");
    seed_fixtures(&conn).expect("seed fixtures");
    conn
}

struct ScoringRow {
    source: &'static str,
    project_code: &'static str,
    table_groups_id: &'static str,
    table_groups_name: &'static str,
    table_name: &'static str,
    column_name: &'static str,
    dq_dimension: &'static str,
    data_source: &'static str,
    business_domain: Option<&'static str>,
    cde: bool,
    record_ct: i64,
    issue_ct: i64,
    good_data_pct: f64,
}

const SCORING_ROWS: &[ScoringRow] = &[
    ScoringRow {
        source: "profile",
        project_code: DEFAULT_PROJECT,
        table_groups_id: "tg-sales",
        table_groups_name: "sales",
        table_name: "orders",
        column_name: "id",
        dq_dimension: "Completeness",
        data_source: "postgres",
        business_domain: Some("commerce"),
        cde: true,
        record_ct: 100,
        issue_ct: 0,
        good_data_pct: 1.0,
    },
    ScoringRow {
        source: "profile",
        project_code: DEFAULT_PROJECT,
        table_groups_id: "tg-sales",
        table_groups_name: "sales",
        table_name: "orders",
        column_name: "amount",
        dq_dimension: "Validity",
        data_source: "postgres",
        business_domain: Some("commerce"),
        cde: false,
        record_ct: 100,
        issue_ct: 2,
        good_data_pct: 0.8,
    },
    ScoringRow {
        source: "test",
        project_code: DEFAULT_PROJECT,
        table_groups_id: "tg-sales",
        table_groups_name: "sales",
        table_name: "customers",
        column_name: "email",
        dq_dimension: "Validity",
        data_source: "Snowflake",
        business_domain: Some("marketing"),
        cde: true,
        record_ct: 200,
        issue_ct: 5,
        good_data_pct: 0.9,
    },
    ScoringRow {
        source: "test",
        project_code: DEFAULT_PROJECT,
        table_groups_id: "tg-finance",
        table_groups_name: "Finance",
        table_name: "ledger",
        column_name: "entry_id",
        dq_dimension: "Accuracy",
        data_source: "oracle",
        business_domain: None,
        cde: false,
        record_ct: 100,
        issue_ct: 10,
        good_data_pct: 0.5,
    },
    ScoringRow {
        source: "profile",
        project_code: OTHER_PROJECT,
        table_groups_id: "tg-other",
        table_groups_name: "other",
        table_name: "events",
        column_name: "id",
        dq_dimension: "Completeness",
        data_source: "mysql",
        business_domain: None,
        cde: false,
        record_ct: 10,
        issue_ct: 0,
        good_data_pct: 1.0,
    },
];

/// Load the fixture projects, column hierarchy, scoring rows and issues.
pub fn seed_fixtures(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        INSERT INTO projects (project_code, project_name) VALUES
          ('DEFAULT', 'Default project'),
          ('OTHER', 'Other project');

        INSERT INTO table_groups (id, project_code, table_groups_name) VALUES
          ('tg-sales', 'DEFAULT', 'sales'),
          ('tg-finance', 'DEFAULT', 'Finance'),
          ('tg-other', 'OTHER', 'other');

        INSERT INTO data_column_chars
          (column_id, table_groups_id, table_id, table_name, column_name, ordinal_position)
        VALUES
          ('col-orders-id', 'tg-sales', 'tbl-orders', 'orders', 'id', 1),
          ('col-orders-amount', 'tg-sales', 'tbl-orders', 'orders', 'amount', 2),
          ('col-customers-email', 'tg-sales', 'tbl-customers', 'customers', 'email', 1),
          ('col-ledger-entry', 'tg-finance', 'tbl-ledger', 'ledger', 'entry_id', 1),
          ('col-events-id', 'tg-other', 'tbl-events', 'events', 'id', 1);
        "#,
    )?;

    let mut insert = conn.prepare(
        "INSERT INTO column_scoring_results
           (source, project_code, table_groups_id, table_groups_name, table_name, column_name,
            dq_dimension, data_source, business_domain, critical_data_element,
            record_ct, issue_ct, good_data_pct)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for row in SCORING_ROWS {
        insert.execute(params![
            row.source,
            row.project_code,
            row.table_groups_id,
            row.table_groups_name,
            row.table_name,
            row.column_name,
            row.dq_dimension,
            row.data_source,
            row.business_domain,
            row.cde,
            row.record_ct,
            row.issue_ct,
            row.good_data_pct,
        ])?;
    }

    conn.execute_batch(
        r#"
        INSERT INTO scoring_issues
          (id, source, project_code, table_groups_id, table_groups_name, table_name,
           column_name, data_source, critical_data_element, issue_type, status, detail,
           detected_at)
        VALUES
          ('i1', 'test', 'DEFAULT', 'tg-sales', 'sales', 'customers', 'email',
           'Snowflake', 1, 'Pattern Mismatch', 'Failed', '12 values do not match', 1700000200),
          ('i2', 'profile', 'DEFAULT', 'tg-sales', 'sales', 'orders', 'amount',
           'postgres', 0, 'Suspect Outliers', 'Warning', 'Values above 3 sigma', 1700000100),
          ('i3', 'test', 'DEFAULT', 'tg-finance', 'Finance', 'ledger', 'entry_id',
           'oracle', 0, 'Unique Key', 'Failed', 'Duplicate entry ids', 1700000300);
        "#,
    )?;

    tracing::debug!(rows = SCORING_ROWS.len(), "Seeded scoring fixtures");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_cleanup() {
        let path = {
            let store = TestStore::new().await.unwrap();
            let path = store.path().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_seeded_store_has_projects() {
        let store = TestStore::seeded().await.unwrap();
        let conn = store.state().backend.get_connection().await.unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
