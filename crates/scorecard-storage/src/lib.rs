//! Data-Quality Scorecard Storage
//!
//! Backend abstraction for the scoring store. The service opens one
//! connection per request through [`ScoringBackend::get_connection`] and
//! drops it when the request finishes.

use dq_scorecard_core::{init_sqlite_schema, Result, ScorecardError};
use rusqlite::Connection;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

/// Convenience alias for trait objects.
pub type DynScoringBackend = dyn ScoringBackend;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend abstraction for the scoring store (async)
///
/// # Safety
///
/// **Never hold a `rusqlite::Connection` across `.await` points.** Move it
/// into `tokio::task::spawn_blocking` and do all SQLite work there.
///
/// The trait uses manual `Pin<Box<dyn Future>>` returns so trait objects stay
/// `Send` without an extra macro crate.
pub trait ScoringBackend: Send + Sync {
    /// Open a connection to the store.
    ///
    /// IMPORTANT: Use the connection immediately, do not hold it across await points
    fn get_connection(&self) -> Pin<Box<dyn Future<Output = Result<Connection>> + Send + '_>>;

    /// Check if the store exists
    fn exists(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;

    /// Create a new store with the full schema
    fn initialize(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Bring an existing store up to the current schema (idempotent)
    fn ensure_schema(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Parsed representation of a store URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Local(PathBuf),
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Parse a store URI into a structured location.
///
/// Accepts `file://` URIs and raw paths. Remote schemes are rejected.
pub fn parse_store_uri(uri: &str) -> Result<StoreLocation> {
    if let Some((scheme, _)) = uri.split_once("://") {
        if scheme != "file" {
            return Err(ScorecardError::Other(format!(
                "Unsupported store scheme '{}://' (only local SQLite files are supported)",
                scheme
            )));
        }
    }

    let path = uri
        .strip_prefix("file://")
        .map(|p| p.to_string())
        .unwrap_or_else(|| uri.to_string());

    if uri.starts_with("file://") {
        dq_scorecard_core::validation::validate_file_uri_path(&path)?;
    }

    if path.is_empty() {
        return Err(ScorecardError::Other("Empty store path".into()));
    }

    Ok(StoreLocation::Local(PathBuf::from(path)))
}

/// Build a backend from a store URI.
pub fn backend_from_uri(uri: &str) -> Result<Box<dyn ScoringBackend>> {
    match parse_store_uri(uri)? {
        StoreLocation::Local(path) => Ok(Box::new(LocalSqliteBackend::new(path))),
    }
}

/// Local filesystem SQLite backend
#[derive(Debug, Clone)]
pub struct LocalSqliteBackend {
    path: PathBuf,
}

impl LocalSqliteBackend {
    /// Create a new local SQLite backend
    ///
    /// ```no_run
    /// use dq_scorecard_storage::LocalSqliteBackend;
    ///
    /// let backend = LocalSqliteBackend::new("scorecard.db");
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn join_error(e: tokio::task::JoinError) -> ScorecardError {
    ScorecardError::Other(format!("Task join error: {}", e))
}

impl ScoringBackend for LocalSqliteBackend {
    fn get_connection(&self) -> Pin<Box<dyn Future<Output = Result<Connection>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || open_connection(&path))
                .await
                .map_err(join_error)?
        })
    }

    fn exists(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move { Ok(path.exists()) })
    }

    fn initialize(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move {
            if path.exists() {
                return Err(ScorecardError::Other(format!(
                    "Scoring store already exists at {:?}",
                    path
                )));
            }

            tokio::task::spawn_blocking(move || {
                let conn = open_connection(&path)?;
                init_sqlite_schema(&conn)?;
                tracing::info!(path = %path.display(), "Initialized scoring store");
                Ok(())
            })
            .await
            .map_err(join_error)?
        })
    }

    fn ensure_schema(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let conn = open_connection(&path)?;
                init_sqlite_schema(&conn)?;
                tracing::debug!(path = %path.display(), "Scoring store schema is current");
                Ok(())
            })
            .await
            .map_err(join_error)?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_local_backend_initialize() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        // Remove the file so initialization starts from nothing
        std::fs::remove_file(path).unwrap();

        let backend = LocalSqliteBackend::new(path);
        assert!(!backend.exists().await.unwrap());

        backend.initialize().await.unwrap();
        assert!(backend.exists().await.unwrap());

        let conn = backend.get_connection().await.unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"score_definitions".to_string()));
        assert!(tables.contains(&"score_definition_results_history".to_string()));
        assert!(tables.contains(&"scoring_issues".to_string()));
    }

    #[tokio::test]
    async fn test_local_backend_double_initialize() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        std::fs::remove_file(path).unwrap();

        let backend = LocalSqliteBackend::new(path);
        backend.initialize().await.unwrap();
        assert!(backend.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_schema_upgrades_partial_store() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            // A store created before the history and issue tables existed
            let conn = Connection::open(temp_file.path()).unwrap();
            conn.execute_batch(
                "CREATE TABLE projects (project_code TEXT PRIMARY KEY, project_name TEXT NOT NULL);",
            )
            .unwrap();
        }

        let backend = LocalSqliteBackend::new(temp_file.path());
        backend.ensure_schema().await.unwrap();
        backend.ensure_schema().await.unwrap();

        let conn = backend.get_connection().await.unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('score_definition_results_history', 'scoring_issues')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_connections_enforce_foreign_keys() {
        let temp_file = NamedTempFile::new().unwrap();
        let backend = LocalSqliteBackend::new(temp_file.path());
        backend.ensure_schema().await.unwrap();

        let conn = backend.get_connection().await.unwrap();
        let result = conn.execute(
            "INSERT INTO score_definitions (id, project_code, name) VALUES ('x', 'missing', 'n')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_store_uri() {
        assert_eq!(
            parse_store_uri("scorecard.db").unwrap(),
            StoreLocation::Local(PathBuf::from("scorecard.db"))
        );
        assert_eq!(
            parse_store_uri("file:///var/lib/scorecard.db").unwrap(),
            StoreLocation::Local(PathBuf::from("/var/lib/scorecard.db"))
        );
        assert!(parse_store_uri("file://../escape.db").is_err());
        assert!(parse_store_uri("s3://bucket/key").is_err());
        assert!(parse_store_uri("").is_err());
    }

    #[test]
    fn test_location_display() {
        let loc = StoreLocation::Local(PathBuf::from("/tmp/store.db"));
        assert_eq!(loc.to_string(), "file:///tmp/store.db");
    }
}
