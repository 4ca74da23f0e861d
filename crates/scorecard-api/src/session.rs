//! Request-scoped persistence session
//!
//! Each request gets its own connection from the backend. The work runs on
//! the blocking pool inside a single transaction: it commits when the
//! closure returns `Ok` and rolls back when the transaction is dropped on
//! any other exit path. The connection never outlives the call.
//!
//! Sessions begin `IMMEDIATE`. Mutations read before they write, and a
//! deferred transaction that upgrades its lock while another session holds
//! one fails at once with `SQLITE_BUSY`. Taking the write lock up front lets
//! the connection's busy timeout queue overlapping sessions instead.

use dq_scorecard_core::Result;
use rusqlite::TransactionBehavior;

use crate::error::ApiError;
use crate::sqlite_engine::SqliteScoringEngine;
use crate::AppState;

/// Run `work` against a scoring engine bound to a fresh transaction.
pub async fn with_session<T, F>(state: &AppState, work: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&SqliteScoringEngine<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut conn = state.backend.get_connection().await?;

    let result = tokio::task::spawn_blocking(move || -> Result<T> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let output = work(&SqliteScoringEngine::new(&tx))?;
        tx.commit()?;
        Ok(output)
    })
    .await?;

    result.map_err(ApiError::from)
}
