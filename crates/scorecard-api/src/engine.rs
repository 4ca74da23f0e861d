//! Scoring engine interface
//!
//! The dashboard layer never computes scores itself. It talks to a scoring
//! engine through these traits, which are implemented by
//! [`crate::sqlite_engine::SqliteScoringEngine`] for the bundled store and
//! by in-memory fakes in tests.
//!
//! All methods are synchronous: they run on a blocking thread inside a
//! request-scoped session (see [`crate::session`]).

use dq_scorecard_core::{
    BreakdownItem, Category, ColumnHierarchy, DashboardDefinition, DefinitionQuery, IssueItem,
    Result, ScoreCard, ScoreType,
};
use uuid::Uuid;

/// One `(category, value)` pair observed in the scoring views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValueRow {
    pub category: Category,
    pub value: String,
}

/// Read-only catalog queries used to build filter options.
pub trait CatalogQueries {
    fn project_exists(&self, project_code: &str) -> Result<bool>;

    /// Distinct non-null values of each requested category across the
    /// profiling and test scoring views, sorted case-insensitively by value.
    fn filter_value_rows(
        &self,
        project_code: &str,
        categories: &[Category],
    ) -> Result<Vec<FilterValueRow>>;

    /// Every column of the project with its table and table group, ordered
    /// by table group name, table name (both case-insensitive), then
    /// ordinal position.
    fn column_hierarchy(&self, project_code: &str) -> Result<Vec<ColumnHierarchy>>;
}

/// Dashboard persistence and score computation.
pub trait ScoringEngine: CatalogQueries {
    /// Load a definition without history.
    fn get_definition(&self, id: &Uuid) -> Result<Option<DashboardDefinition>>;

    fn list_definitions(&self, query: &DefinitionQuery) -> Result<Vec<DashboardDefinition>>;

    /// Insert or update a definition together with its criteria.
    fn save_definition(&self, definition: &DashboardDefinition) -> Result<()>;

    /// Returns `false` when nothing was deleted.
    fn delete_definition(&self, id: &Uuid) -> Result<bool>;

    /// Compute a fresh score card. Categories are always populated and
    /// history is always empty.
    fn score_card(&self, definition: &DashboardDefinition, save_to_cache: bool)
        -> Result<ScoreCard>;

    /// Read the card stored by the last refresh. History comes from the
    /// definition's loaded history window.
    fn cached_score_card(
        &self,
        definition: &DashboardDefinition,
        include_definition: bool,
    ) -> Result<ScoreCard>;

    fn breakdown(
        &self,
        definition: &DashboardDefinition,
        score_type: ScoreType,
        group_by: Category,
    ) -> Result<Vec<BreakdownItem>>;

    fn issues(
        &self,
        definition: &DashboardDefinition,
        score_type: ScoreType,
        group_by: Category,
        value: &str,
    ) -> Result<Vec<IssueItem>>;

    /// Recompute and cache a definition's results, optionally appending a
    /// history entry per enabled score.
    fn refresh_results(&self, id: &Uuid, add_history_entry: bool) -> Result<()>;
}
