//! Data-Quality Scorecard Core
//!
//! Core types, the category vocabulary, dashboard criteria, and the SQLite
//! schema of the scoring store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub mod categories;
pub mod criteria;
pub mod validation;

pub use categories::{normalize_display_category, normalize_group_by, Category};
pub use criteria::{apply_criteria_update, Criteria, FilterCondition, LinkedFilter};

/// Number of history entries loaded when a caller asks for history.
pub const HISTORY_WINDOW: usize = 50;

// ============================================================================
// Score Types
// ============================================================================

/// Which overall score a breakdown, issue list, or history entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    /// Total score over every selected column
    Score,
    /// Score over critical data elements only
    CdeScore,
}

impl ScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::Score => "score",
            ScoreType::CdeScore => "cde_score",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreType::Score => "Total Score",
            ScoreType::CdeScore => "CDE Score",
        }
    }

    pub fn all() -> [ScoreType; 2] {
        [ScoreType::Score, ScoreType::CdeScore]
    }
}

impl std::fmt::Display for ScoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScoreType {
    type Err = ScorecardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "score" => Ok(ScoreType::Score),
            "cde_score" => Ok(ScoreType::CdeScore),
            _ => Err(ScorecardError::ValidationError(format!(
                "Invalid score_type: '{}'. Must be one of: score, cde_score",
                s
            ))),
        }
    }
}

// ============================================================================
// Dashboard Definitions
// ============================================================================

/// One point of a dashboard's score history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Score value (0-100)
    pub score: f64,
    /// Which score this entry tracks
    pub category: ScoreType,
    /// RFC 3339 timestamp of the run that produced the entry
    pub time: String,
}

/// A scorecard dashboard as stored by the scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDefinition {
    pub id: Uuid,
    pub project_code: String,
    pub name: String,
    /// Compute the total score
    pub total_score: bool,
    /// Compute the CDE score
    pub cde_score: bool,
    /// Category the scorecard is broken down by
    pub category: Option<Category>,
    pub criteria: Criteria,
    /// Loaded history window (empty unless explicitly requested)
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl DashboardDefinition {
    /// A new definition with a fresh id, total score on, CDE score off.
    pub fn new(project_code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_code: project_code.into(),
            name: name.into(),
            total_score: true,
            cde_score: false,
            category: None,
            criteria: Criteria::default(),
            history: Vec::new(),
        }
    }

    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }

    /// The score type a default breakdown uses for this dashboard.
    pub fn primary_score_type(&self) -> ScoreType {
        if !self.total_score && self.cde_score {
            ScoreType::CdeScore
        } else {
            ScoreType::Score
        }
    }
}

/// Sort order for dashboard listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Name,
    ProjectCode,
    CreatedAt,
}

impl SortField {
    /// Column used in ORDER BY.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::ProjectCode => "project_code",
            SortField::CreatedAt => "created_at",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = ScorecardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortField::Name),
            "project_code" => Ok(SortField::ProjectCode),
            "created_at" => Ok(SortField::CreatedAt),
            _ => Err(ScorecardError::ValidationError(format!(
                "Invalid sorted_by: '{}'. Must be one of: name, project_code, created_at",
                s
            ))),
        }
    }
}

/// Listing query for dashboard definitions
#[derive(Debug, Clone, Default)]
pub struct DefinitionQuery {
    pub project_code: Option<String>,
    /// Case-insensitive substring match on the name
    pub name_filter: Option<String>,
    pub sorted_by: SortField,
    /// How many of the most recent history entries to load (0 = none)
    pub last_history_items: usize,
}

// ============================================================================
// Score Cards
// ============================================================================

/// Score of one category value on a score card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub label: String,
    pub score: Option<f64>,
}

/// A computed or cached snapshot of a dashboard's scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub id: Uuid,
    pub project_code: String,
    pub name: String,
    pub score: Option<f64>,
    pub cde_score: Option<f64>,
    pub profiling_score: Option<f64>,
    pub testing_score: Option<f64>,
    pub categories_label: Option<String>,
    pub categories: Vec<CategoryScore>,
    pub history: Vec<HistoryEntry>,
    /// Present when the card was requested together with its definition
    pub definition: Option<DashboardDefinition>,
}

impl ScoreCard {
    /// A card with every score empty, as returned by list summaries.
    pub fn summary(definition: &DashboardDefinition) -> Self {
        Self {
            id: definition.id,
            project_code: definition.project_code.clone(),
            name: definition.name.clone(),
            score: None,
            cde_score: None,
            profiling_score: None,
            testing_score: None,
            categories_label: definition.category.map(|c| c.as_str().to_string()),
            categories: Vec::new(),
            history: Vec::new(),
            definition: None,
        }
    }
}

/// One row of a score breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    /// Share of the total quality deficit attributable to this row (0-100)
    pub impact: f64,
    /// Score of this row (0-100)
    pub score: f64,
    pub issue_ct: i64,
    /// Grouping attributes keyed by category name
    pub group: BTreeMap<String, String>,
}

/// A single hygiene or test finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueItem {
    pub issue_type: String,
    pub status: String,
    pub detail: String,
    /// Unix timestamp (seconds) of detection
    pub time: i64,
    pub column: Option<String>,
    /// Grouping attribute keyed by category name
    pub group: BTreeMap<String, String>,
}

/// One column with its owning table and table group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHierarchy {
    pub column_id: String,
    pub column_name: String,
    pub table_id: String,
    pub table_name: String,
    pub table_group_id: String,
    pub table_group_name: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur in scorecard operations
#[derive(Debug, thiserror::Error)]
pub enum ScorecardError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    #[error("Dashboard '{0}' not found")]
    DashboardNotFound(String),

    #[error("{0}")]
    InvalidIdentifier(String),

    #[error("Invalid category: '{value}'. Must be one of: {}", .allowed.join(", "))]
    InvalidCategory {
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for scorecard operations
pub type Result<T> = std::result::Result<T, ScorecardError>;

// ============================================================================
// Store Schema
// ============================================================================

/// Initialize the base SQLite schema of the scoring store
///
/// Creates all necessary tables if they don't exist:
/// - `projects`: Project registry
/// - `table_groups`, `data_column_chars`: Column hierarchy
/// - `column_scoring_results`: Latest per-column profiling and test scoring,
///   exposed through the `v_dq_profile_scoring_latest_by_column` and
///   `v_dq_test_scoring_latest_by_column` views
/// - `score_definitions`, `score_definition_criteria`: Dashboard definitions
/// - `score_definition_results`: Cached score card values
/// - `score_definition_results_history`: One row per recalculated score
/// - `scoring_issues`: Hygiene and test findings with the same grouping
///   attributes as the scoring views
///
/// Every statement is idempotent, so this also brings an existing store up
/// to the current schema.
pub fn init_sqlite_schema(conn: &rusqlite::Connection) -> Result<()> {
    let ddl = r#"
    CREATE TABLE IF NOT EXISTS projects (
      project_code TEXT PRIMARY KEY,
      project_name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS table_groups (
      id TEXT PRIMARY KEY,
      project_code TEXT NOT NULL REFERENCES projects(project_code) ON DELETE CASCADE,
      table_groups_name TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_table_groups_project ON table_groups(project_code);

    CREATE TABLE IF NOT EXISTS data_column_chars (
      column_id TEXT PRIMARY KEY,
      table_groups_id TEXT NOT NULL REFERENCES table_groups(id) ON DELETE CASCADE,
      table_id TEXT NOT NULL,
      table_name TEXT NOT NULL,
      column_name TEXT NOT NULL,
      ordinal_position INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_column_chars_group ON data_column_chars(table_groups_id);

    CREATE TABLE IF NOT EXISTS column_scoring_results (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      source TEXT NOT NULL CHECK (source IN ('profile', 'test')),
      project_code TEXT NOT NULL,
      table_groups_id TEXT NOT NULL,
      table_name TEXT NOT NULL,
      column_name TEXT NOT NULL,
      dq_dimension TEXT,
      semantic_data_type TEXT,
      table_groups_name TEXT,
      data_location TEXT,
      data_source TEXT,
      source_system TEXT,
      source_process TEXT,
      business_domain TEXT,
      stakeholder_group TEXT,
      transform_level TEXT,
      data_product TEXT,
      critical_data_element INTEGER NOT NULL DEFAULT 0,
      record_ct INTEGER NOT NULL DEFAULT 0,
      issue_ct INTEGER NOT NULL DEFAULT 0,
      good_data_pct REAL NOT NULL DEFAULT 1.0
    );

    CREATE INDEX IF NOT EXISTS idx_scoring_project ON column_scoring_results(project_code, source);

    CREATE VIEW IF NOT EXISTS v_dq_profile_scoring_latest_by_column AS
      SELECT * FROM column_scoring_results WHERE source = 'profile';

    CREATE VIEW IF NOT EXISTS v_dq_test_scoring_latest_by_column AS
      SELECT * FROM column_scoring_results WHERE source = 'test';

    CREATE TABLE IF NOT EXISTS score_definitions (
      id TEXT PRIMARY KEY,
      project_code TEXT NOT NULL REFERENCES projects(project_code) ON DELETE CASCADE,
      name TEXT NOT NULL,
      total_score INTEGER NOT NULL DEFAULT 1,
      cde_score INTEGER NOT NULL DEFAULT 0,
      category TEXT,
      created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
      updated_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_score_definitions_project ON score_definitions(project_code);

    CREATE TABLE IF NOT EXISTS score_definition_criteria (
      definition_id TEXT PRIMARY KEY REFERENCES score_definitions(id) ON DELETE CASCADE,
      criteria TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS score_definition_results (
      definition_id TEXT NOT NULL REFERENCES score_definitions(id) ON DELETE CASCADE,
      kind TEXT NOT NULL CHECK (kind IN ('score', 'category')),
      label TEXT NOT NULL,
      position INTEGER NOT NULL DEFAULT 0,
      score REAL,
      PRIMARY KEY (definition_id, kind, label)
    );

    CREATE TABLE IF NOT EXISTS score_definition_results_history (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      definition_id TEXT NOT NULL REFERENCES score_definitions(id) ON DELETE CASCADE,
      category TEXT NOT NULL CHECK (category IN ('score', 'cde_score')),
      score REAL NOT NULL,
      last_run_time TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_score_history_definition
      ON score_definition_results_history(definition_id, last_run_time);

    CREATE TABLE IF NOT EXISTS scoring_issues (
      id TEXT PRIMARY KEY,
      source TEXT NOT NULL CHECK (source IN ('profile', 'test')),
      project_code TEXT NOT NULL,
      table_groups_id TEXT NOT NULL,
      table_name TEXT NOT NULL,
      column_name TEXT,
      dq_dimension TEXT,
      semantic_data_type TEXT,
      table_groups_name TEXT,
      data_location TEXT,
      data_source TEXT,
      source_system TEXT,
      source_process TEXT,
      business_domain TEXT,
      stakeholder_group TEXT,
      transform_level TEXT,
      data_product TEXT,
      critical_data_element INTEGER NOT NULL DEFAULT 0,
      issue_type TEXT NOT NULL,
      status TEXT NOT NULL,
      detail TEXT NOT NULL DEFAULT '',
      detected_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_scoring_issues_project ON scoring_issues(project_code);
    "#;

    conn.execute_batch(ddl)?;
    Ok(())
}
