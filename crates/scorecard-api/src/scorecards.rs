//! Score card assembly and response formatting
//!
//! The assembler decides per request whether a card is computed fresh or
//! read from the cache:
//!
//! | Context | Path |
//! |---|---|
//! | list, no scores or history requested | summary, no engine call |
//! | list, scores or history requested | fresh card, history merged from the cached card |
//! | single read | cached card with definition, history window reloaded on request |
//! | recalculate | refresh with history entry, then cached card with definition |
//!
//! Fresh cards always carry categories but never history. Cached cards carry
//! history but only have scores after a refresh. Only `history` is ever taken
//! from the cached card when both are combined.

use dq_scorecard_core::{
    BreakdownItem, Category, Criteria, DashboardDefinition, DefinitionQuery, HistoryEntry,
    IssueItem, Result, ScoreCard, HISTORY_WINDOW,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::ScoringEngine;

// ============================================================================
// Assembler
// ============================================================================

/// Card for one entry of a dashboard listing.
pub fn list_card<E: ScoringEngine + ?Sized>(
    engine: &E,
    definition: &DashboardDefinition,
    include_scores: bool,
    include_history: bool,
) -> Result<ScoreCard> {
    if !include_scores && !include_history {
        return Ok(ScoreCard::summary(definition));
    }

    let mut card = engine.score_card(definition, false)?;
    if include_history && definition.has_history() {
        let cached = engine.cached_score_card(definition, false)?;
        card.history = cached.history;
    }
    Ok(card)
}

/// Card for a single-dashboard read.
pub fn read_card<E: ScoringEngine + ?Sized>(
    engine: &E,
    definition: DashboardDefinition,
    include_history: bool,
) -> Result<ScoreCard> {
    let definition = if include_history {
        with_history(engine, definition)?
    } else {
        definition
    };
    engine.cached_score_card(&definition, true)
}

/// Refresh a dashboard's cached results and return the new cached card.
pub fn recalculated_card<E: ScoringEngine + ?Sized>(
    engine: &E,
    definition: DashboardDefinition,
) -> Result<ScoreCard> {
    engine.refresh_results(&definition.id, true)?;
    let definition = with_history(engine, definition)?;
    engine.cached_score_card(&definition, true)
}

/// Reload a definition through the listing path so its history window is
/// populated. Falls back to the given definition if the listing misses it.
fn with_history<E: ScoringEngine + ?Sized>(
    engine: &E,
    definition: DashboardDefinition,
) -> Result<DashboardDefinition> {
    let reloaded = engine
        .list_definitions(&DefinitionQuery {
            project_code: Some(definition.project_code.clone()),
            last_history_items: HISTORY_WINDOW,
            ..Default::default()
        })?
        .into_iter()
        .find(|d| d.id == definition.id);
    Ok(reloaded.unwrap_or(definition))
}

// ============================================================================
// Formatting
// ============================================================================

/// Render a 0-100 score with one decimal, dropping a trailing `.0`.
pub fn format_score(score: Option<f64>) -> Option<String> {
    score.map(format_number)
}

fn format_number(value: f64) -> String {
    let rendered = format!("{:.1}", value);
    match rendered.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => rendered,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScoreResponse {
    pub label: String,
    pub score: Option<String>,
}

/// Dashboard configuration echoed back with cached cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionResponse {
    pub total_score: bool,
    pub cde_score: bool,
    pub category: Option<Category>,
    pub criteria: Criteria,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub id: String,
    pub project_code: String,
    pub name: String,
    pub score: Option<String>,
    pub cde_score: Option<String>,
    pub profiling_score: Option<String>,
    pub testing_score: Option<String>,
    pub categories_label: Option<String>,
    pub categories: Vec<CategoryScoreResponse>,
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<DefinitionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<BreakdownItemResponse>>,
}

impl From<ScoreCard> for DashboardResponse {
    fn from(card: ScoreCard) -> Self {
        Self {
            id: card.id.to_string(),
            project_code: card.project_code,
            name: card.name,
            score: format_score(card.score),
            cde_score: format_score(card.cde_score),
            profiling_score: format_score(card.profiling_score),
            testing_score: format_score(card.testing_score),
            categories_label: card.categories_label,
            categories: card
                .categories
                .into_iter()
                .map(|c| CategoryScoreResponse {
                    label: c.label,
                    score: format_score(c.score),
                })
                .collect(),
            history: card.history,
            definition: card.definition.map(|d| DefinitionResponse {
                total_score: d.total_score,
                cde_score: d.cde_score,
                category: d.category,
                criteria: d.criteria,
            }),
            breakdown: None,
        }
    }
}

/// Breakdown row; grouping attributes are flattened next to the scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItemResponse {
    pub impact: String,
    pub score: String,
    pub issue_ct: i64,
    #[serde(flatten)]
    pub group: BTreeMap<String, String>,
}

impl From<BreakdownItem> for BreakdownItemResponse {
    fn from(item: BreakdownItem) -> Self {
        Self {
            impact: format_number(item.impact),
            score: format_number(item.score),
            issue_ct: item.issue_ct,
            group: item.group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueItemResponse {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub status: String,
    pub detail: String,
    pub time: i64,
    pub column: Option<String>,
    #[serde(flatten)]
    pub group: BTreeMap<String, String>,
}

impl From<IssueItem> for IssueItemResponse {
    fn from(item: IssueItem) -> Self {
        Self {
            issue_type: item.issue_type,
            status: item.status,
            detail: item.detail,
            time: item.time,
            column: item.column,
            group: item.group,
        }
    }
}
