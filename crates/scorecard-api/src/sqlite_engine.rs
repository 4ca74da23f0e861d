//! SQLite scoring engine
//!
//! Reference implementation of [`ScoringEngine`] over the scoring store
//! schema created by `dq_scorecard_core::init_sqlite_schema`.
//!
//! Scoring rule: a score is the record-weighted mean of `good_data_pct`
//! (scaled to 0-100) over the scoring rows selected by the dashboard's
//! criteria. Profiling and testing sub-scores read their own view, the CDE
//! score only rows flagged `critical_data_element`. Breakdown impact is a
//! group's share of the total weighted deficit.

use chrono::{SecondsFormat, Utc};
use dq_scorecard_core::{
    criteria::CriteriaOperand, BreakdownItem, Category, CategoryScore, ColumnHierarchy, Criteria,
    DashboardDefinition, DefinitionQuery, HistoryEntry, IssueItem, Result, ScoreCard,
    ScorecardError, ScoreType,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::engine::{CatalogQueries, FilterValueRow, ScoringEngine};

const PROFILE_VIEW: &str = "v_dq_profile_scoring_latest_by_column";
const TEST_VIEW: &str = "v_dq_test_scoring_latest_by_column";
const ALL_SCORING: &str = "(SELECT * FROM v_dq_profile_scoring_latest_by_column \
     UNION ALL SELECT * FROM v_dq_test_scoring_latest_by_column)";

/// Maximum rows returned by a breakdown.
pub const BREAKDOWN_LIMIT: usize = 100;

/// Labels of the overall scores in `score_definition_results`.
const SCORE_LABELS: [&str; 4] = ["score", "cde_score", "profiling_score", "testing_score"];

/// Scoring engine backed by one SQLite connection (usually a transaction).
pub struct SqliteScoringEngine<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteScoringEngine<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn weighted_score(&self, source: &str, selection: &Selection) -> Result<Option<f64>> {
        let sql = format!(
            "SELECT SUM(record_ct * good_data_pct), SUM(record_ct) FROM {} WHERE {}",
            source, selection.clause
        );
        let (weighted, records): (Option<f64>, Option<i64>) = self.conn.query_row(
            &sql,
            params_from_iter(selection.params.iter()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(weighted_ratio(weighted, records))
    }

    fn category_scores(
        &self,
        definition: &DashboardDefinition,
        category: Category,
    ) -> Result<Vec<CategoryScore>> {
        let selection = Selection::new(definition, definition.primary_score_type())?;
        let column = category.as_str();
        let sql = format!(
            "SELECT {col}, SUM(record_ct * good_data_pct), SUM(record_ct) \
             FROM {src} WHERE {clause} AND {col} IS NOT NULL \
             GROUP BY {col} ORDER BY LOWER({col}), {col}",
            col = column,
            src = ALL_SCORING,
            clause = selection.clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let scores = stmt
            .query_map(params_from_iter(selection.params.iter()), |row| {
                Ok(CategoryScore {
                    label: row.get(0)?,
                    score: weighted_ratio(row.get(1)?, row.get(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(scores)
    }

    fn store_results(&self, card: &ScoreCard) -> Result<()> {
        let id = card.id.to_string();
        self.conn.execute(
            "DELETE FROM score_definition_results WHERE definition_id = ?1",
            [&id],
        )?;

        let mut insert = self.conn.prepare(
            "INSERT INTO score_definition_results (definition_id, kind, label, position, score)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        let overall = [
            card.score,
            card.cde_score,
            card.profiling_score,
            card.testing_score,
        ];
        for (position, (label, score)) in SCORE_LABELS.iter().zip(overall).enumerate() {
            insert.execute(params![id, "score", label, position as i64, score])?;
        }
        for (position, category) in card.categories.iter().enumerate() {
            insert.execute(params![
                id,
                "category",
                category.label,
                position as i64,
                category.score
            ])?;
        }
        Ok(())
    }

    fn load_history(&self, id: &Uuid, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, score, last_run_time FROM score_definition_results_history
             WHERE definition_id = ?1
             ORDER BY last_run_time DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![id.to_string(), limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Oldest first
        rows.into_iter()
            .rev()
            .map(|(category, score, time)| {
                Ok(HistoryEntry {
                    score,
                    category: category.parse()?,
                    time,
                })
            })
            .collect()
    }

    fn append_history(&self, card: &ScoreCard) -> Result<usize> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut added = 0;
        for (score_type, score) in [
            (ScoreType::Score, card.score),
            (ScoreType::CdeScore, card.cde_score),
        ] {
            if let Some(score) = score {
                self.conn.execute(
                    "INSERT INTO score_definition_results_history
                     (definition_id, category, score, last_run_time) VALUES (?1, ?2, ?3, ?4)",
                    params![card.id.to_string(), score_type.as_str(), score, now],
                )?;
                added += 1;
            }
        }
        Ok(added)
    }
}

/// Raw `score_definitions` row joined with its criteria.
struct DefinitionRow {
    id: String,
    project_code: String,
    name: String,
    total_score: bool,
    cde_score: bool,
    category: Option<String>,
    criteria: Option<String>,
}

const DEFINITION_COLUMNS: &str = "d.id, d.project_code, d.name, d.total_score, d.cde_score, \
     d.category, c.criteria \
     FROM score_definitions d \
     LEFT JOIN score_definition_criteria c ON c.definition_id = d.id";

impl DefinitionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_code: row.get(1)?,
            name: row.get(2)?,
            total_score: row.get(3)?,
            cde_score: row.get(4)?,
            category: row.get(5)?,
            criteria: row.get(6)?,
        })
    }

    fn into_definition(self) -> Result<DashboardDefinition> {
        let id = Uuid::parse_str(&self.id).map_err(|e| {
            ScorecardError::SerializationError(format!("Stored dashboard id '{}': {}", self.id, e))
        })?;
        let category = match self.category.as_deref() {
            Some(raw) => Some(Category::from_column(raw).ok_or_else(|| {
                ScorecardError::SerializationError(format!("Stored category '{}'", raw))
            })?),
            None => None,
        };
        let criteria = match self.criteria.as_deref() {
            Some(raw) => Criteria::from_json(raw)?,
            None => Criteria::default(),
        };

        Ok(DashboardDefinition {
            id,
            project_code: self.project_code,
            name: self.name,
            total_score: self.total_score,
            cde_score: self.cde_score,
            category,
            criteria,
            history: Vec::new(),
        })
    }
}

/// A WHERE clause with its positional parameters.
#[derive(Debug)]
struct Selection {
    clause: String,
    params: Vec<String>,
}

impl Selection {
    /// Rows of the definition's project matching its criteria, restricted to
    /// critical data elements for the CDE score.
    fn new(definition: &DashboardDefinition, score_type: ScoreType) -> Result<Self> {
        let mut clause = String::from("project_code = ?");
        let mut params = vec![definition.project_code.clone()];

        if let Some((criteria_sql, criteria_params)) = criteria_clause(&definition.criteria)? {
            clause.push_str(" AND ");
            clause.push_str(&criteria_sql);
            params.extend(criteria_params);
        }

        if score_type == ScoreType::CdeScore {
            clause.push_str(" AND critical_data_element = 1");
        }

        Ok(Self { clause, params })
    }
}

fn filter_column(field: &str) -> Result<&'static str> {
    Category::from_column(field)
        .map(|c| c.as_str())
        .ok_or_else(|| ScorecardError::Other(format!("Unknown filter field '{}'", field)))
}

/// Render criteria as SQL. `None` selects everything.
fn criteria_clause(criteria: &Criteria) -> Result<Option<(String, Vec<String>)>> {
    if criteria.is_empty() {
        return Ok(None);
    }

    let mut params = Vec::new();
    let mut groups = Vec::new();
    for group in criteria.condition_groups() {
        let mut alternatives = Vec::with_capacity(group.len());
        for condition in group {
            let mut terms = vec![format!("{} = ?", filter_column(&condition.field)?)];
            params.push(condition.value.clone());
            for other in &condition.others {
                terms.push(format!("{} = ?", filter_column(&other.field)?));
                params.push(other.value.clone());
            }
            alternatives.push(format!("({})", terms.join(" AND ")));
        }
        groups.push(format!("({})", alternatives.join(" OR ")));
    }

    let joiner = match criteria.operand {
        CriteriaOperand::And => " AND ",
        CriteriaOperand::Or => " OR ",
    };
    Ok(Some((format!("({})", groups.join(joiner)), params)))
}

fn weighted_ratio(weighted: Option<f64>, records: Option<i64>) -> Option<f64> {
    match (weighted, records) {
        (Some(weighted), Some(records)) if records > 0 => Some(100.0 * weighted / records as f64),
        _ => None,
    }
}

/// Columns a breakdown row is keyed by.
fn breakdown_columns(group_by: Category) -> Vec<&'static str> {
    match group_by {
        Category::ColumnName => vec!["table_groups_id", "table_name", "column_name"],
        Category::TableName => vec!["table_groups_id", "table_name"],
        other => vec![other.as_str()],
    }
}

impl CatalogQueries for SqliteScoringEngine<'_> {
    fn project_exists(&self, project_code: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE project_code = ?1)",
            [project_code],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn filter_value_rows(
        &self,
        project_code: &str,
        categories: &[Category],
    ) -> Result<Vec<FilterValueRow>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let selects: Vec<String> = [PROFILE_VIEW, TEST_VIEW]
            .iter()
            .flat_map(|view| {
                categories.iter().map(move |category| {
                    format!(
                        "SELECT '{cat}' AS category, {cat} AS value FROM {view} WHERE project_code = ?1",
                        cat = category.as_str(),
                        view = view
                    )
                })
            })
            .collect();

        let sql = format!(
            "SELECT category, value FROM ({}) WHERE value IS NOT NULL ORDER BY LOWER(value), value",
            selects.join(" UNION ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([project_code], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(category, value)| {
                let category = Category::from_column(&category).ok_or_else(|| {
                    ScorecardError::Other(format!("Unexpected filter category '{}'", category))
                })?;
                Ok(FilterValueRow { category, value })
            })
            .collect()
    }

    fn column_hierarchy(&self, project_code: &str) -> Result<Vec<ColumnHierarchy>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.column_id, c.column_name, c.table_id, c.table_name,
                   g.id, g.table_groups_name
            FROM data_column_chars c
            JOIN table_groups g ON g.id = c.table_groups_id
            WHERE g.project_code = ?1
            ORDER BY LOWER(g.table_groups_name), LOWER(c.table_name), c.ordinal_position
            "#,
        )?;

        let columns = stmt
            .query_map([project_code], |row| {
                Ok(ColumnHierarchy {
                    column_id: row.get(0)?,
                    column_name: row.get(1)?,
                    table_id: row.get(2)?,
                    table_name: row.get(3)?,
                    table_group_id: row.get(4)?,
                    table_group_name: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

impl ScoringEngine for SqliteScoringEngine<'_> {
    fn get_definition(&self, id: &Uuid) -> Result<Option<DashboardDefinition>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} WHERE d.id = ?1", DEFINITION_COLUMNS),
                [id.to_string()],
                DefinitionRow::from_row,
            )
            .optional()?;
        row.map(DefinitionRow::into_definition).transpose()
    }

    fn list_definitions(&self, query: &DefinitionQuery) -> Result<Vec<DashboardDefinition>> {
        let mut sql = format!("SELECT {} WHERE 1=1", DEFINITION_COLUMNS);
        let mut bindings: Vec<String> = Vec::new();

        if let Some(project_code) = &query.project_code {
            sql.push_str(" AND d.project_code = ?");
            bindings.push(project_code.clone());
        }
        sql.push_str(&format!(" ORDER BY d.{}, d.id", query.sorted_by.column()));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bindings.iter()), DefinitionRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut definitions = rows
            .into_iter()
            .map(DefinitionRow::into_definition)
            .collect::<Result<Vec<_>>>()?;

        // SQLite's LOWER only folds ASCII
        if let Some(needle) = query.name_filter.as_deref().filter(|f| !f.is_empty()) {
            let needle = needle.to_lowercase();
            definitions.retain(|d| d.name.to_lowercase().contains(&needle));
        }

        if query.last_history_items > 0 {
            for definition in &mut definitions {
                definition.history = self.load_history(&definition.id, query.last_history_items)?;
            }
        }

        tracing::debug!(count = definitions.len(), "Listed score definitions");
        Ok(definitions)
    }

    fn save_definition(&self, definition: &DashboardDefinition) -> Result<()> {
        let id = definition.id.to_string();
        self.conn.execute(
            r#"
            INSERT INTO score_definitions (id, project_code, name, total_score, cde_score, category)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                total_score = excluded.total_score,
                cde_score = excluded.cde_score,
                category = excluded.category,
                updated_at = datetime('now')
            "#,
            params![
                id,
                definition.project_code,
                definition.name,
                definition.total_score,
                definition.cde_score,
                definition.category.map(|c| c.as_str()),
            ],
        )?;

        self.conn.execute(
            r#"
            INSERT INTO score_definition_criteria (definition_id, criteria) VALUES (?1, ?2)
            ON CONFLICT(definition_id) DO UPDATE SET criteria = excluded.criteria
            "#,
            params![id, definition.criteria.to_json()?],
        )?;
        Ok(())
    }

    fn delete_definition(&self, id: &Uuid) -> Result<bool> {
        let id = id.to_string();
        for table in [
            "score_definition_results_history",
            "score_definition_results",
            "score_definition_criteria",
        ] {
            self.conn.execute(
                &format!("DELETE FROM {} WHERE definition_id = ?1", table),
                [&id],
            )?;
        }
        let deleted = self
            .conn
            .execute("DELETE FROM score_definitions WHERE id = ?1", [&id])?;
        Ok(deleted > 0)
    }

    fn score_card(
        &self,
        definition: &DashboardDefinition,
        save_to_cache: bool,
    ) -> Result<ScoreCard> {
        let primary = Selection::new(definition, definition.primary_score_type())?;

        let score = if definition.total_score {
            self.weighted_score(ALL_SCORING, &Selection::new(definition, ScoreType::Score)?)?
        } else {
            None
        };
        let cde_score = if definition.cde_score {
            self.weighted_score(ALL_SCORING, &Selection::new(definition, ScoreType::CdeScore)?)?
        } else {
            None
        };
        let categories = match definition.category {
            Some(category) => self.category_scores(definition, category)?,
            None => Vec::new(),
        };

        let card = ScoreCard {
            id: definition.id,
            project_code: definition.project_code.clone(),
            name: definition.name.clone(),
            score,
            cde_score,
            profiling_score: self.weighted_score(PROFILE_VIEW, &primary)?,
            testing_score: self.weighted_score(TEST_VIEW, &primary)?,
            categories_label: definition.category.map(|c| c.as_str().to_string()),
            categories,
            history: Vec::new(),
            definition: None,
        };

        if save_to_cache {
            self.store_results(&card)?;
        }
        Ok(card)
    }

    fn cached_score_card(
        &self,
        definition: &DashboardDefinition,
        include_definition: bool,
    ) -> Result<ScoreCard> {
        let mut card = ScoreCard::summary(definition);

        let mut stmt = self.conn.prepare(
            "SELECT kind, label, score FROM score_definition_results
             WHERE definition_id = ?1 ORDER BY kind, position",
        )?;
        let rows = stmt
            .query_map([definition.id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (kind, label, score) in rows {
            match (kind.as_str(), label.as_str()) {
                ("score", "score") => card.score = score,
                ("score", "cde_score") => card.cde_score = score,
                ("score", "profiling_score") => card.profiling_score = score,
                ("score", "testing_score") => card.testing_score = score,
                ("category", _) => card.categories.push(CategoryScore { label, score }),
                _ => tracing::warn!(kind = %kind, label = %label, "Ignoring unknown cached result"),
            }
        }

        card.history = definition.history.clone();
        if include_definition {
            card.definition = Some(definition.clone());
        }
        Ok(card)
    }

    fn breakdown(
        &self,
        definition: &DashboardDefinition,
        score_type: ScoreType,
        group_by: Category,
    ) -> Result<Vec<BreakdownItem>> {
        let selection = Selection::new(definition, score_type)?;
        let columns = breakdown_columns(group_by);
        let column_list = columns.join(", ");
        let sql = format!(
            "SELECT {cols}, SUM(record_ct * good_data_pct), SUM(record_ct), SUM(issue_ct), \
             SUM(record_ct * (1.0 - good_data_pct)) \
             FROM {src} WHERE {clause} AND {group_col} IS NOT NULL GROUP BY {cols}",
            cols = column_list,
            src = ALL_SCORING,
            clause = selection.clause,
            group_col = group_by.as_str()
        );

        let width = columns.len();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(selection.params.iter()), |row| {
                let mut group = BTreeMap::new();
                for (i, column) in columns.iter().enumerate() {
                    group.insert(column.to_string(), row.get::<_, String>(i)?);
                }
                Ok((
                    group,
                    row.get::<_, Option<f64>>(width)?,
                    row.get::<_, Option<i64>>(width + 1)?,
                    row.get::<_, Option<i64>>(width + 2)?.unwrap_or(0),
                    row.get::<_, Option<f64>>(width + 3)?.unwrap_or(0.0),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total_deficit: f64 = rows.iter().map(|(_, _, _, _, deficit)| deficit).sum();
        let mut items: Vec<BreakdownItem> = rows
            .into_iter()
            .map(|(group, weighted, records, issue_ct, deficit)| BreakdownItem {
                impact: if total_deficit > 0.0 {
                    100.0 * deficit / total_deficit
                } else {
                    0.0
                },
                score: weighted_ratio(weighted, records).unwrap_or(100.0),
                issue_ct,
                group,
            })
            .collect();

        items.sort_by(|a, b| {
            b.impact
                .total_cmp(&a.impact)
                .then_with(|| a.score.total_cmp(&b.score))
                .then_with(|| a.group.cmp(&b.group))
        });
        items.truncate(BREAKDOWN_LIMIT);

        tracing::debug!(
            dashboard_id = %definition.id,
            group_by = %group_by,
            rows = items.len(),
            "Computed breakdown"
        );
        Ok(items)
    }

    fn issues(
        &self,
        definition: &DashboardDefinition,
        score_type: ScoreType,
        group_by: Category,
        value: &str,
    ) -> Result<Vec<IssueItem>> {
        let mut selection = Selection::new(definition, score_type)?;
        let group_col = group_by.as_str();
        selection.clause.push_str(&format!(" AND {} = ?", group_col));
        selection.params.push(value.to_string());

        let sql = format!(
            "SELECT issue_type, status, detail, detected_at, column_name, {} \
             FROM scoring_issues WHERE {} ORDER BY detected_at DESC, id",
            group_col, selection.clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let issues = stmt
            .query_map(params_from_iter(selection.params.iter()), |row| {
                let mut group = BTreeMap::new();
                group.insert(group_col.to_string(), row.get::<_, String>(5)?);
                Ok(IssueItem {
                    issue_type: row.get(0)?,
                    status: row.get(1)?,
                    detail: row.get(2)?,
                    time: row.get(3)?,
                    column: row.get(4)?,
                    group,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    fn refresh_results(&self, id: &Uuid, add_history_entry: bool) -> Result<()> {
        let definition = self
            .get_definition(id)?
            .ok_or_else(|| ScorecardError::DashboardNotFound(id.to_string()))?;

        let card = self.score_card(&definition, true)?;
        let history_added = if add_history_entry {
            self.append_history(&card)?
        } else {
            0
        };

        tracing::info!(
            dashboard_id = %id,
            history_added,
            "Refreshed score card results"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_connection, DEFAULT_PROJECT};
    use dq_scorecard_core::{FilterCondition, LinkedFilter};

    fn condition(field: &str, value: &str) -> FilterCondition {
        FilterCondition {
            field: field.to_string(),
            value: value.to_string(),
            others: vec![],
        }
    }

    fn rounded(score: Option<f64>) -> Option<f64> {
        score.map(|s| (s * 10.0).round() / 10.0)
    }

    fn definition_with(filters: Vec<FilterCondition>, group_by_field: bool) -> DashboardDefinition {
        let mut def = DashboardDefinition::new(DEFAULT_PROJECT, "Test");
        def.criteria = Criteria::from_filters(filters, group_by_field);
        def
    }

    #[test]
    fn test_project_exists() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        assert!(engine.project_exists(DEFAULT_PROJECT).unwrap());
        assert!(!engine.project_exists("NOPE").unwrap());
    }

    #[test]
    fn test_fresh_score_card() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let mut def = DashboardDefinition::new(DEFAULT_PROJECT, "All");
        def.cde_score = true;
        def.category = Some(Category::DataSource);

        let card = engine.score_card(&def, false).unwrap();
        assert_eq!(rounded(card.score), Some(82.0));
        assert_eq!(rounded(card.cde_score), Some(93.3));
        assert_eq!(rounded(card.profiling_score), Some(90.0));
        assert_eq!(rounded(card.testing_score), Some(76.7));
        assert!(card.history.is_empty());

        let labels: Vec<&str> = card.categories.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["oracle", "postgres", "Snowflake"]);
        assert_eq!(rounded(card.categories[0].score), Some(50.0));
    }

    #[test]
    fn test_disabled_scores_are_empty() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let mut def = DashboardDefinition::new(DEFAULT_PROJECT, "CDE only");
        def.total_score = false;
        def.cde_score = true;

        let card = engine.score_card(&def, false).unwrap();
        assert!(card.score.is_none());
        assert!(card.cde_score.is_some());
    }

    #[test]
    fn test_grouped_criteria_and_across_fields() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let filters = vec![
            condition("data_source", "postgres"),
            condition("data_source", "oracle"),
            condition("table_groups_name", "sales"),
        ];

        let grouped = engine
            .score_card(&definition_with(filters.clone(), true), false)
            .unwrap();
        assert_eq!(rounded(grouped.score), Some(90.0));

        let ungrouped = engine
            .score_card(&definition_with(filters, false), false)
            .unwrap();
        assert_eq!(rounded(ungrouped.score), Some(82.0));
    }

    #[test]
    fn test_linked_filters_narrow_condition() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let filters = vec![FilterCondition {
            field: "table_groups_name".to_string(),
            value: "sales".to_string(),
            others: vec![
                LinkedFilter {
                    field: "table_name".to_string(),
                    value: "orders".to_string(),
                },
                LinkedFilter {
                    field: "column_name".to_string(),
                    value: "amount".to_string(),
                },
            ],
        }];

        let card = engine
            .score_card(&definition_with(filters, true), false)
            .unwrap();
        assert_eq!(rounded(card.score), Some(80.0));
    }

    #[test]
    fn test_unknown_filter_field_is_engine_error() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let def = definition_with(vec![condition("owner; DROP TABLE projects", "x")], true);

        assert!(matches!(
            engine.score_card(&def, false),
            Err(ScorecardError::Other(_))
        ));
    }

    #[test]
    fn test_definition_round_trip_and_listing() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let mut beta = DashboardDefinition::new(DEFAULT_PROJECT, "Beta board");
        beta.category = Some(Category::DqDimension);
        beta.criteria = Criteria::from_filters(vec![condition("data_source", "postgres")], false);
        let alpha = DashboardDefinition::new(DEFAULT_PROJECT, "alpha board");
        engine.save_definition(&beta).unwrap();
        engine.save_definition(&alpha).unwrap();

        let loaded = engine.get_definition(&beta.id).unwrap().unwrap();
        assert_eq!(loaded, beta);

        let all = engine.list_definitions(&DefinitionQuery::default()).unwrap();
        let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Beta board", "alpha board"]);

        let filtered = engine
            .list_definitions(&DefinitionQuery {
                name_filter: Some("ALPHA".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, alpha.id);

        let other_project = engine
            .list_definitions(&DefinitionQuery {
                project_code: Some("OTHER".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(other_project.is_empty());
    }

    #[test]
    fn test_name_filter_folds_non_ascii_case() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let umlaut = DashboardDefinition::new(DEFAULT_PROJECT, "ÜBER Qualität");
        engine.save_definition(&umlaut).unwrap();
        engine
            .save_definition(&DashboardDefinition::new(DEFAULT_PROJECT, "Uber plain"))
            .unwrap();

        let found = engine
            .list_definitions(&DefinitionQuery {
                name_filter: Some("über qualität".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, umlaut.id);
    }

    #[test]
    fn test_save_updates_existing_definition() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let mut def = DashboardDefinition::new(DEFAULT_PROJECT, "Before");
        engine.save_definition(&def).unwrap();
        def.name = "After".to_string();
        def.criteria = Criteria::from_filters(vec![condition("data_product", "x")], true);
        engine.save_definition(&def).unwrap();

        let loaded = engine.get_definition(&def.id).unwrap().unwrap();
        assert_eq!(loaded.name, "After");
        assert_eq!(loaded.criteria.filters.len(), 1);
    }

    #[test]
    fn test_cached_card_before_refresh_is_empty() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let def = DashboardDefinition::new(DEFAULT_PROJECT, "Fresh");
        engine.save_definition(&def).unwrap();

        let card = engine.cached_score_card(&def, true).unwrap();
        assert!(card.score.is_none());
        assert!(card.history.is_empty());
        assert_eq!(card.definition.as_ref().map(|d| d.id), Some(def.id));
    }

    #[test]
    fn test_refresh_caches_results_and_appends_history() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let mut def = DashboardDefinition::new(DEFAULT_PROJECT, "History");
        def.cde_score = true;
        def.category = Some(Category::TableGroupsName);
        engine.save_definition(&def).unwrap();

        engine.refresh_results(&def.id, true).unwrap();
        engine.refresh_results(&def.id, false).unwrap();
        engine.refresh_results(&def.id, true).unwrap();

        let listed = engine
            .list_definitions(&DefinitionQuery {
                last_history_items: 3,
                ..Default::default()
            })
            .unwrap();
        // Two runs with history, two enabled scores each, newest three kept
        assert_eq!(listed[0].history.len(), 3);

        let card = engine.cached_score_card(&listed[0], false).unwrap();
        assert_eq!(rounded(card.score), Some(82.0));
        assert_eq!(card.categories.len(), 2);
        assert_eq!(card.categories[0].label, "Finance");
        assert_eq!(card.history.len(), 3);
        assert!(card.definition.is_none());
    }

    #[test]
    fn test_refresh_unknown_dashboard() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        assert!(matches!(
            engine.refresh_results(&Uuid::new_v4(), true),
            Err(ScorecardError::DashboardNotFound(_))
        ));
    }

    #[test]
    fn test_delete_definition() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let def = DashboardDefinition::new(DEFAULT_PROJECT, "Doomed");
        engine.save_definition(&def).unwrap();
        engine.refresh_results(&def.id, true).unwrap();

        assert!(engine.delete_definition(&def.id).unwrap());
        assert!(engine.get_definition(&def.id).unwrap().is_none());
        assert!(!engine.delete_definition(&def.id).unwrap());
    }

    #[test]
    fn test_breakdown_by_table_group() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let def = DashboardDefinition::new(DEFAULT_PROJECT, "Breakdown");

        let items = engine
            .breakdown(&def, ScoreType::Score, Category::TableGroupsName)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].group["table_groups_name"], "Finance");
        assert_eq!(rounded(Some(items[0].impact)), Some(55.6));
        assert_eq!(rounded(Some(items[0].score)), Some(50.0));
        assert_eq!(items[0].issue_ct, 10);
        assert_eq!(items[1].issue_ct, 7);
    }

    #[test]
    fn test_breakdown_by_column_carries_table_keys() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let def = DashboardDefinition::new(DEFAULT_PROJECT, "Columns");

        let items = engine
            .breakdown(&def, ScoreType::CdeScore, Category::ColumnName)
            .unwrap();
        assert_eq!(items.len(), 2);
        for item in &items {
            assert!(item.group.contains_key("table_groups_id"));
            assert!(item.group.contains_key("table_name"));
            assert!(item.group.contains_key("column_name"));
        }
    }

    #[test]
    fn test_issues_for_breakdown_value() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);
        let def = DashboardDefinition::new(DEFAULT_PROJECT, "Issues");

        let issues = engine
            .issues(&def, ScoreType::Score, Category::TableGroupsName, "sales")
            .unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type, "Pattern Mismatch");
        assert_eq!(issues[0].group["table_groups_name"], "sales");
        assert_eq!(issues[0].column.as_deref(), Some("email"));

        let cde = engine
            .issues(&def, ScoreType::CdeScore, Category::TableGroupsName, "sales")
            .unwrap();
        assert_eq!(cde.len(), 1);
    }

    #[test]
    fn test_filter_value_rows() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let filterable: Vec<Category> = Category::filterable().collect();
        let rows = engine
            .filter_value_rows(DEFAULT_PROJECT, &filterable)
            .unwrap();

        let sources: Vec<&str> = rows
            .iter()
            .filter(|r| r.category == Category::DataSource)
            .map(|r| r.value.as_str())
            .collect();
        assert_eq!(sources, vec!["oracle", "postgres", "Snowflake"]);
        assert!(rows.iter().all(|r| r.category.is_filterable()));
        assert!(!rows.iter().any(|r| r.value == "mysql"));
        assert!(engine.filter_value_rows(DEFAULT_PROJECT, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_column_hierarchy_order() {
        let conn = test_connection();
        let engine = SqliteScoringEngine::new(&conn);

        let columns = engine.column_hierarchy(DEFAULT_PROJECT).unwrap();
        let names: Vec<(&str, &str)> = columns
            .iter()
            .map(|c| (c.table_name.as_str(), c.column_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("ledger", "entry_id"),
                ("customers", "email"),
                ("orders", "id"),
                ("orders", "amount"),
            ]
        );
    }

    #[test]
    fn test_criteria_clause_shape() {
        let criteria = Criteria::from_filters(
            vec![condition("data_source", "a"), condition("data_source", "b")],
            true,
        );
        let (sql, params) = criteria_clause(&criteria).unwrap().unwrap();
        assert_eq!(sql, "(((data_source = ?) OR (data_source = ?)))");
        assert_eq!(params, vec!["a", "b"]);
        assert!(criteria_clause(&Criteria::default()).unwrap().is_none());
    }
}
