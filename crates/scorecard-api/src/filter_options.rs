//! Dashboard-builder filter options
//!
//! Combines the static option tables from the category vocabulary with two
//! store queries (distinct filter values and the column hierarchy). Each of
//! the five parts is computed only when its include flag is set. Field
//! metadata and field values share the `include_filter_values` flag.

use axum::{
    extract::{Query, State},
    Json,
};
use dq_scorecard_core::{
    categories::{
        category_options, filter_field_metadata, grouping_options, FilterFieldMeta,
        LabeledOption,
    },
    validation, Category, ColumnHierarchy, Result, ScoreType, ScorecardError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::CatalogQueries;
use crate::error::ApiError;
use crate::session::with_session;
use crate::AppState;

/// Which parts of [`FilterOptions`] to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeFlags {
    pub filter_values: bool,
    pub columns: bool,
    pub category_options: bool,
    pub grouping_options: bool,
    pub type_options: bool,
}

impl IncludeFlags {
    pub fn all() -> Self {
        Self {
            filter_values: true,
            columns: true,
            category_options: true,
            grouping_options: true,
            type_options: true,
        }
    }

    pub fn none() -> Self {
        Self {
            filter_values: false,
            columns: false,
            category_options: false,
            grouping_options: false,
            type_options: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub filter_fields_metadata: Vec<FilterFieldMeta>,
    pub filter_values: BTreeMap<String, Vec<String>>,
    pub columns: Vec<ColumnHierarchy>,
    pub category_options: Vec<LabeledOption>,
    pub score_grouping_options: Vec<LabeledOption>,
    pub score_type_options: Vec<LabeledOption>,
}

/// Assemble filter options for a project.
///
/// The project is checked once up front; an unknown project fails before any
/// other query runs.
pub fn aggregate<Q: CatalogQueries + ?Sized>(
    queries: &Q,
    project_code: &str,
    flags: IncludeFlags,
) -> Result<FilterOptions> {
    if !queries.project_exists(project_code)? {
        return Err(ScorecardError::ProjectNotFound(project_code.to_string()));
    }

    let mut options = FilterOptions::default();

    if flags.filter_values {
        options.filter_fields_metadata = filter_field_metadata();
        options.filter_values = filter_values(queries, project_code)?;
    }

    if flags.columns {
        options.columns = queries.column_hierarchy(project_code)?;
    }

    if flags.category_options {
        options.category_options = category_options();
    }

    if flags.grouping_options {
        options.score_grouping_options = grouping_options();
    }

    if flags.type_options {
        options.score_type_options = score_type_options();
    }

    Ok(options)
}

/// Distinct values per filterable category, in query order.
fn filter_values<Q: CatalogQueries + ?Sized>(
    queries: &Q,
    project_code: &str,
) -> Result<BTreeMap<String, Vec<String>>> {
    let categories: Vec<Category> = Category::filterable().collect();
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for row in queries.filter_value_rows(project_code, &categories)? {
        if row.value.is_empty() {
            continue;
        }
        values
            .entry(row.category.as_str().to_string())
            .or_default()
            .push(row.value);
    }
    Ok(values)
}

fn score_type_options() -> Vec<LabeledOption> {
    ScoreType::all()
        .iter()
        .map(|t| LabeledOption {
            value: t.as_str().to_string(),
            label: t.label().to_string(),
        })
        .collect()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterOptionsParams {
    pub project_code: String,
    #[serde(default = "default_true")]
    pub include_filter_values: bool,
    #[serde(default = "default_true")]
    pub include_columns: bool,
    #[serde(default = "default_true")]
    pub include_category_options: bool,
    #[serde(default = "default_true")]
    pub include_score_grouping_options: bool,
    #[serde(default = "default_true")]
    pub include_score_type_options: bool,
}

impl FilterOptionsParams {
    pub fn flags(&self) -> IncludeFlags {
        IncludeFlags {
            filter_values: self.include_filter_values,
            columns: self.include_columns,
            category_options: self.include_category_options,
            grouping_options: self.include_score_grouping_options,
            type_options: self.include_score_type_options,
        }
    }
}

/// `GET /filter-options`
pub async fn get_filter_options(
    State(state): State<AppState>,
    Query(params): Query<FilterOptionsParams>,
) -> std::result::Result<Json<FilterOptions>, ApiError> {
    validation::validate_project_code(&params.project_code)?;
    let flags = params.flags();
    let project_code = params.project_code;

    tracing::debug!(project_code = %project_code, ?flags, "Fetching filter options");

    let options = with_session(&state, move |engine| {
        aggregate(engine, &project_code, flags)
    })
    .await?;

    Ok(Json(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FilterValueRow;
    use std::cell::RefCell;

    /// Catalog fake with canned rows that records every query.
    struct FakeCatalog {
        known_project: &'static str,
        rows: Vec<FilterValueRow>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl FakeCatalog {
        fn new(rows: Vec<FilterValueRow>) -> Self {
            Self {
                known_project: "DEFAULT",
                rows,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }
    }

    impl CatalogQueries for FakeCatalog {
        fn project_exists(&self, project_code: &str) -> Result<bool> {
            self.calls.borrow_mut().push("project_exists");
            Ok(project_code == self.known_project)
        }

        fn filter_value_rows(
            &self,
            _project_code: &str,
            categories: &[Category],
        ) -> Result<Vec<FilterValueRow>> {
            self.calls.borrow_mut().push("filter_value_rows");
            assert_eq!(categories.len(), 9);
            Ok(self.rows.clone())
        }

        fn column_hierarchy(&self, _project_code: &str) -> Result<Vec<ColumnHierarchy>> {
            self.calls.borrow_mut().push("column_hierarchy");
            Ok(vec![ColumnHierarchy {
                column_id: "c1".to_string(),
                column_name: "id".to_string(),
                table_id: "t1".to_string(),
                table_name: "orders".to_string(),
                table_group_id: "g1".to_string(),
                table_group_name: "sales".to_string(),
            }])
        }
    }

    fn row(category: Category, value: &str) -> FilterValueRow {
        FilterValueRow {
            category,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_all_flags() {
        let catalog = FakeCatalog::new(vec![
            row(Category::DataSource, "oracle"),
            row(Category::TableGroupsName, "Finance"),
            row(Category::DataSource, ""),
            row(Category::DataSource, "postgres"),
        ]);

        let options = aggregate(&catalog, "DEFAULT", IncludeFlags::all()).unwrap();

        assert_eq!(options.filter_fields_metadata.len(), 9);
        assert_eq!(options.filter_values["data_source"], vec!["oracle", "postgres"]);
        assert_eq!(options.filter_values["table_groups_name"], vec!["Finance"]);
        assert_eq!(options.columns.len(), 1);
        assert_eq!(options.category_options.len(), 10);
        assert_eq!(options.score_grouping_options.len(), 13);
        assert_eq!(
            options.score_type_options,
            vec![
                LabeledOption {
                    value: "score".to_string(),
                    label: "Total Score".to_string()
                },
                LabeledOption {
                    value: "cde_score".to_string(),
                    label: "CDE Score".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_no_flags_skips_queries() {
        let catalog = FakeCatalog::new(vec![row(Category::DataSource, "oracle")]);
        let options = aggregate(&catalog, "DEFAULT", IncludeFlags::none()).unwrap();

        assert_eq!(options, FilterOptions::default());
        assert_eq!(catalog.calls(), vec!["project_exists"]);
    }

    #[test]
    fn test_flags_are_independent() {
        let catalog = FakeCatalog::new(vec![]);
        let flags = IncludeFlags {
            columns: true,
            ..IncludeFlags::none()
        };
        let options = aggregate(&catalog, "DEFAULT", flags).unwrap();

        assert_eq!(catalog.calls(), vec!["project_exists", "column_hierarchy"]);
        assert!(options.filter_fields_metadata.is_empty());
        assert!(options.score_type_options.is_empty());
        assert_eq!(options.columns.len(), 1);
    }

    #[test]
    fn test_unknown_project_fails_first() {
        let catalog = FakeCatalog::new(vec![]);
        let err = aggregate(&catalog, "NOPE", IncludeFlags::all()).unwrap_err();

        assert!(matches!(err, ScorecardError::ProjectNotFound(ref p) if p == "NOPE"));
        assert_eq!(catalog.calls(), vec!["project_exists"]);
    }

    #[test]
    fn test_params_default_to_everything() {
        let params: FilterOptionsParams =
            serde_json::from_str(r#"{"project_code":"DEFAULT"}"#).unwrap();
        assert_eq!(params.flags(), IncludeFlags::all());
    }
}
