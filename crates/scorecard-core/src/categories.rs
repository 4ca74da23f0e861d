//! Category vocabulary for scorecard grouping and filtering
//!
//! Every place that needs a list of categories (group-by validation, filter
//! field labels, "display on scorecard" options, score grouping options, the
//! dynamic filter value query) derives it from [`CATEGORY_TABLE`]. The
//! dropdown options follow [`DISPLAY_ORDER`]. Each table entry carries three
//! flags:
//! - **filterable**: values can be used in dashboard filters and are listed
//!   in the filter-options value sets
//! - **groupable**: valid `group_by` value for breakdown and issue queries
//! - **displayable**: valid top-level scorecard category for a dashboard

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ScorecardError;

/// A canonical scorecard category.
///
/// Serialized as the snake_case column name used by the scoring store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ColumnName,
    TableName,
    DqDimension,
    SemanticDataType,
    TableGroupsName,
    DataLocation,
    DataSource,
    SourceSystem,
    SourceProcess,
    BusinessDomain,
    StakeholderGroup,
    TransformLevel,
    DataProduct,
}

/// One row of the category table.
#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub category: Category,
    pub label: &'static str,
    pub filterable: bool,
    pub groupable: bool,
    pub displayable: bool,
}

const fn spec(
    category: Category,
    label: &'static str,
    filterable: bool,
    displayable: bool,
) -> CategorySpec {
    CategorySpec {
        category,
        label,
        filterable,
        groupable: true,
        displayable,
    }
}

/// The category table, in canonical vocabulary order.
pub const CATEGORY_TABLE: [CategorySpec; 13] = [
    spec(Category::ColumnName, "Column", false, false),
    spec(Category::TableName, "Table", false, false),
    spec(Category::DqDimension, "Quality Dimension", false, true),
    spec(Category::SemanticDataType, "Semantic Data Type", false, false),
    spec(Category::TableGroupsName, "Table Group", true, true),
    spec(Category::DataLocation, "Data Location", true, true),
    spec(Category::DataSource, "Data Source", true, true),
    spec(Category::SourceSystem, "Source System", true, true),
    spec(Category::SourceProcess, "Source Process", true, true),
    spec(Category::BusinessDomain, "Business Domain", true, true),
    spec(Category::StakeholderGroup, "Stakeholder Group", true, true),
    spec(Category::TransformLevel, "Transform Level", true, true),
    spec(Category::DataProduct, "Data Product", true, true),
];

/// Displayable categories in "display on scorecard" dropdown order.
pub const DISPLAY_ORDER: [Category; 10] = [
    Category::TableGroupsName,
    Category::DataLocation,
    Category::DataSource,
    Category::SourceSystem,
    Category::SourceProcess,
    Category::BusinessDomain,
    Category::StakeholderGroup,
    Category::TransformLevel,
    Category::DqDimension,
    Category::DataProduct,
];

/// Normalized spellings that resolve to `table_groups_name`.
const TABLE_GROUP_ALIASES: [&str; 2] = ["table group", "tablegroup"];

impl Category {
    /// Store column name (also the wire value).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ColumnName => "column_name",
            Category::TableName => "table_name",
            Category::DqDimension => "dq_dimension",
            Category::SemanticDataType => "semantic_data_type",
            Category::TableGroupsName => "table_groups_name",
            Category::DataLocation => "data_location",
            Category::DataSource => "data_source",
            Category::SourceSystem => "source_system",
            Category::SourceProcess => "source_process",
            Category::BusinessDomain => "business_domain",
            Category::StakeholderGroup => "stakeholder_group",
            Category::TransformLevel => "transform_level",
            Category::DataProduct => "data_product",
        }
    }

    pub fn spec(&self) -> &'static CategorySpec {
        CATEGORY_TABLE
            .iter()
            .find(|s| s.category == *self)
            .unwrap_or(&CATEGORY_TABLE[0])
    }

    pub fn label(&self) -> &'static str {
        self.spec().label
    }

    pub fn is_filterable(&self) -> bool {
        self.spec().filterable
    }

    pub fn is_groupable(&self) -> bool {
        self.spec().groupable
    }

    pub fn is_displayable(&self) -> bool {
        self.spec().displayable
    }

    /// All categories in vocabulary order.
    pub fn all() -> impl Iterator<Item = Category> {
        CATEGORY_TABLE.iter().map(|s| s.category)
    }

    pub fn filterable() -> impl Iterator<Item = Category> {
        CATEGORY_TABLE
            .iter()
            .filter(|s| s.filterable)
            .map(|s| s.category)
    }

    pub fn groupable() -> impl Iterator<Item = Category> {
        CATEGORY_TABLE
            .iter()
            .filter(|s| s.groupable)
            .map(|s| s.category)
    }

    pub fn displayable() -> impl Iterator<Item = Category> {
        CATEGORY_TABLE
            .iter()
            .filter(|s| s.displayable)
            .map(|s| s.category)
    }

    /// Exact lookup against the vocabulary. No alias handling.
    pub fn from_column(name: &str) -> Option<Category> {
        Category::all().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ScorecardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_group_by(s)
    }
}

/// Resolve legacy aliases for a group-by token.
///
/// The token is lower-cased, underscores become spaces and surrounding
/// whitespace is trimmed. If the result is a table-group alias the canonical
/// `table_groups_name` is returned, otherwise the original token is passed
/// through untouched.
pub fn resolve_alias(raw: &str) -> &str {
    let folded = raw.to_lowercase().replace('_', " ");
    if TABLE_GROUP_ALIASES.contains(&folded.trim()) {
        Category::TableGroupsName.as_str()
    } else {
        raw
    }
}

/// Canonicalize a user-supplied group-by token.
///
/// Only the alias step is case and separator insensitive. After alias
/// resolution the token must match a groupable vocabulary entry exactly.
pub fn normalize_group_by(raw: &str) -> Result<Category, ScorecardError> {
    let resolved = resolve_alias(raw);
    Category::from_column(resolved)
        .filter(Category::is_groupable)
        .ok_or_else(|| ScorecardError::InvalidCategory {
            value: raw.to_string(),
            allowed: Category::groupable().map(|c| c.as_str()).collect(),
        })
}

/// Canonicalize a dashboard's top-level display category.
///
/// Uses the same alias rules as [`normalize_group_by`] but only accepts
/// categories flagged displayable.
pub fn normalize_display_category(raw: &str) -> Result<Category, ScorecardError> {
    let invalid = || ScorecardError::InvalidCategory {
        value: raw.to_string(),
        allowed: Category::displayable().map(|c| c.as_str()).collect(),
    };
    let category = Category::from_column(resolve_alias(raw)).ok_or_else(invalid)?;
    if category.is_displayable() {
        Ok(category)
    } else {
        Err(invalid())
    }
}

/// A `(value, label)` option pair as presented to the dashboard builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledOption {
    pub value: String,
    pub label: String,
}

/// A `(field, label)` pair describing a filter field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFieldMeta {
    pub field: String,
    pub label: String,
}

pub fn filter_field_metadata() -> Vec<FilterFieldMeta> {
    Category::filterable()
        .map(|c| FilterFieldMeta {
            field: c.as_str().to_string(),
            label: c.label().to_string(),
        })
        .collect()
}

pub fn category_options() -> Vec<LabeledOption> {
    DISPLAY_ORDER.iter().copied().map(labeled).collect()
}

pub fn grouping_options() -> Vec<LabeledOption> {
    Category::groupable().map(labeled).collect()
}

fn labeled(category: Category) -> LabeledOption {
    LabeledOption {
        value: category.as_str().to_string(),
        label: category.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCABULARY: [&str; 13] = [
        "column_name",
        "table_name",
        "dq_dimension",
        "semantic_data_type",
        "table_groups_name",
        "data_location",
        "data_source",
        "source_system",
        "source_process",
        "business_domain",
        "stakeholder_group",
        "transform_level",
        "data_product",
    ];

    #[test]
    fn test_vocabulary_order() {
        let names: Vec<&str> = Category::all().map(|c| c.as_str()).collect();
        assert_eq!(names, VOCABULARY);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in VOCABULARY {
            let once = normalize_group_by(name).unwrap();
            let twice = normalize_group_by(once.as_str()).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once.as_str(), name);
        }
    }

    #[test]
    fn test_table_group_aliases() {
        for alias in ["table group", "table_group", "tablegroup", "TableGroup", " Table_Group "] {
            assert_eq!(
                normalize_group_by(alias).unwrap(),
                Category::TableGroupsName,
                "alias {:?}",
                alias
            );
        }
    }

    #[test]
    fn test_non_alias_tokens_require_exact_match() {
        assert!(normalize_group_by("Table_Name").is_err());
        assert!(normalize_group_by("table name").is_err());
        assert!(normalize_group_by("semantic_data_typo").is_err());
    }

    #[test]
    fn test_invalid_category_lists_full_vocabulary() {
        match normalize_group_by("not_a_category") {
            Err(ScorecardError::InvalidCategory { value, allowed }) => {
                assert_eq!(value, "not_a_category");
                assert_eq!(allowed, VOCABULARY.to_vec());
            }
            other => panic!("expected InvalidCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_category_message() {
        let err = normalize_group_by("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("column_name, table_name"));
        assert!(msg.ends_with("data_product"));
    }

    #[test]
    fn test_filterable_set() {
        let filterable: Vec<&str> = Category::filterable().map(|c| c.as_str()).collect();
        assert_eq!(filterable.len(), 9);
        for excluded in ["column_name", "table_name", "dq_dimension", "semantic_data_type"] {
            assert!(!filterable.contains(&excluded));
        }
        assert!(Category::filterable().all(|c| c.is_groupable()));
    }

    #[test]
    fn test_option_lists_stay_consistent() {
        assert_eq!(grouping_options().len(), 13);
        let grouping: Vec<String> = grouping_options().into_iter().map(|o| o.value).collect();
        assert_eq!(grouping, VOCABULARY.to_vec());

        let categories: Vec<String> = category_options().into_iter().map(|o| o.value).collect();
        assert_eq!(categories.len(), 10);
        for excluded in ["column_name", "table_name", "semantic_data_type"] {
            assert!(!categories.contains(&excluded.to_string()));
        }

        let fields = filter_field_metadata();
        assert_eq!(fields[0].field, "table_groups_name");
        assert_eq!(fields[0].label, "Table Group");
    }

    #[test]
    fn test_category_options_follow_dropdown_order() {
        let values: Vec<String> = category_options().into_iter().map(|o| o.value).collect();
        assert_eq!(
            values,
            vec![
                "table_groups_name",
                "data_location",
                "data_source",
                "source_system",
                "source_process",
                "business_domain",
                "stakeholder_group",
                "transform_level",
                "dq_dimension",
                "data_product",
            ]
        );
        assert_eq!(category_options()[8].label, "Quality Dimension");

        // Same set as the displayable flag, only reordered
        let mut ordered = DISPLAY_ORDER.to_vec();
        ordered.sort();
        let mut flagged: Vec<Category> = Category::displayable().collect();
        flagged.sort();
        assert_eq!(ordered, flagged);
    }

    #[test]
    fn test_display_category() {
        assert_eq!(
            normalize_display_category("dq_dimension").unwrap(),
            Category::DqDimension
        );
        assert_eq!(
            normalize_display_category("table_group").unwrap(),
            Category::TableGroupsName
        );
        assert!(normalize_display_category("column_name").is_err());
        assert!(normalize_display_category("semantic_data_type").is_err());
    }

    #[test]
    fn test_serde_uses_column_names() {
        let json = serde_json::to_string(&Category::TableGroupsName).unwrap();
        assert_eq!(json, "\"table_groups_name\"");
        let parsed: Category = serde_json::from_str("\"dq_dimension\"").unwrap();
        assert_eq!(parsed, Category::DqDimension);
    }
}
