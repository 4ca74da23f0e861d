//! Dashboard criteria
//!
//! A dashboard's filter list plus its `group_by_field` flag is turned into a
//! [`Criteria`] value that the scoring engine stores and evaluates. The
//! builder carries every condition through verbatim; field names are checked
//! by the engine when the criteria is evaluated.

use serde::{Deserialize, Serialize};

/// A linked field/value pair narrowing the same logical filter group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedFilter {
    pub field: String,
    pub value: String,
}

/// One dashboard filter as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub value: String,
    /// Conjunctive sibling constraints, in the order supplied.
    #[serde(default)]
    pub others: Vec<LinkedFilter>,
}

/// How conditions are combined when the engine evaluates the criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CriteriaOperand {
    And,
    Or,
}

/// Engine-native criteria for a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    /// `AND` when conditions are grouped by field, `OR` otherwise.
    pub operand: CriteriaOperand,
    pub group_by_field: bool,
    pub filters: Vec<FilterCondition>,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::from_filters(Vec::new(), true)
    }
}

impl Criteria {
    /// Build criteria from an ordered filter list.
    pub fn from_filters(filters: Vec<FilterCondition>, group_by_field: bool) -> Self {
        Criteria {
            operand: if group_by_field {
                CriteriaOperand::And
            } else {
                CriteriaOperand::Or
            },
            group_by_field,
            filters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Conditions grouped by field name, in first-seen field order.
    ///
    /// With `group_by_field` unset every condition forms its own group.
    pub fn condition_groups(&self) -> Vec<Vec<&FilterCondition>> {
        if !self.group_by_field {
            return self.filters.iter().map(|f| vec![f]).collect();
        }

        let mut groups: Vec<(&str, Vec<&FilterCondition>)> = Vec::new();
        for filter in &self.filters {
            match groups.iter_mut().find(|(field, _)| *field == filter.field) {
                Some((_, members)) => members.push(filter),
                None => groups.push((filter.field.as_str(), vec![filter])),
            }
        }
        groups.into_iter().map(|(_, members)| members).collect()
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::ScorecardError::SerializationError(e.to_string()))
    }

    /// Parse stored criteria.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| crate::ScorecardError::SerializationError(e.to_string()))
    }
}

/// Resolve the criteria after a partial update.
///
/// An explicit filter list (even an empty one) replaces the criteria, with
/// `group_by_field` defaulting to `true` when not supplied. An absent filter
/// list keeps the existing criteria, whatever `group_by_field` says.
pub fn apply_criteria_update(
    existing: &Criteria,
    filters: Option<Vec<FilterCondition>>,
    group_by_field: Option<bool>,
) -> Criteria {
    match filters {
        Some(filters) => Criteria::from_filters(filters, group_by_field.unwrap_or(true)),
        None => existing.clone(),
    }
}
