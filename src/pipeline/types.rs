use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::pipeline::error::PipelineError;

/// The user's question. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalLanguageQuery(String);

impl NaturalLanguageQuery {
    pub fn new(text: impl Into<String>) -> Result<Self, PipelineError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::InvalidQuestion("question must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NaturalLanguageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Candidate SQL text with no trust attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlStatement(String);

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column name to scalar (string, number, boolean or null), in SELECT-list order.
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    /// Column order follows the first row's keys; every other row must carry
    /// exactly the same keys.
    pub fn from_rows(rows: Vec<ResultRow>) -> Result<Self, PipelineError> {
        let columns: Vec<String> = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();

        if let Some(row) = rows
            .iter()
            .position(|r| r.len() != columns.len() || !columns.iter().all(|c| r.contains_key(c)))
        {
            return Err(PipelineError::InconsistentRows { row });
        }

        Ok(Self { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Non-null values of `column`, in row order.
    pub fn values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a serde_json::Value> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column))
            .filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_key: String,
    pub y_keys: Vec<String>,
    pub colors: BTreeMap<String, String>,
    pub legend: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationFragment {
    pub fragment: String,
    pub description: String,
}

/// Ordered fragments, each a verbatim substring of the explained statement.
pub type Explanation = Vec<ExplanationFragment>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(values: Vec<serde_json::Value>) -> Vec<ResultRow> {
        values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn columns_follow_the_first_row() {
        let set = ResultSet::from_rows(rows(vec![
            json!({"escola": "A", "total": 2}),
            json!({"total": 1, "escola": "B"}),
        ]))
        .unwrap();
        assert_eq!(set.columns, vec!["escola", "total"]);
        assert_eq!(set.rows.len(), 2);
    }

    #[test]
    fn rows_with_missing_or_extra_keys_are_rejected() {
        let missing = ResultSet::from_rows(rows(vec![
            json!({"escola": "A", "total": 2}),
            json!({"escola": "B"}),
        ]));
        assert!(matches!(missing, Err(PipelineError::InconsistentRows { row: 1 })));

        let extra = ResultSet::from_rows(rows(vec![
            json!({"escola": "A", "total": 2}),
            json!({"escola": "B", "total": 1}),
            json!({"escola": "C", "total": 1, "bairro": "Centro"}),
        ]));
        assert!(matches!(extra, Err(PipelineError::InconsistentRows { row: 2 })));

        let renamed = ResultSet::from_rows(rows(vec![
            json!({"escola": "A", "total": 2}),
            json!({"escola": "B", "quantidade": 1}),
        ]));
        assert!(matches!(renamed, Err(PipelineError::InconsistentRows { row: 1 })));
    }

    #[test]
    fn no_rows_is_an_empty_set() {
        let set = ResultSet::from_rows(Vec::new()).unwrap();
        assert!(set.columns.is_empty());
        assert!(set.is_empty());
    }
}
