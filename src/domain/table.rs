//! Tabular payload exchanged between connectors, the store and callers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record keyed by column name
pub type Row = Map<String, Value>;

/// Columns probed, in order, when deriving the as-of marker of a payload
pub const AS_OF_COLUMNS: [&str; 2] = ["as_of", "observed_at"];

/// Column-ordered tabular payload
///
/// Column order is kept explicitly so a zero-row table still knows its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows, taking columns in first-seen order
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.push_row(row);
        self
    }

    /// Appends a row, registering any column not seen before
    pub fn push_row(&mut self, row: Row) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Value of `column` in the first row, if any
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(column))
    }

    /// As-of marker taken from the first row's `as_of`, then `observed_at`
    ///
    /// Null values are skipped; non-string values use their JSON rendering.
    pub fn as_of(&self) -> Option<String> {
        AS_OF_COLUMNS
            .iter()
            .filter(|column| self.has_column(column))
            .find_map(|column| match self.first_value(column) {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => Some(text.clone()),
                Some(other) => Some(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_rows_collects_columns_in_first_seen_order() {
        let table = Table::from_rows(vec![
            row(json!({"metric": "jobs", "value": 1})),
            row(json!({"metric": "jobs", "place_id": "p-1"})),
        ]);

        assert_eq!(table.row_count(), 2);
        assert!(table.has_column("place_id"));
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.columns()[2], "place_id");
    }

    #[test]
    fn test_empty_table_keeps_columns() {
        let table = Table::new(["place_id", "observed_at"]);

        assert!(table.is_empty());
        assert_eq!(table.columns(), ["place_id", "observed_at"]);
        assert_eq!(table.as_of(), None);

        let json = serde_json::to_string(&table).unwrap();
        let decoded: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_as_of_prefers_as_of_column() {
        let table = Table::from_rows(vec![row(json!({
            "as_of": "2024-03-01",
            "observed_at": "2024-01-01"
        }))]);

        assert_eq!(table.as_of().as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_as_of_skips_null_values() {
        let table = Table::from_rows(vec![row(json!({
            "as_of": null,
            "observed_at": "2024-01-01"
        }))]);

        assert_eq!(table.as_of().as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_as_of_renders_non_string_values() {
        let table = Table::from_rows(vec![row(json!({"observed_at": 2024}))]);

        assert_eq!(table.as_of().as_deref(), Some("2024"));
    }

    #[test]
    fn test_as_of_absent_without_marker_columns() {
        let table = Table::from_rows(vec![row(json!({"source_id": "connector.x"}))]);

        assert_eq!(table.as_of(), None);
    }
}
