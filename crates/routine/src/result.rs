use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Row-set returned by a store command.
///
/// Cells are kept as text; `None` represents SQL NULL. Column ordering in
/// each row matches the `columns` vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Build a row-set from string literals. Empty cells are kept as empty strings.
    pub fn from_strs(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        }
    }

    /// The first cell of the first row, the shape of every scalar aggregate.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    /// Each row as trimmed column name → cell text. NULL cells become empty strings.
    pub fn rows_as_maps(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        let val = row.get(i).cloned().flatten().unwrap_or_default();
                        (col.trim().to_string(), val)
                    })
                    .collect()
            })
            .collect()
    }
}
