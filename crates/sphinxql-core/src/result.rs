//! Decoded result sets.

use crate::row::{ColumnInfo, Row};
use std::sync::Arc;

/// The fully-decoded result set of one statement.
///
/// A multi-statement submission yields one `ResultTable` per
/// result-producing statement, in statement order. Statements that produce
/// no result set (UPDATE, DELETE, ...) contribute no table at all.
#[derive(Debug, Clone)]
pub struct ResultTable {
    columns: Arc<ColumnInfo>,
    rows: Vec<Row>,
}

impl ResultTable {
    /// Build a table from its column metadata and rows.
    ///
    /// Every row is expected to share `columns`; the decoder guarantees this.
    pub fn new(columns: Arc<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column metadata for this table.
    pub fn columns(&self) -> &ColumnInfo {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows, in fetch order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consume the table, yielding its rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Iterate over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for ResultTable {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
