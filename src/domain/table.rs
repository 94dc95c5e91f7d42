//! Column-oriented tabular view.
//!
//! This is the only tabular shape the crate knows about. Missing cells are
//! `None` in every column type; numeric columns never store `NaN`.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TsError};

/// Physical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Timestamp,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Text => "string",
        };
        f.write_str(s)
    }
}

/// Typed cell storage for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Timestamp(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValues::Numeric(_) => ColumnType::Numeric,
            ColumnValues::Timestamp(_) => ColumnType::Timestamp,
            ColumnValues::Text(_) => ColumnType::Text,
        }
    }

    /// Reorder (or subset/repeat) rows by position.
    pub fn take(&self, rows: &[usize]) -> ColumnValues {
        match self {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(rows.iter().map(|&i| v[i]).collect()),
            ColumnValues::Timestamp(v) => ColumnValues::Timestamp(rows.iter().map(|&i| v[i]).collect()),
            ColumnValues::Text(v) => ColumnValues::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    /// Same as [`ColumnValues::take`] but `None` positions become missing cells.
    pub fn take_or_missing(&self, rows: &[Option<usize>]) -> ColumnValues {
        match self {
            ColumnValues::Numeric(v) => {
                ColumnValues::Numeric(rows.iter().map(|r| r.and_then(|i| v[i])).collect())
            }
            ColumnValues::Timestamp(v) => {
                ColumnValues::Timestamp(rows.iter().map(|r| r.and_then(|i| v[i])).collect())
            }
            ColumnValues::Text(v) => {
                ColumnValues::Text(rows.iter().map(|r| r.and_then(|i| v[i].clone())).collect())
            }
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn timestamp(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Timestamp(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_type(&self) -> ColumnType {
        self.values.column_type()
    }
}

/// Ordered rows over named, typed columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableView {
    columns: Vec<Column>,
}

impl TableView {
    /// Build a table; all columns must have the same length and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut table = TableView::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.column(&column.name).is_some() {
            return Err(TsError::InvalidData(format!("duplicate column name '{}'", column.name)));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(TsError::InvalidData(format!(
                    "column '{}' has {} rows, table has {}",
                    column.name,
                    column.len(),
                    first.len()
                )));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column or fail with `MissingColumnError`.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| TsError::MissingColumn {
            column: name.to_string(),
        })
    }

    /// Look up a numeric column.
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        let column = self.require(name)?;
        match &column.values {
            ColumnValues::Numeric(v) => Ok(v),
            other => Err(TsError::TypeMismatch {
                column: name.to_string(),
                expected: ColumnType::Numeric.to_string(),
                found: other.column_type().to_string(),
            }),
        }
    }

    /// Look up a timestamp column.
    pub fn timestamps(&self, name: &str) -> Result<&[Option<NaiveDateTime>]> {
        let column = self.require(name)?;
        match &column.values {
            ColumnValues::Timestamp(v) => Ok(v),
            other => Err(TsError::TypeMismatch {
                column: name.to_string(),
                expected: ColumnType::Timestamp.to_string(),
                found: other.column_type().to_string(),
            }),
        }
    }

    /// New table with rows picked by position (in the given order).
    pub fn take_rows(&self, rows: &[usize]) -> TableView {
        TableView {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.take(rows),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_columns() {
        let err = TableView::new(vec![
            Column::numeric("a", vec![Some(1.0), Some(2.0)]),
            Column::numeric("b", vec![Some(1.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, TsError::InvalidData(_)));
    }

    #[test]
    fn typed_lookup_reports_mismatch() {
        let table = TableView::new(vec![Column::text("name", vec![Some("x".into())])]).unwrap();
        assert!(matches!(table.numeric("name"), Err(TsError::TypeMismatch { .. })));
        assert!(matches!(table.numeric("value"), Err(TsError::MissingColumn { .. })));
    }

    #[test]
    fn take_rows_reorders_every_column() {
        let table = TableView::new(vec![
            Column::numeric("a", vec![Some(1.0), None, Some(3.0)]),
            Column::text("b", vec![Some("x".into()), Some("y".into()), None]),
        ])
        .unwrap();
        let t = table.take_rows(&[2, 0]);
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.numeric("a").unwrap(), &[Some(3.0), Some(1.0)]);
    }
}
