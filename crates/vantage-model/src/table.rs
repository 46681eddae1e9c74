use crate::value::{ColumnType, Value};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Name and type of one table column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A fully materialized, homogeneously typed column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Number(Vec<f64>),
    Timestamp(Vec<DateTime<Utc>>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Number(values) => values.len(),
            Column::Timestamp(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Number(_) => ColumnType::Number,
            Column::Timestamp(_) => ColumnType::Timestamp,
            Column::Text(_) => ColumnType::Text,
        }
    }

    pub fn value(&self, row: usize) -> Option<Value> {
        match self {
            Column::Number(values) => values.get(row).map(|v| Value::Number(*v)),
            Column::Timestamp(values) => values.get(row).map(|v| Value::Timestamp(*v)),
            Column::Text(values) => values.get(row).map(|v| Value::Text(v.clone())),
        }
    }

    /// Text rendition of one cell, as used by identity grouping and the
    /// textual comparison fallback.
    pub fn text(&self, row: usize) -> Option<String> {
        self.value(row).map(|v| v.to_text())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("a table must have at least one column")]
    NoColumns,
    #[error("duplicate column name \"{0}\"")]
    DuplicateColumn(String),
    #[error("row has {got} values but the table has {expected} columns")]
    RowArity { expected: usize, got: usize },
    #[error("value for column \"{column}\" must be of type: {expected}")]
    TypeMismatch { column: String, expected: ColumnType },
}

/// Row-at-a-time ingestion for [`Table`].
///
/// The schema is fixed up front; every pushed row is checked for arity and
/// per-column type before being committed, so a builder never holds a
/// partially appended row.
#[derive(Debug)]
pub struct TableBuilder {
    schema: Vec<ColumnSchema>,
    columns: Vec<Column>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(schema: Vec<ColumnSchema>) -> Result<Self, TableError> {
        if schema.is_empty() {
            return Err(TableError::NoColumns);
        }
        for (i, col) in schema.iter().enumerate() {
            if schema[..i].iter().any(|other| other.name == col.name) {
                return Err(TableError::DuplicateColumn(col.name.clone()));
            }
        }
        let columns = schema
            .iter()
            .map(|col| match col.column_type {
                ColumnType::Number => Column::Number(Vec::new()),
                ColumnType::Timestamp => Column::Timestamp(Vec::new()),
                ColumnType::Text => Column::Text(Vec::new()),
            })
            .collect();
        Ok(Self {
            schema,
            columns,
            rows: 0,
        })
    }

    pub fn push_row(&mut self, row: &[Value]) -> Result<(), TableError> {
        if row.len() != self.schema.len() {
            return Err(TableError::RowArity {
                expected: self.schema.len(),
                got: row.len(),
            });
        }
        for (schema, value) in self.schema.iter().zip(row) {
            if value.column_type() != schema.column_type {
                return Err(TableError::TypeMismatch {
                    column: schema.name.clone(),
                    expected: schema.column_type,
                });
            }
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            match (column, value) {
                (Column::Number(values), Value::Number(v)) => values.push(*v),
                (Column::Timestamp(values), Value::Timestamp(v)) => values.push(*v),
                (Column::Text(values), Value::Text(v)) => values.push(v.clone()),
                // Types were checked above.
                _ => unreachable!("column/value type mismatch after validation"),
            }
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Table {
        Table {
            schema: self.schema,
            columns: self.columns,
            rows: self.rows,
        }
    }
}

/// An ordered-rows × named-columns table.
///
/// Tables are supplied fully materialized by the host; this type does not
/// concern itself with storage layout, compression, or spill-to-disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    schema: Vec<ColumnSchema>,
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(self.column_index(name)?)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        Some(self.schema.get(self.column_index(name)?)?.column_type)
    }

    pub fn value(&self, row: usize, name: &str) -> Option<Value> {
        self.column(name)?.value(row)
    }
}
