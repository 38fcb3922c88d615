use std::sync::Arc;

use sqlx::Row as _;

use crate::error::Error;
use crate::value::{self, Value};

/// A decoded row: column names plus values, in the order the driver returned
/// them. Column names are shared across every row of a result set.
#[derive(Debug, Clone)]
pub struct Row {
  columns: Arc<Vec<String>>,
  values: Vec<Value>,
}

impl Row {
  pub fn column_count(&self) -> usize {
    self.values.len()
  }

  pub fn column_name(&self, idx: usize) -> Option<&str> {
    self.columns.get(idx).map(|s| s.as_str())
  }

  pub fn column_names(&self) -> &[String] {
    &self.columns
  }

  pub fn get_value(&self, idx: usize) -> Option<&Value> {
    self.values.get(idx)
  }

  pub fn get_by_name(&self, name: &str) -> Option<&Value> {
    let idx = self.columns.iter().position(|c| c == name)?;
    self.values.get(idx)
  }
}

/// A fully materialized result set. The teacher streams rows off a background
/// actor thread one at a time; since `sqlx` is natively async we can collect
/// eagerly without blocking anything, which keeps `RowLoader` simple.
#[derive(Debug, Clone, Default)]
pub struct Rows {
  rows: Vec<Row>,
}

impl Rows {
  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Row> {
    self.rows.iter()
  }

  pub fn into_vec(self) -> Vec<Row> {
    self.rows
  }
}

impl IntoIterator for Rows {
  type Item = Row;
  type IntoIter = std::vec::IntoIter<Row>;

  fn into_iter(self) -> Self::IntoIter {
    self.rows.into_iter()
  }
}

pub(crate) fn decode_rows(raw_rows: Vec<sqlx::any::AnyRow>) -> Result<Rows, Error> {
  let Some(first) = raw_rows.first() else {
    return Ok(Rows::default());
  };

  let columns: Arc<Vec<String>> = Arc::new(
    (0..first.columns().len())
      .map(|i| value::column_name(first, i).unwrap_or_default().to_string())
      .collect(),
  );

  let mut rows = Vec::with_capacity(raw_rows.len());
  for raw in &raw_rows {
    let values = (0..columns.len())
      .map(|i| value::decode_column(raw, i))
      .collect::<Result<Vec<_>, _>>()?;
    rows.push(Row {
      columns: columns.clone(),
      values,
    });
  }

  return Ok(Rows { rows });
}
