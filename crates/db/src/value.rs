use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::error::Error;

/// A single cell, dialect-independent. Mirrors the shape of the values the
/// generated SQL ever binds or reads back: nothing in this schema model needs
/// arrays, composite types, or driver-specific extensions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Blob(Vec<u8>),
}

impl Value {
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Integer(v) => Some(*v),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Text(v) => Some(v.as_str()),
      _ => None,
    }
  }

  pub fn as_blob(&self) -> Option<&[u8]> {
    match self {
      Value::Blob(v) => Some(v.as_slice()),
      _ => None,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::Integer(v)
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::Text(v)
  }
}

impl From<Vec<u8>> for Value {
  fn from(v: Vec<u8>) -> Self {
    Value::Blob(v)
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Value::Real(v)
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Integer(if v { 1 } else { 0 })
  }
}

impl<T> From<Option<T>> for Value
where
  Value: From<T>,
{
  fn from(v: Option<T>) -> Self {
    match v {
      Some(v) => Value::from(v),
      None => Value::Null,
    }
  }
}

/// Decode column `idx` of `row` into a [`Value`], dispatching on the driver's
/// reported type name rather than guessing. `sqlx::Any` exposes whichever
/// concrete backend type info Postgres/MySQL return, so this covers the
/// handful of affinities our schema model ever produces.
pub fn decode_column(row: &sqlx::any::AnyRow, idx: usize) -> Result<Value, Error> {
  let raw = row
    .try_get_raw(idx)
    .map_err(|e| Error::ColumnNotFound(format!("{idx}: {e}")))?;

  if raw.is_null() {
    return Ok(Value::Null);
  }

  let type_name = raw.type_info().name().to_ascii_uppercase();

  let decoded = match type_name.as_str() {
    "BOOL" | "BOOLEAN" => row
      .try_get::<bool, _>(idx)
      .map(|v| Value::Integer(if v { 1 } else { 0 })),
    "INT2" | "SMALLINT" | "INT4" | "INTEGER" | "INT" | "INT8" | "BIGINT" | "MEDIUMINT"
    | "TINYINT" | "SERIAL" | "BIGSERIAL" => row.try_get::<i64, _>(idx).map(Value::Integer),
    "FLOAT4" | "REAL" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "NUMERIC" | "DECIMAL" => {
      row.try_get::<f64, _>(idx).map(Value::Real)
    }
    "BYTEA" | "BLOB" | "BINARY" | "VARBINARY" | "LONGBLOB" => {
      row.try_get::<Vec<u8>, _>(idx).map(Value::Blob)
    }
    _ => row.try_get::<String, _>(idx).map(Value::Text),
  };

  return decoded.map_err(|e| {
    Error::Decode(format!(
      "column {idx} (sql type {type_name}) failed to decode: {e}"
    ))
  });
}

pub(crate) fn column_name(row: &sqlx::any::AnyRow, idx: usize) -> Option<&str> {
  row.columns().get(idx).map(|c| c.name())
}
