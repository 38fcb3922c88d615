use indexmap::IndexMap;
use rowgate_schema::Column;
use serde::{Deserialize, Serialize};

/// One decoded cell's public value. This is the shape every caller of
/// `RowLoader` actually sees, after foreign-key resolution and datetime
/// parsing — distinct from `rowgate_db::Value`, which is the raw driver
/// affinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  DateTime(chrono::DateTime<chrono::Utc>),
  /// A resolved foreign-key reference, or a list of reference ids for a
  /// has_many/has_many_and_belongs_to_many relation.
  ReferenceList(Vec<String>),
  Json(serde_json::Value),
}

impl CellValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      CellValue::Text(v) => Some(v.as_str()),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      CellValue::Integer(v) => Some(*v),
      _ => None,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, CellValue::Null)
  }
}

impl From<rowgate_db::Value> for CellValue {
  fn from(value: rowgate_db::Value) -> Self {
    match value {
      rowgate_db::Value::Null => CellValue::Null,
      rowgate_db::Value::Integer(v) => CellValue::Integer(v),
      rowgate_db::Value::Real(v) => CellValue::Real(v),
      rowgate_db::Value::Text(v) => CellValue::Text(v),
      rowgate_db::Value::Blob(v) => {
        use base64::Engine as _;
        CellValue::Text(base64::engine::general_purpose::STANDARD.encode(v))
      }
    }
  }
}

/// The public wire-contract shape: an ordered map keyed by column name, plus
/// the synthetic `__type` entry (§6). Keeping this as a plain `IndexMap`
/// (rather than a bespoke struct) is deliberate — it's the interchange format
/// every higher layer already expects.
pub type RowMap = IndexMap<String, CellValue>;

pub const TYPE_KEY: &str = "__type";

/// One cell plus the schema column that produced it. The design note asks for
/// "the map shape for the wire contract, but an accompanying tagged record
/// for internal use" — this is that record: FK-ness and datetime-ness are
/// read off `column`, not re-derived from the column name string.
#[derive(Debug, Clone)]
pub struct DecodedCell {
  pub column: Column,
  pub value: CellValue,
}

/// A row after the column-mapping + datetime-parsing pass (§4.6 steps 2-3),
/// before FK resolution and relation inclusion (steps 4-5).
#[derive(Debug, Clone)]
pub struct DecodedRow {
  pub type_name: String,
  pub cells: Vec<DecodedCell>,
}

impl DecodedRow {
  pub fn get(&self, column_name: &str) -> Option<&DecodedCell> {
    self.cells.iter().find(|c| c.column.name == column_name)
  }

  pub fn get_mut(&mut self, column_name: &str) -> Option<&mut DecodedCell> {
    self.cells.iter_mut().find(|c| c.column.name == column_name)
  }

  /// Flattens into the public [`RowMap`], appending the synthetic `__type` key.
  pub fn into_row_map(self) -> RowMap {
    let mut map = RowMap::with_capacity(self.cells.len() + 1);
    for cell in self.cells {
      map.insert(cell.column.name, cell.value);
    }
    map.insert(TYPE_KEY.to_string(), CellValue::Text(self.type_name));
    return map;
  }
}
