use serde::{Deserialize, Serialize};

/// Storage affinity of a column, as declared in the catalog. Only the
/// affinities `RowLoader` actually branches on are modelled; there is no DDL
/// parser behind this — the catalog is handed fully-built metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnDataType {
  Integer,
  Real,
  Text,
  Blob,
  /// Parsed best-effort as time-then-datetime; unparseable values are nulled.
  DateTime,
  /// A `cloud_store` file-list cell (JSON array of `{name, path, type, ...}`).
  CloudStoreFile,
}

/// Where a foreign-key column's referent lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datasource {
  /// The integer value is a row id in another table of this catalog.
  SelfRow,
  /// The cell holds a `cloud_store` file list rather than an FK integer.
  CloudStore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
  pub foreign_type: String,
  pub datasource: Datasource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
  pub name: String,
  pub data_type: ColumnDataType,
  pub foreign_key: Option<ForeignKey>,
}

impl Column {
  pub fn new(name: impl Into<String>, data_type: ColumnDataType) -> Self {
    Self {
      name: name.into(),
      data_type,
      foreign_key: None,
    }
  }

  pub fn with_foreign_key(mut self, foreign_type: impl Into<String>, datasource: Datasource) -> Self {
    self.foreign_key = Some(ForeignKey {
      foreign_type: foreign_type.into(),
      datasource,
    });
    return self;
  }

  pub fn is_datetime(&self) -> bool {
    matches!(self.data_type, ColumnDataType::DateTime)
  }

  pub fn is_foreign_key(&self) -> bool {
    self.foreign_key.is_some()
  }

  pub fn is_cloud_store(&self) -> bool {
    matches!(
      self.foreign_key,
      Some(ForeignKey {
        datasource: Datasource::CloudStore,
        ..
      })
    )
  }
}
