use thiserror::Error;

use crate::id_codec::ReferenceId;

#[derive(Debug, Error)]
pub enum CoreError {
  #[error("not found: {type_name} {key}")]
  NotFound { type_name: String, key: String },

  #[error("db: {0}")]
  Db(#[from] rowgate_db::Error),

  #[error("schema: {0}")]
  Schema(#[from] rowgate_schema::SchemaError),

  #[error("decode error on column {column}: {value}")]
  Decode { column: String, value: String },

  #[error("permission denied: {type_name} {reference_id} requires {capability}")]
  PermissionDenied {
    type_name: String,
    reference_id: ReferenceId,
    capability: String,
  },
}

impl CoreError {
  pub fn not_found(type_name: impl Into<String>, key: impl Into<String>) -> Self {
    Self::NotFound {
      type_name: type_name.into(),
      key: key.into(),
    }
  }
}

pub type Result<T> = std::result::Result<T, CoreError>;
