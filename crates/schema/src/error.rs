use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("unknown type: {0}")]
  UnknownType(String),
  #[error("unknown column: {0}.{1}")]
  UnknownColumn(String, String),
}
