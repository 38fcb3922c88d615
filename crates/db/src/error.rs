use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("db: {0}")]
  Sqlx(#[from] sqlx::Error),
  #[error("no such column: {0}")]
  ColumnNotFound(String),
  #[error("value decode: {0}")]
  Decode(String),
  #[error("unsupported connection string: {0}")]
  UnsupportedDialect(String),
}
