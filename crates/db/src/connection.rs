use async_trait::async_trait;
use log::*;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Executor as _, Row as _};
use tokio::sync::Mutex;

use crate::error::Error;
use crate::params::Params;
use crate::rows::{self, Row, Rows};

pub type Result<T> = std::result::Result<T, Error>;

/// The two dialects this crate speaks. Everything else about a connection
/// string (host, credentials, pool sizing) is the caller's business; this
/// crate only cares about which `RANDOM`/`RAND` spelling `SqlBuilder` should
/// emit for a given pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
  Postgres,
  MySql,
}

impl Dialect {
  fn from_url(url: &str) -> Result<Self> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
      return Ok(Self::Postgres);
    }
    if url.starts_with("mysql://") {
      return Ok(Self::MySql);
    }
    // `sqlite:` is accepted too, but only as a test-harness substrate: its
    // random-row function happens to coincide with Postgres's.
    if url.starts_with("sqlite:") {
      return Ok(Self::Postgres);
    }
    return Err(Error::UnsupportedDialect(url.to_string()));
  }

  /// The SQL fragment that orders rows at random, for `RowLoader::getRandomRow`.
  pub fn random_function(&self) -> &'static str {
    match self {
      Dialect::Postgres => "RANDOM()",
      Dialect::MySql => "RAND()",
    }
  }
}

/// A pooled handle to either backend. Unlike the teacher's `trailbase-sqlite`,
/// which runs a background actor thread because `rusqlite` is synchronous,
/// `sqlx` is async-native end to end, so this is a thin wrapper around
/// `sqlx::AnyPool` plus the dialect it was opened against.
#[derive(Clone)]
pub struct Connection {
  pool: sqlx::AnyPool,
  dialect: Dialect,
}

impl Connection {
  pub async fn connect(database_url: &str) -> Result<Self> {
    sqlx::any::install_default_drivers();

    let dialect = Dialect::from_url(database_url)?;
    let pool = AnyPoolOptions::new().connect(database_url).await?;

    debug!("opened {dialect:?} pool for {database_url}");

    return Ok(Self { pool, dialect });
  }

  pub fn from_pool(pool: sqlx::AnyPool, dialect: Dialect) -> Self {
    Self { pool, dialect }
  }

  pub fn dialect(&self) -> Dialect {
    self.dialect
  }

  pub async fn begin(&self) -> Result<Transaction> {
    let inner = self.pool.begin().await?;
    return Ok(Transaction {
      inner: Mutex::new(inner),
      dialect: self.dialect,
    });
  }
}

/// An in-flight transaction. Per the collapsed with/without-transaction design
/// (every operation always takes an [`Executor`] handle), passing a
/// `&Transaction` here is how a caller opts into transactional semantics;
/// passing a `&Connection` is how it opts out.
pub struct Transaction {
  inner: Mutex<sqlx::Transaction<'static, sqlx::Any>>,
  dialect: Dialect,
}

impl Transaction {
  pub async fn commit(self) -> Result<()> {
    self.inner.into_inner().commit().await?;
    return Ok(());
  }

  pub async fn rollback(self) -> Result<()> {
    self.inner.into_inner().rollback().await?;
    return Ok(());
  }
}

fn bind<'q>(
  mut query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
  params: &'q Params,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
  use crate::value::Value;

  for value in &params.0 {
    query = match value {
      Value::Null => query.bind(None::<i64>),
      Value::Integer(v) => query.bind(*v),
      Value::Real(v) => query.bind(*v),
      Value::Text(v) => query.bind(v.as_str()),
      Value::Blob(v) => query.bind(v.as_slice()),
    };
  }
  return query;
}

fn decode(rows: Vec<AnyRow>) -> Result<Rows> {
  return rows::decode_rows(rows);
}

/// Capability every `rowgate-core` operation is written against: "run this
/// statement against whatever executor the caller handed in" — a bare pool
/// connection or an open transaction, uniformly.
#[async_trait]
pub trait Executor: Send + Sync {
  fn dialect(&self) -> Dialect;

  async fn execute(&self, sql: &str, params: &Params) -> Result<u64>;

  async fn query(&self, sql: &str, params: &Params) -> Result<Rows>;

  async fn query_row(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
    let rows = self.query(sql, params).await?;
    return Ok(rows.into_vec().into_iter().next());
  }
}

#[async_trait]
impl Executor for Connection {
  fn dialect(&self) -> Dialect {
    self.dialect
  }

  async fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
    let query = bind(sqlx::query(sql), params);
    let result = self.pool.execute(query).await?;
    return Ok(result.rows_affected());
  }

  async fn query(&self, sql: &str, params: &Params) -> Result<Rows> {
    let query = bind(sqlx::query(sql), params);
    let rows = query.fetch_all(&self.pool).await?;
    return decode(rows);
  }
}

#[async_trait]
impl Executor for Transaction {
  fn dialect(&self) -> Dialect {
    self.dialect
  }

  async fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
    let query = bind(sqlx::query(sql), params);
    let mut guard = self.inner.lock().await;
    let result = guard.execute(query).await?;
    return Ok(result.rows_affected());
  }

  async fn query(&self, sql: &str, params: &Params) -> Result<Rows> {
    let query = bind(sqlx::query(sql), params);
    let mut guard = self.inner.lock().await;
    let rows = query.fetch_all(&mut *guard).await?;
    return decode(rows);
  }
}

/// Row-count-returning convenience used by `IdentityResolver` when it only
/// needs the first cell of the first row (e.g. a single `id` lookup).
pub async fn query_scalar_i64(
  executor: &dyn Executor,
  sql: &str,
  params: &Params,
) -> Result<Option<i64>> {
  let Some(row) = executor.query_row(sql, params).await? else {
    return Ok(None);
  };
  return Ok(row.get_value(0).and_then(|v| v.as_i64()));
}
