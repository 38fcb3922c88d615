#![forbid(clippy::unwrap_used)]
#![allow(clippy::needless_return)]
#![warn(
  clippy::await_holding_lock,
  clippy::empty_enum,
  clippy::enum_glob_use,
  clippy::inefficient_to_string,
  clippy::mem_forget,
  clippy::mutex_integer,
  clippy::needless_continue
)]

//! Dialect-agnostic async execution layer, built on `sqlx`'s `Any` driver so the
//! same bound-parameter SQL runs unchanged against Postgres and MySQL.

pub mod connection;
pub mod error;
pub mod params;
pub mod rows;
pub mod value;

pub use connection::{Connection, Dialect, Executor, query_scalar_i64};
pub use error::Error;
pub use params::Params;
pub use rows::{Row, Rows};
pub use value::Value;
