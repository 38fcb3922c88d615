//! Test-only harness: an in-memory `sqlite` pool driven through the same
//! `sqlx::Any` abstraction production code uses for Postgres/MySQL. Nothing
//! here is sqlite-specific beyond the connection string — the generated SQL
//! never relies on anything but `?` placeholders and `RANDOM()`.
#![cfg(test)]

use rowgate_db::Connection;

pub async fn memory_executor() -> Connection {
  Connection::connect("sqlite::memory:")
    .await
    .expect("in-memory sqlite pool")
}
