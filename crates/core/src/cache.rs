use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Namespaced key shapes and TTLs, straight out of §4.2's table. Key
/// construction lives here so every call site agrees on the exact string.
pub mod namespace {
  use std::time::Duration;

  pub const ID_TO_REF_TTL: Duration = Duration::from_secs(60);
  pub const REF_TO_ID_TTL: Duration = Duration::from_secs(5 * 60);
  pub const ID_TO_OBJECT_TTL: Duration = Duration::from_secs(60);
  pub const REF_TO_OBJECT_TTL: Duration = Duration::from_secs(5);
  pub const OBJECT_PERMISSION_TTL: Duration = Duration::from_secs(10 * 60);
  pub const ROW_PERMISSION_TTL: Duration = Duration::from_secs(60);
  pub const OBJECT_GROUPS_TTL: Duration = Duration::from_secs(30);
  pub const ACTION_ROW_TTL: Duration = Duration::from_secs(60);

  pub fn id_to_ref(type_name: &str, id: i64) -> String {
    format!("itr-{type_name}-{id}")
  }

  pub fn ref_to_id(type_name: &str, reference: &str) -> String {
    format!("riti-{type_name}-{reference}")
  }

  pub fn id_to_object(type_name: &str, id: i64) -> String {
    format!("ito-{type_name}-{id}")
  }

  pub fn ref_to_object(type_name: &str, reference: &str) -> String {
    format!("rio-{type_name}-{reference}")
  }

  pub fn object_permission(type_name: &str, column: &str, value: &str) -> String {
    format!("object-permission-{type_name}-{column}-{value}")
  }

  pub fn row_permission(type_name: &str, reference: &str) -> String {
    format!("row-permission-{type_name}-{reference}")
  }

  pub fn object_groups(type_name: &str, id: i64) -> String {
    format!("object-groups-{type_name}-{id}")
  }

  pub fn action_row(type_name: &str, name: &str) -> String {
    format!("action-{type_name}-{name}")
  }
}

/// Distributed key-value store contract: `get`/`putIfAbsent`, raw bytes.
/// Implementations must degrade silently (return miss / no-op) when the
/// backing store is unavailable — callers never see a cache failure.
#[async_trait]
pub trait LookupCache: Send + Sync {
  async fn get_raw(&self, key: &str) -> Option<Vec<u8>>;

  async fn put_if_absent_raw(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// Typed `get`: deserializes the cached bytes, treating any decode failure as
/// a miss (§4.8: "malformed cached value — treat as miss, log, re-read").
pub async fn get<T: DeserializeOwned>(cache: &dyn LookupCache, key: &str) -> Option<T> {
  let raw = cache.get_raw(key).await?;
  match serde_json::from_slice(&raw) {
    Ok(value) => Some(value),
    Err(err) => {
      log::warn!("cache value for {key} failed to decode: {err}, treating as miss");
      None
    }
  }
}

/// Typed `putIfAbsent`. Serialization failures are logged and swallowed, same
/// as any other cache error per §4.8/§7.
pub async fn put_if_absent<T: Serialize>(cache: &dyn LookupCache, key: &str, value: &T, ttl: Duration) {
  match serde_json::to_vec(value) {
    Ok(bytes) => cache.put_if_absent_raw(key, bytes, ttl).await,
    Err(err) => log::warn!("failed to serialize value for cache key {key}: {err}"),
  }
}

/// Default cache: always miss, every put is a no-op. This is what the core
/// is constructed with unless a caller explicitly injects a real backend —
/// the replacement for the lazily-initialised global singleton called out in
/// the design notes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl LookupCache for NullCache {
  async fn get_raw(&self, _key: &str) -> Option<Vec<u8>> {
    None
  }

  async fn put_if_absent_raw(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) {}
}

#[cfg(feature = "redis-cache")]
pub mod redis_cache {
  use std::time::Duration;

  use async_trait::async_trait;
  use redis::AsyncCommands;
  use redis::aio::ConnectionManager;

  use super::LookupCache;

  /// The "distributed memory store" named in §1. `ConnectionManager`
  /// transparently reconnects, but any failure (including a dead connection)
  /// is still swallowed here: a lookup falling back to the database is
  /// always preferable to surfacing a cache outage to the caller.
  #[derive(Clone)]
  pub struct RedisCache {
    conn: ConnectionManager,
  }

  impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
      let client = redis::Client::open(url)?;
      let conn = client.get_connection_manager().await?;
      return Ok(Self { conn });
    }
  }

  #[async_trait]
  impl LookupCache for RedisCache {
    async fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
      let mut conn = self.conn.clone();
      match conn.get::<_, Option<Vec<u8>>>(key).await {
        Ok(value) => value,
        Err(err) => {
          log::warn!("cache get({key}) failed: {err}");
          None
        }
      }
    }

    async fn put_if_absent_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) {
      let mut conn = self.conn.clone();
      let result: Result<bool, redis::RedisError> = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("NX")
        .arg("PX")
        .arg(ttl.as_millis() as u64)
        .query_async(&mut conn)
        .await;

      if let Err(err) = result {
        log::warn!("cache put_if_absent({key}) failed: {err}");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn null_cache_always_misses_and_swallows_puts() {
    let cache = NullCache;
    put_if_absent(&cache, "itr-blog-1", &"some-ref".to_string(), namespace::ID_TO_REF_TTL).await;
    let value: Option<String> = get(&cache, "itr-blog-1").await;
    assert_eq!(value, None);
  }

  #[test]
  fn namespace_keys_match_spec_shapes() {
    assert_eq!(namespace::id_to_ref("blog", 7), "itr-blog-7");
    assert_eq!(namespace::ref_to_id("blog", "r-1"), "riti-blog-r-1");
    assert_eq!(
      namespace::object_permission("blog", "slug", "hello"),
      "object-permission-blog-slug-hello"
    );
    assert_eq!(namespace::action_row("blog", "publish"), "action-blog-publish");
  }
}
