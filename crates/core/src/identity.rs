use std::collections::HashMap;

use rowgate_db::{Executor, params, query_scalar_i64};

use crate::cache::{self, LookupCache, namespace};
use crate::error::{CoreError, Result};
use crate::id_codec::ReferenceId;

/// id ↔ reference_id mapping, cached per §4.3. Every operation takes an
/// [`Executor`] handle explicitly — there is no separate "without a
/// transaction" variant; callers pass the pool itself when they don't need
/// transactional semantics, per the design note collapsing the two.
pub struct IdentityResolver<'a> {
  executor: &'a dyn Executor,
  cache: &'a dyn LookupCache,
}

impl<'a> IdentityResolver<'a> {
  pub fn new(executor: &'a dyn Executor, cache: &'a dyn LookupCache) -> Self {
    Self { executor, cache }
  }

  pub async fn id_to_ref(&self, type_name: &str, id: i64) -> Result<ReferenceId> {
    let key = namespace::id_to_ref(type_name, id);
    if let Some(text) = cache::get::<String>(self.cache, &key).await {
      if let Ok(reference) = ReferenceId::parse(&text) {
        return Ok(reference);
      }
      log::warn!("cached reference '{text}' for {type_name}:{id} failed to parse, re-reading");
    }

    let sql = format!("SELECT reference_id FROM {type_name} WHERE id = ?");
    let row = self
      .executor
      .query_row(&sql, &params!(id))
      .await?
      .ok_or_else(|| CoreError::not_found(type_name, id.to_string()))?;

    let text = row
      .get_value(0)
      .and_then(|v| v.as_str())
      .ok_or_else(|| CoreError::Decode {
        column: "reference_id".to_string(),
        value: "<missing>".to_string(),
      })?;
    let reference = ReferenceId::parse(text).map_err(|_| CoreError::Decode {
      column: "reference_id".to_string(),
      value: text.to_string(),
    })?;

    cache::put_if_absent(self.cache, &key, &reference.to_string(), namespace::ID_TO_REF_TTL).await;
    return Ok(reference);
  }

  pub async fn ref_to_id(&self, type_name: &str, reference: ReferenceId) -> Result<i64> {
    let reference_text = reference.to_string();
    let key = namespace::ref_to_id(type_name, &reference_text);
    if let Some(id) = cache::get::<i64>(self.cache, &key).await {
      return Ok(id);
    }

    let sql = format!("SELECT id FROM {type_name} WHERE reference_id = ?");
    let id = query_scalar_i64(self.executor, &sql, &params!(reference_text.clone()))
      .await?
      .ok_or_else(|| CoreError::not_found(type_name, reference_text.clone()))?;

    cache::put_if_absent(self.cache, &key, &id, namespace::REF_TO_ID_TTL).await;
    return Ok(id);
  }

  /// Batched variant of [`id_to_ref`](Self::id_to_ref): one query for every id
  /// not already cached, then an opportunistic cache fill.
  pub async fn id_list_to_ref_map(&self, type_name: &str, ids: &[i64]) -> Result<HashMap<i64, ReferenceId>> {
    let mut result = HashMap::with_capacity(ids.len());
    let mut misses = Vec::new();

    for &id in ids {
      let key = namespace::id_to_ref(type_name, id);
      match cache::get::<String>(self.cache, &key).await.and_then(|t| ReferenceId::parse(&t).ok()) {
        Some(reference) => {
          result.insert(id, reference);
        }
        None => misses.push(id),
      }
    }

    if !misses.is_empty() {
      let placeholders = std::iter::repeat("?").take(misses.len()).collect::<Vec<_>>().join(", ");
      let sql = format!("SELECT id, reference_id FROM {type_name} WHERE id IN ({placeholders})");
      let params = misses
        .iter()
        .map(|&id| rowgate_db::Value::Integer(id))
        .collect::<rowgate_db::Params>();
      let rows = self.executor.query(&sql, &params).await?;

      for row in rows.iter() {
        let Some(id) = row.get_value(0).and_then(|v| v.as_i64()) else {
          continue;
        };
        let Some(text) = row.get_value(1).and_then(|v| v.as_str()) else {
          continue;
        };
        let Ok(reference) = ReferenceId::parse(text) else {
          continue;
        };

        let key = namespace::id_to_ref(type_name, id);
        cache::put_if_absent(self.cache, &key, &reference.to_string(), namespace::ID_TO_REF_TTL).await;
        result.insert(id, reference);
      }
    }

    return Ok(result);
  }

  /// Batched variant of [`ref_to_id`](Self::ref_to_id).
  pub async fn ref_list_to_id_map(
    &self,
    type_name: &str,
    references: &[ReferenceId],
  ) -> Result<HashMap<ReferenceId, i64>> {
    let mut result = HashMap::with_capacity(references.len());
    let mut misses = Vec::new();

    for &reference in references {
      let text = reference.to_string();
      let key = namespace::ref_to_id(type_name, &text);
      match cache::get::<i64>(self.cache, &key).await {
        Some(id) => {
          result.insert(reference, id);
        }
        None => misses.push(reference),
      }
    }

    if !misses.is_empty() {
      let placeholders = std::iter::repeat("?").take(misses.len()).collect::<Vec<_>>().join(", ");
      let sql = format!("SELECT reference_id, id FROM {type_name} WHERE reference_id IN ({placeholders})");
      let params = misses
        .iter()
        .map(|r| rowgate_db::Value::Text(r.to_string()))
        .collect::<rowgate_db::Params>();
      let rows = self.executor.query(&sql, &params).await?;

      for row in rows.iter() {
        let Some(text) = row.get_value(0).and_then(|v| v.as_str()) else {
          continue;
        };
        let Ok(reference) = ReferenceId::parse(text) else {
          continue;
        };
        let Some(id) = row.get_value(1).and_then(|v| v.as_i64()) else {
          continue;
        };

        let key = namespace::ref_to_id(type_name, text);
        cache::put_if_absent(self.cache, &key, &id, namespace::REF_TO_ID_TTL).await;
        result.insert(reference, id);
      }
    }

    return Ok(result);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::NullCache;
  use crate::test_support::memory_executor;

  #[tokio::test]
  async fn id_round_trips_through_reference() {
    let conn = memory_executor().await;
    let reference = ReferenceId::new_v7();

    conn
      .execute(
        "CREATE TABLE widget (id INTEGER PRIMARY KEY, reference_id TEXT)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        &format!("INSERT INTO widget (id, reference_id) VALUES (1, '{reference}')"),
        &Default::default(),
      )
      .await
      .unwrap();

    let cache = NullCache;
    let resolver = IdentityResolver::new(&conn, &cache);

    let resolved_ref = resolver.id_to_ref("widget", 1).await.unwrap();
    assert_eq!(resolved_ref, reference);

    let resolved_id = resolver.ref_to_id("widget", reference).await.unwrap();
    assert_eq!(resolved_id, 1);
  }

  #[tokio::test]
  async fn id_to_ref_reports_not_found_for_missing_row() {
    let conn = memory_executor().await;
    conn
      .execute(
        "CREATE TABLE widget (id INTEGER PRIMARY KEY, reference_id TEXT)",
        &Default::default(),
      )
      .await
      .unwrap();

    let cache = NullCache;
    let resolver = IdentityResolver::new(&conn, &cache);

    let err = resolver.id_to_ref("widget", 99).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
  }
}
