//! `ActionDefinition` (spec §3): the row-level permission an action carries,
//! looked up by `(onType, name)` and cached for one minute (§4.2's
//! `action-<type>-<name>` namespace). The JSON `schema` column is parsed
//! lazily — most callers only need `permission` to answer
//! `IsUserActionAllowed`, not the action's input shape.

use rowgate_db::{Executor, params};

use crate::cache::{self, LookupCache, namespace};
use crate::error::{CoreError, Result};
use crate::id_codec::ReferenceId;
use crate::permission_bits::PermissionBits;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActionDefinition {
  pub name: String,
  pub on_type: String,
  pub label: String,
  pub reference_id: String,
  /// Raw JSON text; parsed into a `serde_json::Value` on demand by
  /// [`ActionDefinition::schema`] rather than at load time.
  pub schema_json: String,
  pub instance_optional: bool,
  pub permission: PermissionBits,
}

impl ActionDefinition {
  pub fn reference(&self) -> Result<ReferenceId> {
    ReferenceId::parse(&self.reference_id).map_err(|_| CoreError::Decode {
      column: "reference_id".to_string(),
      value: self.reference_id.clone(),
    })
  }

  /// Parses `schema_json` lazily; an empty or absent schema decodes to `null`.
  pub fn schema(&self) -> Result<serde_json::Value> {
    if self.schema_json.is_empty() {
      return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&self.schema_json).map_err(|_| CoreError::Decode {
      column: "schema".to_string(),
      value: self.schema_json.clone(),
    })
  }
}

/// Looks up one action row by `(on_type, name)`, the unique key per §3.
pub async fn load_action(
  executor: &dyn Executor,
  cache: &dyn LookupCache,
  on_type: &str,
  name: &str,
) -> Result<ActionDefinition> {
  let cache_key = namespace::action_row(on_type, name);
  if let Some(cached) = cache::get::<ActionDefinition>(cache, &cache_key).await {
    return Ok(cached);
  }

  let sql = "SELECT name, on_type, label, reference_id, schema, instance_optional, permission \
             FROM action WHERE on_type = ? AND name = ?";
  let row = executor
    .query_row(sql, &params!(on_type.to_string(), name.to_string()))
    .await?
    .ok_or_else(|| CoreError::not_found("action", format!("{on_type}.{name}")))?;

  let get_str = |idx: usize| -> Option<String> { row.get_value(idx).and_then(|v| v.as_str()).map(str::to_string) };

  let action = ActionDefinition {
    name: get_str(0).unwrap_or_default(),
    on_type: get_str(1).unwrap_or_default(),
    label: get_str(2).unwrap_or_default(),
    reference_id: get_str(3).unwrap_or_default(),
    schema_json: get_str(4).unwrap_or_default(),
    instance_optional: matches!(row.get_value(5).and_then(|v| v.as_i64()), Some(v) if v != 0),
    permission: PermissionBits(row.get_value(6).and_then(|v| v.as_i64()).unwrap_or(0)),
  };

  cache::put_if_absent(cache, &cache_key, &action, namespace::ACTION_ROW_TTL).await;

  return Ok(action);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::NullCache;

  #[tokio::test]
  async fn loads_action_row_by_type_and_name() {
    let conn = crate::test_support::memory_executor().await;
    conn
      .execute(
        "CREATE TABLE action (name TEXT, on_type TEXT, label TEXT, reference_id TEXT, schema TEXT, \
         instance_optional INTEGER, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    let reference = ReferenceId::new_v7();
    conn
      .execute(
        &format!(
          "INSERT INTO action VALUES ('publish', 'blog', 'Publish', '{reference}', '', 0, {})",
          PermissionBits::USER_EXECUTE
        ),
        &Default::default(),
      )
      .await
      .unwrap();

    let cache = NullCache;
    let action = load_action(&conn, &cache, "blog", "publish").await.unwrap();
    assert_eq!(action.name, "publish");
    assert!(action.permission.has(crate::permission_bits::PermissionField::User, crate::permission_bits::Capability::Execute));
  }

  #[tokio::test]
  async fn missing_action_is_not_found() {
    let conn = crate::test_support::memory_executor().await;
    conn
      .execute(
        "CREATE TABLE action (name TEXT, on_type TEXT, label TEXT, reference_id TEXT, schema TEXT, \
         instance_optional INTEGER, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();

    let cache = NullCache;
    let err = load_action(&conn, &cache, "blog", "publish").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
  }
}
