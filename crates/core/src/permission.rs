use rowgate_db::{Executor, params};
use rowgate_schema::Catalog;

use crate::cache::{self, LookupCache, namespace};
use crate::error::{CoreError, Result};
use crate::id_codec::ReferenceId;
use crate::identity::IdentityResolver;
use crate::permission_bits::PermissionBits;
use crate::row::{CellValue, RowMap};

/// One group's standing grant over an object, derived from the object's
/// membership-in-`usergroup` join table (§3 `GroupPermission`).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPermission {
  pub group_ref_id: ReferenceId,
  pub object_ref_id: ReferenceId,
  pub relation_ref_id: ReferenceId,
  pub bits: PermissionBits,
}

/// The computed, never-persisted permission context for one row (§3).
#[derive(Debug, Clone)]
pub struct PermissionInstance {
  pub owner_ref_id: Option<ReferenceId>,
  pub groups: Vec<GroupPermission>,
  pub bits: PermissionBits,
}

impl PermissionInstance {
  /// `file.*`/`none` and guest-file rows (§4.4 case 1, §8 invariant 4):
  /// exactly one synthetic guest-read group, no owner.
  pub fn guest_read_only() -> Self {
    Self {
      owner_ref_id: None,
      groups: vec![GroupPermission {
        group_ref_id: ReferenceId::NULL,
        object_ref_id: ReferenceId::NULL,
        relation_ref_id: ReferenceId::NULL,
        bits: PermissionBits::guest_read(),
      }],
      bits: PermissionBits::guest_read(),
    }
  }
}

pub struct PermissionResolver<'a> {
  executor: &'a dyn Executor,
  cache: &'a dyn LookupCache,
  catalog: &'a Catalog,
}

impl<'a> PermissionResolver<'a> {
  pub fn new(executor: &'a dyn Executor, cache: &'a dyn LookupCache, catalog: &'a Catalog) -> Self {
    Self { executor, cache, catalog }
  }

  fn identity(&self) -> IdentityResolver<'a> {
    IdentityResolver::new(self.executor, self.cache)
  }

  /// §4.4 case 1: `SELECT user_account_id, permission, id WHERE reference_id=?`.
  /// `usergroup` rows have no owner column.
  pub async fn by_reference_id(&self, type_name: &str, reference: ReferenceId) -> Result<PermissionInstance> {
    let cache_key = namespace::row_permission(type_name, &reference.to_string());
    if let Some(cached) = cache::get::<CachedInstance>(self.cache, &cache_key).await {
      return cached.into_instance();
    }

    let has_owner_column = type_name != "usergroup";
    let sql = if has_owner_column {
      format!("SELECT user_account_id, permission, id FROM {type_name} WHERE reference_id = ?")
    } else {
      format!("SELECT permission, id FROM {type_name} WHERE reference_id = ?")
    };

    let row = self
      .executor
      .query_row(&sql, &params!(reference.to_string()))
      .await?
      .ok_or_else(|| CoreError::not_found(type_name, reference.to_string()))?;

    let (owner_col_idx, perm_col_idx, id_col_idx) = if has_owner_column { (Some(0), 1, 2) } else { (None, 0, 1) };

    let bits = PermissionBits(row.get_value(perm_col_idx).and_then(|v| v.as_i64()).unwrap_or(0));
    let id = row
      .get_value(id_col_idx)
      .and_then(|v| v.as_i64())
      .ok_or_else(|| CoreError::Decode {
        column: "id".to_string(),
        value: "<missing>".to_string(),
      })?;

    let owner_ref_id = match owner_col_idx.and_then(|idx| row.get_value(idx)).and_then(|v| v.as_i64()) {
      Some(owner_id) => Some(self.identity().id_to_ref("user_account", owner_id).await?),
      None => None,
    };

    let groups = self.groups_for_object(type_name, id, reference).await?;
    let instance = PermissionInstance { owner_ref_id, groups, bits };

    cache::put_if_absent(
      self.cache,
      &cache_key,
      &CachedInstance::from_instance(&instance),
      namespace::ROW_PERMISSION_TTL,
    )
    .await;

    return Ok(instance);
  }

  /// §4.4 case 2: identical to case 1 with an arbitrary `WHERE <column>=?`.
  pub async fn by_where_clause(&self, type_name: &str, column: &str, value: &str) -> Result<PermissionInstance> {
    let cache_key = namespace::object_permission(type_name, column, value);
    if let Some(cached) = cache::get::<CachedInstance>(self.cache, &cache_key).await {
      return cached.into_instance();
    }

    let has_owner_column = type_name != "usergroup";
    let sql = if has_owner_column {
      format!("SELECT user_account_id, permission, id, reference_id FROM {type_name} WHERE {column} = ?")
    } else {
      format!("SELECT permission, id, reference_id FROM {type_name} WHERE {column} = ?")
    };

    let row = self
      .executor
      .query_row(&sql, &params!(value.to_string()))
      .await?
      .ok_or_else(|| CoreError::not_found(type_name, format!("{column}={value}")))?;

    let (owner_idx, perm_idx, id_idx, ref_idx) = if has_owner_column { (Some(0), 1, 2, 3) } else { (None, 0, 1, 2) };

    let bits = PermissionBits(row.get_value(perm_idx).and_then(|v| v.as_i64()).unwrap_or(0));
    let id = row.get_value(id_idx).and_then(|v| v.as_i64()).ok_or_else(|| CoreError::Decode {
      column: "id".to_string(),
      value: "<missing>".to_string(),
    })?;
    let reference_text = row.get_value(ref_idx).and_then(|v| v.as_str()).ok_or_else(|| CoreError::Decode {
      column: "reference_id".to_string(),
      value: "<missing>".to_string(),
    })?;
    let reference = ReferenceId::parse(reference_text).map_err(|_| CoreError::Decode {
      column: "reference_id".to_string(),
      value: reference_text.to_string(),
    })?;

    let owner_ref_id = match owner_idx.and_then(|idx| row.get_value(idx)).and_then(|v| v.as_i64()) {
      Some(owner_id) => Some(self.identity().id_to_ref("user_account", owner_id).await?),
      None => None,
    };

    let groups = self.groups_for_object(type_name, id, reference).await?;
    let instance = PermissionInstance { owner_ref_id, groups, bits };

    cache::put_if_absent(
      self.cache,
      &cache_key,
      &CachedInstance::from_instance(&instance),
      namespace::OBJECT_PERMISSION_TTL,
    )
    .await;

    return Ok(instance);
  }

  /// §4.4 case 3: build a [`PermissionInstance`] from an already-loaded row
  /// map without a second query whenever the map carries enough information.
  pub async fn for_row(&self, row: &RowMap, type_name: &str) -> Result<PermissionInstance> {
    if type_name.starts_with("file.") || type_name == "none" {
      return Ok(PermissionInstance::guest_read_only());
    }

    let reference = extract_reference(row, type_name)?;

    if type_name == "usergroup" {
      let bits = extract_permission_bits(row).unwrap_or(PermissionBits(PermissionBits::DEFAULT_PERMISSION));
      return Ok(PermissionInstance {
        owner_ref_id: None,
        groups: vec![GroupPermission {
          group_ref_id: reference,
          object_ref_id: reference,
          relation_ref_id: reference,
          bits: PermissionBits(PermissionBits::DEFAULT_PERMISSION),
        }],
        bits,
      });
    }

    let type_descriptor = self.catalog.get(type_name)?;

    if type_descriptor.is_link_table {
      // Link-table rows: owner alone governs, no group resolution (§4.4).
      let bits = match extract_permission_bits(row) {
        Some(bits) => bits,
        None => self.by_reference_id(type_name, reference).await?.bits,
      };
      return Ok(PermissionInstance {
        owner_ref_id: extract_owner_reference(row),
        groups: Vec::new(),
        bits,
      });
    }

    if let Some(bits) = extract_permission_bits(row) {
      let groups = if type_descriptor.has_usergroup_relation {
        let id = self.identity().ref_to_id(type_name, reference).await?;
        self.groups_for_object(type_name, id, reference).await?
      } else {
        Vec::new()
      };

      return Ok(PermissionInstance {
        owner_ref_id: extract_owner_reference(row),
        groups,
        bits,
      });
    }

    return self.by_reference_id(type_name, reference).await;
  }

  /// Joins `<type>_<type>_id_has_usergroup_usergroup_id` with `usergroup` and
  /// returns every membership row. `usergroup` itself is self-referential and
  /// never reaches this path (handled in [`for_row`](Self::for_row)).
  pub async fn groups_for_object(&self, type_name: &str, id: i64, object_ref: ReferenceId) -> Result<Vec<GroupPermission>> {
    if type_name == "usergroup" {
      return Ok(vec![GroupPermission {
        group_ref_id: object_ref,
        object_ref_id: object_ref,
        relation_ref_id: object_ref,
        bits: PermissionBits(PermissionBits::DEFAULT_PERMISSION),
      }]);
    }

    let cache_key = namespace::object_groups(type_name, id);
    if let Some(cached) = cache::get::<Vec<CachedGroup>>(self.cache, &cache_key).await {
      return cached.into_iter().map(CachedGroup::into_group).collect();
    }

    let type_descriptor = self.catalog.get(type_name)?;
    let join_table = type_descriptor.group_join_table_name();
    let object_column = format!("{type_name}_id");

    let sql = format!(
      "SELECT g.reference_id, j.reference_id, g.permission \
       FROM {join_table} j \
       JOIN usergroup g ON j.usergroup_id = g.id \
       WHERE j.{object_column} = ? \
       ORDER BY j.created_at DESC"
    );

    let rows = self.executor.query(&sql, &params!(id)).await?;

    let mut groups = Vec::with_capacity(rows.len());
    for row in rows.iter() {
      let Some(group_ref_text) = row.get_value(0).and_then(|v| v.as_str()) else {
        continue;
      };
      let Some(relation_ref_text) = row.get_value(1).and_then(|v| v.as_str()) else {
        continue;
      };
      let Ok(group_ref_id) = ReferenceId::parse(group_ref_text) else {
        continue;
      };
      let Ok(relation_ref_id) = ReferenceId::parse(relation_ref_text) else {
        continue;
      };
      let bits = PermissionBits(row.get_value(2).and_then(|v| v.as_i64()).unwrap_or(0));

      groups.push(GroupPermission {
        group_ref_id,
        object_ref_id: object_ref,
        relation_ref_id,
        bits,
      });
    }

    cache::put_if_absent(
      self.cache,
      &cache_key,
      &groups.iter().map(CachedGroup::from_group).collect::<Vec<_>>(),
      namespace::OBJECT_GROUPS_TTL,
    )
    .await;

    return Ok(groups);
  }
}

fn extract_reference(row: &RowMap, type_name: &str) -> Result<ReferenceId> {
  let text = row
    .get("reference_id")
    .and_then(CellValue::as_str)
    .or_else(|| row.get("id").and_then(CellValue::as_str));

  let Some(text) = text else {
    return Err(CoreError::not_found(type_name, "<row without reference_id or id>".to_string()));
  };

  return ReferenceId::parse(text).map_err(|_| CoreError::Decode {
    column: "reference_id".to_string(),
    value: text.to_string(),
  });
}

/// Accepts int, float, or numeric-string permission cells (§4.4).
fn extract_permission_bits(row: &RowMap) -> Option<PermissionBits> {
  match row.get("permission")? {
    CellValue::Integer(v) => Some(PermissionBits(*v)),
    CellValue::Real(v) => Some(PermissionBits(*v as i64)),
    CellValue::Text(v) => v.parse::<i64>().ok().map(PermissionBits),
    _ => None,
  }
}

fn extract_owner_reference(row: &RowMap) -> Option<ReferenceId> {
  match row.get("user_account_id")? {
    CellValue::Text(v) => ReferenceId::parse(v).ok(),
    CellValue::ReferenceList(list) => list.first().and_then(|v| ReferenceId::parse(v).ok()),
    _ => None,
  }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CachedGroup {
  group_ref_id: String,
  object_ref_id: String,
  relation_ref_id: String,
  bits: i64,
}

impl CachedGroup {
  fn from_group(g: &GroupPermission) -> Self {
    Self {
      group_ref_id: g.group_ref_id.to_string(),
      object_ref_id: g.object_ref_id.to_string(),
      relation_ref_id: g.relation_ref_id.to_string(),
      bits: g.bits.0,
    }
  }

  fn into_group(self) -> Result<GroupPermission> {
    Ok(GroupPermission {
      group_ref_id: parse_ref(&self.group_ref_id)?,
      object_ref_id: parse_ref(&self.object_ref_id)?,
      relation_ref_id: parse_ref(&self.relation_ref_id)?,
      bits: PermissionBits(self.bits),
    })
  }
}

fn parse_ref(text: &str) -> Result<ReferenceId> {
  ReferenceId::parse(text).map_err(|_| CoreError::Decode {
    column: "reference_id".to_string(),
    value: text.to_string(),
  })
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CachedInstance {
  owner_ref_id: Option<String>,
  groups: Vec<CachedGroup>,
  bits: i64,
}

impl CachedInstance {
  fn from_instance(instance: &PermissionInstance) -> Self {
    Self {
      owner_ref_id: instance.owner_ref_id.map(|r| r.to_string()),
      groups: instance.groups.iter().map(CachedGroup::from_group).collect(),
      bits: instance.bits.0,
    }
  }

  fn into_instance(self) -> Result<PermissionInstance> {
    let owner_ref_id = self.owner_ref_id.as_deref().map(parse_ref).transpose()?;
    let groups = self.groups.into_iter().map(CachedGroup::into_group).collect::<Result<Vec<_>>>()?;
    Ok(PermissionInstance {
      owner_ref_id,
      groups,
      bits: PermissionBits(self.bits),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::NullCache;
  use crate::row::RowMap;
  use rowgate_schema::{Catalog, TypeDescriptor};

  #[tokio::test]
  async fn guest_only_synthesis_for_file_and_none_types() {
    let conn = crate::test_support::memory_executor().await;
    let cache = NullCache;
    let catalog = Catalog::new(Vec::<TypeDescriptor>::new());
    let resolver = PermissionResolver::new(&conn, &cache, &catalog);

    let mut row = RowMap::new();
    row.insert("reference_id".to_string(), CellValue::Text(ReferenceId::new_v7().to_string()));
    row.insert("permission".to_string(), CellValue::Integer(0));

    let instance = resolver.for_row(&row, "file.image").await.unwrap();
    assert_eq!(instance.groups.len(), 1);
    assert_eq!(instance.groups[0].bits, PermissionBits::guest_read());

    let instance = resolver.for_row(&row, "none").await.unwrap();
    assert_eq!(instance.groups.len(), 1);
    assert_eq!(instance.groups[0].bits, PermissionBits::guest_read());
  }
}
