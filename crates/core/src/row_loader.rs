//! RowLoader (spec §2.8, §4.6): executes a SELECT, maps each result row into a
//! [`RowMap`], then runs the two post-processing passes — foreign-key
//! resolution and relation inclusion — up to the configured fan-out.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rowgate_db::{Executor, Row as DbRow, params};
use rowgate_schema::{Catalog, Column, ColumnDataType, Datasource, TypeDescriptor};

use crate::cache::{self, LookupCache, namespace};
use crate::error::{CoreError, Result};
use crate::id_codec::ReferenceId;
use crate::identity::IdentityResolver;
use crate::row::{CellValue, DecodedCell, DecodedRow, RowMap, TYPE_KEY};
use crate::sql_builder::{Filter, SelectBuilder, random_row_sql, relation_join_sql};

/// Include-expansion depth/fan-out, made explicit per Design Note §9 rather
/// than hard-coded constants. Depth is carried for future multi-level
/// expansion but the loader itself only ever walks one level (§4.6 step 5
/// resolves direct relations only).
#[derive(Debug, Clone, Copy)]
pub struct IncludeConfig {
  pub depth: u32,
  pub fan_out: u32,
}

impl Default for IncludeConfig {
  fn default() -> Self {
    Self { depth: 1, fan_out: 50 }
  }
}

/// A caller's `include` request: nothing, everything (`"*"`), or a named set
/// of relation/column names.
#[derive(Debug, Clone)]
pub enum Include {
  None,
  All,
  Named(HashSet<String>),
}

impl Include {
  pub fn named(names: impl IntoIterator<Item = String>) -> Self {
    Include::Named(names.into_iter().collect())
  }

  pub fn wants(&self, name: &str) -> bool {
    match self {
      Include::None => false,
      Include::All => true,
      Include::Named(set) => set.contains(name),
    }
  }
}

pub struct LoadResult {
  pub rows: Vec<RowMap>,
  /// `includes[i]` is the side-channel of embedded objects for `rows[i]` (§6).
  pub includes: Vec<Vec<RowMap>>,
}

pub struct RowLoader<'a> {
  executor: &'a dyn Executor,
  cache: &'a dyn LookupCache,
  catalog: &'a Catalog,
  config: IncludeConfig,
  /// Local folder `cloud_store` file contents are read from when included
  /// (§4.6 step 4). Remote sync into this folder is out of scope (spec §1).
  sync_folder: Option<PathBuf>,
}

impl<'a> RowLoader<'a> {
  pub fn new(executor: &'a dyn Executor, cache: &'a dyn LookupCache, catalog: &'a Catalog) -> Self {
    Self {
      executor,
      cache,
      catalog,
      config: IncludeConfig::default(),
      sync_folder: None,
    }
  }

  pub fn with_config(mut self, config: IncludeConfig) -> Self {
    self.config = config;
    return self;
  }

  pub fn with_sync_folder(mut self, folder: impl Into<PathBuf>) -> Self {
    self.sync_folder = Some(folder.into());
    return self;
  }

  fn identity(&self) -> IdentityResolver<'a> {
    IdentityResolver::new(self.executor, self.cache)
  }

  /// §4.6: `SELECT * FROM <type> WHERE <conjunction>`, then the column-map /
  /// datetime / foreign-key / relation-inclusion pipeline for every result row.
  pub async fn load_rows(&self, type_name: &str, filters: &[Filter], include: &Include) -> Result<LoadResult> {
    let type_descriptor = self.catalog.get(type_name)?;
    let (sql, params) = SelectBuilder::new(type_name).filters(filters.iter().cloned()).build();
    let rows = self.executor.query(&sql, &params).await?;

    let mut out_rows = Vec::with_capacity(rows.len());
    let mut out_includes = Vec::with_capacity(rows.len());

    for row in rows.iter() {
      let mut decoded = self.decode_row(row, type_descriptor);
      let mut includes = Vec::new();
      self.resolve_foreign_keys(&mut decoded, include, &mut includes).await?;

      let mut row_map = decoded.into_row_map();
      self.load_relations(type_descriptor, &mut row_map, include, &mut includes).await;

      out_rows.push(row_map);
      out_includes.push(includes);
    }

    return Ok(LoadResult { rows: out_rows, includes: out_includes });
  }

  /// Equivalent to `loadRows(type, {reference_id: ref}, include)`, failing
  /// with `NotFound` when the result is empty (§4.6). Consults the
  /// `rio-`/ref→object cache (§4.2) first: a plain lookup (no `include`) is
  /// include-invariant for every column except `cloud_store` file lists
  /// (§4.6 step 4 drops `x-crdt/yjs` entries only when included), so caching
  /// is scoped to `Include::None` to keep a cached snapshot always correct.
  pub async fn load_single_by_reference(&self, type_name: &str, reference: ReferenceId, include: &Include) -> Result<(RowMap, Vec<RowMap>)> {
    let reference_text = reference.to_string();
    let cache_key = namespace::ref_to_object(type_name, &reference_text);
    if matches!(include, Include::None) {
      if let Some(row) = cache::get::<RowMap>(self.cache, &cache_key).await {
        return Ok((row, Vec::new()));
      }
    }

    let filters = [Filter::eq("reference_id", reference_text.clone())];
    let mut result = self.load_rows(type_name, &filters, include).await?;
    if result.rows.is_empty() {
      return Err(CoreError::not_found(type_name, reference_text));
    }
    let row = result.rows.remove(0);
    let includes = result.includes.remove(0);

    if matches!(include, Include::None) {
      cache::put_if_absent(self.cache, &cache_key, &row, namespace::REF_TO_OBJECT_TTL).await;
    }

    return Ok((row, includes));
  }

  /// Internal counterpart of [`load_single_by_reference`](Self::load_single_by_reference)
  /// keyed by internal id instead of reference id, consulting the `ito-`/
  /// id→object cache (§4.2). Used by self-FK resolution, which already has the
  /// foreign row's id on hand and would otherwise pay for a redundant
  /// id→reference round trip before it could even look the object up.
  async fn load_by_id(&self, type_name: &str, id: i64, include: &Include) -> Result<Option<(RowMap, Vec<RowMap>)>> {
    let cache_key = namespace::id_to_object(type_name, id);
    if matches!(include, Include::None) {
      if let Some(row) = cache::get::<RowMap>(self.cache, &cache_key).await {
        return Ok(Some((row, Vec::new())));
      }
    }

    let filters = [Filter::eq("id", id)];
    let mut result = self.load_rows(type_name, &filters, include).await?;
    if result.rows.is_empty() {
      return Ok(None);
    }
    let row = result.rows.remove(0);
    let includes = result.includes.remove(0);

    if matches!(include, Include::None) {
      cache::put_if_absent(self.cache, &cache_key, &row, namespace::ID_TO_OBJECT_TTL).await;
    }

    return Ok(Some((row, includes)));
  }

  /// `id >= RANDOM() * (SELECT MAX(id) FROM <type>) LIMIT <count>` (§4.6).
  /// Biased toward higher ids on sparse key spaces — documented, not fixed
  /// (§9 open question).
  pub async fn get_random_row(&self, type_name: &str, count: u32) -> Result<Vec<RowMap>> {
    let type_descriptor = self.catalog.get(type_name)?;
    let sql = random_row_sql(self.executor.dialect(), type_name, count);
    let rows = self.executor.query(&sql, &params!()).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows.iter() {
      let mut decoded = self.decode_row(row, type_descriptor);
      let mut discard = Vec::new();
      self.resolve_foreign_keys(&mut decoded, &Include::None, &mut discard).await?;
      out.push(decoded.into_row_map());
    }
    return Ok(out);
  }

  /// §4.6 steps 2-3: map columns to an ordered [`DecodedRow`], parsing
  /// `datetime`-declared cells best-effort.
  fn decode_row(&self, row: &DbRow, type_descriptor: &TypeDescriptor) -> DecodedRow {
    let mut cells = Vec::with_capacity(row.column_count());
    for idx in 0..row.column_count() {
      let Some(name) = row.column_name(idx) else { continue };
      let raw_value = row.get_value(idx).cloned().unwrap_or(rowgate_db::Value::Null);
      let column = type_descriptor.column(name).cloned().unwrap_or_else(|| Column::new(name, ColumnDataType::Text));

      let mut value = CellValue::from(raw_value);
      if column.is_datetime() {
        value = parse_datetime_cell(value);
      }
      cells.push(DecodedCell { column, value });
    }
    return DecodedRow { type_name: type_descriptor.name.clone(), cells };
  }

  /// §4.6 step 4: resolve every foreign-key cell, `self` rows and
  /// `cloud_store` file lists alike.
  async fn resolve_foreign_keys(&self, decoded: &mut DecodedRow, include: &Include, includes: &mut Vec<RowMap>) -> Result<()> {
    for idx in 0..decoded.cells.len() {
      let Some(fk) = decoded.cells[idx].column.foreign_key.clone() else { continue };
      let column_name = decoded.cells[idx].column.name.clone();

      match fk.datasource {
        Datasource::SelfRow => {
          self.resolve_self_foreign_key(decoded, idx, &column_name, &fk.foreign_type, include, includes).await?;
        }
        Datasource::CloudStore => {
          self.resolve_cloud_store_cell(decoded, idx, &column_name, include, includes).await;
        }
      }
    }
    return Ok(());
  }

  /// `self`-sourced FK: the integer cell is a row id in `foreign_type`;
  /// replace it with the resolved reference id, and — if requested — load the
  /// referenced row into the includes side channel (§4.6 step 4).
  async fn resolve_self_foreign_key(
    &self,
    decoded: &mut DecodedRow,
    idx: usize,
    column_name: &str,
    foreign_type: &str,
    include: &Include,
    includes: &mut Vec<RowMap>,
  ) -> Result<()> {
    let Some(foreign_id) = decoded.cells[idx].value.as_i64() else {
      return Ok(());
    };

    if include.wants(column_name) {
      match self.load_by_id(foreign_type, foreign_id, &Include::None).await {
        Ok(Some((row, _))) => {
          decoded.cells[idx].value = match row.get("reference_id").and_then(CellValue::as_str) {
            Some(text) => CellValue::Text(text.to_string()),
            None => CellValue::Null,
          };
          includes.push(row);
          return Ok(());
        }
        Ok(None) => {
          decoded.cells[idx].value = CellValue::Null;
          return Ok(());
        }
        Err(err) => {
          // §4.8: a relation-include sub-query error omits the relation, it
          // never fails the parent load — still resolve the bare reference below.
          log::warn!("include of {foreign_type}:{foreign_id} failed: {err}");
        }
      }
    }

    let reference = match self.identity().id_to_ref(foreign_type, foreign_id).await {
      Ok(reference) => reference,
      Err(CoreError::NotFound { .. }) => {
        decoded.cells[idx].value = CellValue::Null;
        return Ok(());
      }
      Err(err) => return Err(err),
    };

    decoded.cells[idx].value = CellValue::Text(reference.to_string());

    return Ok(());
  }

  /// `cloud_store`-sourced cell: parse the JSON file-list, compute `src`, drop
  /// `x-crdt/yjs` entries unless included, and — when included — read file
  /// bytes from the local sync folder and base64-encode them (§4.6 step 4).
  async fn resolve_cloud_store_cell(&self, decoded: &mut DecodedRow, idx: usize, column_name: &str, include: &Include, includes: &mut Vec<RowMap>) {
    let CellValue::Text(json_text) = &decoded.cells[idx].value else {
      return;
    };

    let entries: Vec<CloudStoreEntry> = match serde_json::from_str(json_text) {
      Ok(entries) => entries,
      Err(_) => {
        decoded.cells[idx].value = CellValue::Null;
        return;
      }
    };

    let wants_include = include.wants(column_name);
    let mut out_entries = Vec::with_capacity(entries.len());

    for entry in entries {
      if entry.file_type == "x-crdt/yjs" && !wants_include {
        continue;
      }

      let src = if entry.path.is_empty() {
        entry.name.clone()
      } else {
        format!("{}/{}", entry.path, entry.name)
      };

      if wants_include {
        if let Some(folder) = &self.sync_folder {
          if let Some(contents) = read_and_encode(folder, &src).await {
            let mut object = RowMap::new();
            object.insert("name".to_string(), CellValue::Text(entry.name.clone()));
            object.insert("src".to_string(), CellValue::Text(src.clone()));
            object.insert("contents".to_string(), CellValue::Text(contents));
            object.insert(TYPE_KEY.to_string(), CellValue::Text(entry.file_type.clone()));
            includes.push(object);
          }
        }
      }

      out_entries.push(serde_json::json!({
        "name": entry.name,
        "path": entry.path,
        "type": entry.file_type,
        "src": src,
      }));
    }

    decoded.cells[idx].value = CellValue::Json(serde_json::Value::Array(out_entries));
  }

  /// §4.6 step 5: for every declared relation where `type_descriptor` is
  /// either end, join against the link table (capped at `fan_out`, ordered
  /// `created_at DESC`), populate the relation field with reference ids, and
  /// — when included — batch the referenced rows into the side channel.
  async fn load_relations(&self, type_descriptor: &TypeDescriptor, row_map: &mut RowMap, include: &Include, includes: &mut Vec<RowMap>) {
    let Some(id) = row_map.get("id").and_then(CellValue::as_i64) else {
      return;
    };

    for relation in type_descriptor.relations_as_subject().filter(|r| r.kind.is_join_table_relation()) {
      self
        .load_one_relation(id, &relation.join_table_name(), &relation.subject_column, &relation.object_column, &relation.object_type, row_map, include, includes)
        .await;
    }

    for relation in type_descriptor.relations_as_object().filter(|r| r.kind.is_join_table_relation()) {
      self
        .load_one_relation(id, &relation.join_table_name(), &relation.object_column, &relation.subject_column, &relation.subject_type, row_map, include, includes)
        .await;
    }
  }

  #[allow(clippy::too_many_arguments)]
  async fn load_one_relation(
    &self,
    id: i64,
    join_table: &str,
    filter_column: &str,
    select_column: &str,
    related_type: &str,
    row_map: &mut RowMap,
    include: &Include,
    includes: &mut Vec<RowMap>,
  ) {
    let field_name = related_type.to_string();
    let (sql, _) = relation_join_sql(join_table, filter_column, select_column, self.config.fan_out);

    let rows = match self.executor.query(&sql, &params!(id)).await {
      Ok(rows) => rows,
      Err(err) => {
        // §4.8: relation sub-query errors omit the relation, never fail the load.
        log::warn!("relation include on {join_table} failed: {err}");
        return;
      }
    };

    let mut related_ids = Vec::with_capacity(rows.len());
    for row in rows.iter() {
      if let Some(related_id) = row.get_value(0).and_then(|v| v.as_i64()) {
        related_ids.push(related_id);
      }
    }

    let mut ref_ids = Vec::with_capacity(related_ids.len());
    for related_id in &related_ids {
      if let Ok(reference) = self.identity().id_to_ref(related_type, *related_id).await {
        ref_ids.push(reference);
      }
    }

    row_map.insert(field_name.clone(), CellValue::ReferenceList(ref_ids.iter().map(ToString::to_string).collect()));

    if include.wants(&field_name) {
      for reference in &ref_ids {
        match self.load_single_by_reference(related_type, *reference, &Include::None).await {
          Ok((row, _)) => includes.push(row),
          Err(err) => log::warn!("include of {related_type}:{reference} failed: {err}"),
        }
      }
    }
  }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct CloudStoreEntry {
  name: String,
  #[serde(default)]
  path: String,
  #[serde(rename = "type")]
  file_type: String,
}

async fn read_and_encode(folder: &std::path::Path, src: &str) -> Option<String> {
  use base64::Engine as _;
  let bytes = tokio::fs::read(folder.join(src)).await.ok()?;
  return Some(base64::engine::general_purpose::STANDARD.encode(bytes));
}

/// §4.6 step 3 / §6: "ISO-8601 with or without timezone, with or without
/// seconds, with or without date"; unparseable values are silently nulled.
fn parse_datetime_cell(value: CellValue) -> CellValue {
  let CellValue::Text(text) = &value else {
    return value;
  };
  match parse_datetime_best_effort(text) {
    Some(parsed) => CellValue::DateTime(parsed),
    None => CellValue::Null,
  }
}

fn parse_datetime_best_effort(text: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
    return Some(dt.with_timezone(&Utc));
  }

  const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];
  for format in NAIVE_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
      return Some(Utc.from_utc_datetime(&naive));
    }
  }

  if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
    return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
  }

  return None;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::NullCache;
  use rowgate_schema::{Relation, RelationKind};

  async fn seed_author_posts(conn: &rowgate_db::Connection) -> (ReferenceId, Vec<ReferenceId>) {
    conn
      .execute(
        "CREATE TABLE author (id INTEGER PRIMARY KEY, reference_id TEXT, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE post (id INTEGER PRIMARY KEY, reference_id TEXT, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE author_author_id_has_post_post_id (\
           author_id INTEGER, post_id INTEGER, created_at TEXT, reference_id TEXT)",
        &Default::default(),
      )
      .await
      .unwrap();

    let author_ref = ReferenceId::new_v7();
    conn
      .execute(
        &format!("INSERT INTO author (id, reference_id, permission) VALUES (1, '{author_ref}', 0)"),
        &Default::default(),
      )
      .await
      .unwrap();

    let mut post_refs = Vec::new();
    for i in 0..75 {
      let post_ref = ReferenceId::new_v7();
      conn
        .execute(
          &format!("INSERT INTO post (id, reference_id, permission) VALUES ({}, '{post_ref}', 0)", i + 1),
          &Default::default(),
        )
        .await
        .unwrap();
      conn
        .execute(
          &format!(
            "INSERT INTO author_author_id_has_post_post_id (author_id, post_id, created_at, reference_id) \
             VALUES (1, {}, '2024-01-{:02}T00:00:00Z', '{}')",
            i + 1,
            (i % 28) + 1,
            ReferenceId::new_v7()
          ),
          &Default::default(),
        )
        .await
        .unwrap();
      post_refs.push(post_ref);
    }

    return (author_ref, post_refs);
  }

  #[tokio::test]
  async fn relation_inclusion_caps_at_fifty() {
    let conn = crate::test_support::memory_executor().await;
    let (author_ref, _) = seed_author_posts(&conn).await;

    let author_type = rowgate_schema::TypeDescriptor::builder("author")
      .relation(Relation::new(RelationKind::HasMany, "author", "post"))
      .build();
    let post_type = rowgate_schema::TypeDescriptor::builder("post").build();
    let catalog = Catalog::new(vec![author_type, post_type]);

    let cache = NullCache;
    let loader = RowLoader::new(&conn, &cache, &catalog);

    let (row, _) = loader
      .load_single_by_reference("author", author_ref, &Include::None)
      .await
      .unwrap();

    let CellValue::ReferenceList(posts) = row.get("post").unwrap() else {
      panic!("expected a reference list");
    };
    assert_eq!(posts.len(), 50);
  }

  #[test]
  fn datetime_parsing_is_best_effort() {
    assert!(parse_datetime_best_effort("2024-01-02T03:04:05Z").is_some());
    assert!(parse_datetime_best_effort("2024-01-02 03:04:05").is_some());
    assert!(parse_datetime_best_effort("2024-01-02").is_some());
    assert!(parse_datetime_best_effort("not-a-date").is_none());
  }
}
