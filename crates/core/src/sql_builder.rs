//! Parameterised SELECT/UPDATE composition (spec §2.3, §4.1). Every
//! identifier (table, column) comes from `rowgate_schema` metadata or a
//! caller-chosen relation name already validated against the catalog — never
//! from an arbitrary caller-supplied string — so building SQL by string
//! concatenation here is safe the same way it already is in `identity.rs`.
//!
//! The two dialects differ only in the random-row function (§4.1); everything
//! else is plain `?`-parameterised SQL that `sqlx::Any` rewrites per backend.

use rowgate_db::{Dialect, Params, Value};

/// One `column = value` (or `column IN (values)`) conjunct. `loadRows`'s
/// "WHERE <conjunction>" (§4.6 step 1) is an AND of these.
#[derive(Debug, Clone)]
pub enum Filter {
  Eq(String, Value),
  In(String, Vec<Value>),
}

impl Filter {
  pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::Eq(column.into(), value.into())
  }
}

fn push_filter(sql: &mut String, params: &mut Params, filter: &Filter) {
  match filter {
    Filter::Eq(column, value) => {
      sql.push_str(column);
      sql.push_str(" = ?");
      params.push(value.clone());
    }
    Filter::In(column, values) => {
      if values.is_empty() {
        // An empty IN-list matches nothing; `1 = 0` keeps the statement valid
        // SQL across both dialects rather than special-casing an empty list
        // at every call site.
        sql.push_str("1 = 0");
        return;
      }
      sql.push_str(column);
      sql.push_str(" IN (");
      for (i, value) in values.iter().enumerate() {
        if i > 0 {
          sql.push_str(", ");
        }
        sql.push('?');
        params.push(value.clone());
      }
      sql.push(')');
    }
  }
}

/// `SELECT * FROM <table> WHERE <conjunction> [ORDER BY ...] [LIMIT ...]`.
/// Builds the single-table SELECT that drives `RowLoader::load_rows` (§4.6
/// step 1) and the join queries that follow a relation edge (§4.6 step 5).
pub struct SelectBuilder {
  table: String,
  columns: String,
  filters: Vec<Filter>,
  order_by: Option<(String, bool)>,
  limit: Option<u32>,
}

impl SelectBuilder {
  pub fn new(table: impl Into<String>) -> Self {
    Self {
      table: table.into(),
      columns: "*".to_string(),
      filters: Vec::new(),
      order_by: None,
      limit: None,
    }
  }

  pub fn columns(mut self, columns: impl Into<String>) -> Self {
    self.columns = columns.into();
    return self;
  }

  pub fn filter(mut self, filter: Filter) -> Self {
    self.filters.push(filter);
    return self;
  }

  pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
    self.filters.extend(filters);
    return self;
  }

  /// `desc = true` gives the `created_at DESC` ordering every relation
  /// inclusion query uses (§4.6 step 5).
  pub fn order_by(mut self, column: impl Into<String>, desc: bool) -> Self {
    self.order_by = Some((column.into(), desc));
    return self;
  }

  pub fn limit(mut self, limit: u32) -> Self {
    self.limit = Some(limit);
    return self;
  }

  pub fn build(self) -> (String, Params) {
    let mut sql = format!("SELECT {} FROM {}", self.columns, self.table);
    let mut params = Params::new();

    if !self.filters.is_empty() {
      sql.push_str(" WHERE ");
      for (i, filter) in self.filters.iter().enumerate() {
        if i > 0 {
          sql.push_str(" AND ");
        }
        push_filter(&mut sql, &mut params, filter);
      }
    }

    if let Some((column, desc)) = &self.order_by {
      sql.push_str(" ORDER BY ");
      sql.push_str(column);
      if *desc {
        sql.push_str(" DESC");
      }
    }

    if let Some(limit) = self.limit {
      sql.push_str(&format!(" LIMIT {limit}"));
    }

    return (sql, params);
  }
}

/// `getRandomRow`'s predicate (§4.6): `id >= <rand>() * (SELECT MAX(id) FROM
/// <table>) LIMIT <count>`. Documented as biased toward higher ids on sparse
/// key spaces, not uniform (§9 open question — left as-is, not resolved here).
pub fn random_row_sql(dialect: Dialect, table: &str, count: u32) -> String {
  format!(
    "SELECT * FROM {table} WHERE id >= {random}() * (SELECT MAX(id) FROM {table}) LIMIT {count}",
    random = dialect_random_name(dialect),
  )
}

fn dialect_random_name(dialect: Dialect) -> &'static str {
  // `Dialect::random_function()` already returns e.g. "RANDOM()"; strip the
  // trailing "()" so this call site can splice in its own.
  dialect.random_function().trim_end_matches("()")
}

/// One relation's join-table inclusion query, subject or reverse direction
/// (§4.6 step 5): `SELECT j.<object_col> FROM <join> j WHERE j.<subject_col> =
/// ? ORDER BY j.created_at DESC LIMIT <fan_out>`.
pub fn relation_join_sql(join_table: &str, subject_column: &str, object_column: &str, fan_out: u32) -> (String, &'static str) {
  let sql = format!(
    "SELECT j.{object_column} FROM {join_table} j WHERE j.{subject_column} = ? ORDER BY j.created_at DESC LIMIT {fan_out}"
  );
  return (sql, object_column);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn select_builder_ands_filters_and_appends_order_limit() {
    let (sql, params) = SelectBuilder::new("post")
      .filter(Filter::eq("author_id", 7i64))
      .filter(Filter::eq("published", true))
      .order_by("created_at", true)
      .limit(50)
      .build();

    assert_eq!(
      sql,
      "SELECT * FROM post WHERE author_id = ? AND published = ? ORDER BY created_at DESC LIMIT 50"
    );
    assert_eq!(params.as_slice().len(), 2);
  }

  #[test]
  fn empty_in_filter_matches_nothing() {
    let (sql, _) = SelectBuilder::new("post").filter(Filter::In("id".to_string(), vec![])).build();
    assert!(sql.contains("1 = 0"));
  }

  #[test]
  fn random_row_sql_uses_dialect_function() {
    assert!(random_row_sql(Dialect::Postgres, "post", 3).contains("RANDOM()"));
    assert!(random_row_sql(Dialect::MySql, "post", 3).contains("RAND()"));
  }
}
