use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
  HasOne,
  BelongsTo,
  HasMany,
  HasManyAndBelongsToMany,
}

impl RelationKind {
  /// `has_many`/`has_many_and_belongs_to_many` are resolved through a join
  /// table and capped at the loader's fan-out; `has_one`/`belongs_to` ride
  /// along with the plain foreign-key resolution step instead.
  pub fn is_join_table_relation(&self) -> bool {
    matches!(self, RelationKind::HasMany | RelationKind::HasManyAndBelongsToMany)
  }
}

/// A declared edge between two types. Column names default to `<type>_id`
/// per §6; callers only need `with_columns` for an irregular join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
  pub kind: RelationKind,
  pub subject_type: String,
  pub object_type: String,
  pub subject_column: String,
  pub object_column: String,
}

impl Relation {
  pub fn new(
    kind: RelationKind,
    subject_type: impl Into<String>,
    object_type: impl Into<String>,
  ) -> Self {
    let subject_type = subject_type.into();
    let object_type = object_type.into();
    let subject_column = format!("{subject_type}_id");
    let object_column = format!("{object_type}_id");

    return Self {
      kind,
      subject_type,
      object_type,
      subject_column,
      object_column,
    };
  }

  pub fn with_columns(mut self, subject_column: impl Into<String>, object_column: impl Into<String>) -> Self {
    self.subject_column = subject_column.into();
    self.object_column = object_column.into();
    return self;
  }

  /// Deterministic join-table name: `<S>_<Sc>_has_<O>_<Oc>`.
  pub fn join_table_name(&self) -> String {
    format!(
      "{}_{}_has_{}_{}",
      self.subject_type, self.subject_column, self.object_type, self.object_column
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn join_table_name_defaults_columns() {
    let relation = Relation::new(RelationKind::HasManyAndBelongsToMany, "post", "tag");
    assert_eq!(relation.join_table_name(), "post_post_id_has_tag_tag_id");
  }

  #[test]
  fn join_table_name_respects_explicit_columns() {
    let relation =
      Relation::new(RelationKind::HasMany, "author", "post").with_columns("author_id", "writer_id");
    assert_eq!(relation.join_table_name(), "author_author_id_has_post_writer_id");
  }
}
