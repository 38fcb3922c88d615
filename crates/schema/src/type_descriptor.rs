use crate::column::Column;
use crate::relation::{Relation, RelationKind};

/// Everything `rowgate-core` needs to know about one table that isn't a SQL
/// value. Replaces the `_has_` substring sniffing and implicit
/// `HasMany("usergroup")` lookup called out in the design notes with explicit
/// flags computed once, at catalog build time.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
  pub name: String,
  pub columns: Vec<Column>,
  pub relations: Vec<Relation>,
  pub has_user_account_column: bool,
  pub is_link_table: bool,
  pub has_usergroup_relation: bool,
  pub is_audit_table: bool,
}

impl TypeDescriptor {
  pub fn builder(name: impl Into<String>) -> TypeDescriptorBuilder {
    TypeDescriptorBuilder::new(name)
  }

  pub fn column(&self, name: &str) -> Option<&Column> {
    self.columns.iter().find(|c| c.name == name)
  }

  /// Name of this type's membership-in-`usergroup` join table:
  /// `<type>_<type>_id_has_usergroup_usergroup_id`.
  pub fn group_join_table_name(&self) -> String {
    format!("{0}_{0}_id_has_usergroup_usergroup_id", self.name)
  }

  pub fn relations_as_subject(&self) -> impl Iterator<Item = &Relation> {
    self.relations.iter().filter(|r| r.subject_type == self.name)
  }

  pub fn relations_as_object(&self) -> impl Iterator<Item = &Relation> {
    self.relations.iter().filter(|r| r.object_type == self.name)
  }
}

pub struct TypeDescriptorBuilder {
  name: String,
  columns: Vec<Column>,
  relations: Vec<Relation>,
  has_user_account_column: bool,
  is_link_table: Option<bool>,
  has_usergroup_relation: Option<bool>,
  is_audit_table: bool,
}

impl TypeDescriptorBuilder {
  fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      columns: Vec::new(),
      relations: Vec::new(),
      has_user_account_column: false,
      is_link_table: None,
      has_usergroup_relation: None,
      is_audit_table: false,
    }
  }

  pub fn column(mut self, column: Column) -> Self {
    if column.name == "user_account_id" {
      self.has_user_account_column = true;
    }
    self.columns.push(column);
    return self;
  }

  pub fn relation(mut self, relation: Relation) -> Self {
    if relation.object_type == "usergroup" && matches!(relation.kind, RelationKind::HasMany) {
      self.has_usergroup_relation = Some(true);
    }
    self.relations.push(relation);
    return self;
  }

  /// Overrides the name-derived default; used for types whose `_has_`-shaped
  /// name is coincidental, or whose link-table-ness can't be inferred from
  /// the name at all.
  pub fn link_table(mut self, is_link_table: bool) -> Self {
    self.is_link_table = Some(is_link_table);
    return self;
  }

  pub fn audit_table(mut self, is_audit_table: bool) -> Self {
    self.is_audit_table = is_audit_table;
    return self;
  }

  pub fn build(self) -> TypeDescriptor {
    // `_has_` in the name remains the *default* signal (this is genuinely how
    // join tables happen to be named, per §6), but it is captured here, once,
    // as an explicit field rather than re-derived from the name at every
    // permission lookup.
    let is_link_table = self.is_link_table.unwrap_or_else(|| self.name.contains("_has_"));

    return TypeDescriptor {
      name: self.name,
      columns: self.columns,
      relations: self.relations,
      has_user_account_column: self.has_user_account_column,
      is_link_table,
      has_usergroup_relation: self.has_usergroup_relation.unwrap_or(false),
      is_audit_table: self.is_audit_table,
    };
  }
}
