use std::collections::HashMap;

use crate::error::SchemaError;
use crate::type_descriptor::TypeDescriptor;

/// The full set of declared types, immutable for the lifetime of the serving
/// process (schema load/migration is out of scope for this core).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  types: HashMap<String, TypeDescriptor>,
}

impl Catalog {
  pub fn new(types: impl IntoIterator<Item = TypeDescriptor>) -> Self {
    let types = types.into_iter().map(|t| (t.name.clone(), t)).collect();
    return Self { types };
  }

  pub fn get(&self, name: &str) -> Result<&TypeDescriptor, SchemaError> {
    self
      .types
      .get(name)
      .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.types.contains_key(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
    self.types.values()
  }

  /// Every table carrying a `user_account_id` column, in the order
  /// `AdminBootstrap` needs them — excluding the user↔group link table per §4.7.
  pub fn user_owned_tables(&self) -> impl Iterator<Item = &TypeDescriptor> {
    self
      .types
      .values()
      .filter(|t| t.has_user_account_column && !t.is_link_table)
  }
}
