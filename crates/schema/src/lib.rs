#![allow(clippy::needless_return)]

//! Static table/relation metadata: the part of the original schema crate that
//! survives once DDL parsing and migration are out of scope. Everything here
//! is built once, from already-validated table definitions, and then handed
//! to `rowgate-core` as an immutable [`Catalog`].

pub mod catalog;
pub mod column;
pub mod error;
pub mod relation;
pub mod type_descriptor;

pub use catalog::Catalog;
pub use column::{Column, ColumnDataType, Datasource, ForeignKey};
pub use error::SchemaError;
pub use relation::{Relation, RelationKind};
pub use type_descriptor::{TypeDescriptor, TypeDescriptorBuilder};
