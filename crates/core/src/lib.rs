#![forbid(clippy::unwrap_used)]
#![allow(clippy::needless_return)]
#![warn(
  clippy::await_holding_lock,
  clippy::empty_enum,
  clippy::enum_glob_use,
  clippy::inefficient_to_string,
  clippy::mem_forget,
  clippy::mutex_integer,
  clippy::needless_continue
)]

//! Data-access and authorization core (spec §2): id resolution, permission
//! computation, relation-graph loading, and access control over user-defined
//! tables, behind a uniform map-shaped row interface.
//!
//! Dependency order mirrors the spec's leaves-first list: [`id_codec`] and
//! [`permission_bits`] are pure value types; [`cache`] and [`sql_builder`] are
//! the two infrastructure seams; [`identity`], [`permission`], [`action`] and
//! [`row_loader`] build on those to answer "what is this row, who owns it,
//! what can this caller do to it, and what does it relate to"; [`access_gate`]
//! and [`admin_bootstrap`] sit on top as the caller-facing authorization and
//! one-shot bootstrap operations.

pub mod access_gate;
pub mod action;
pub mod admin_bootstrap;
pub mod cache;
pub mod error;
pub mod id_codec;
pub mod identity;
pub mod permission;
pub mod permission_bits;
pub mod row;
pub mod row_loader;
pub mod sql_builder;

#[cfg(test)]
mod test_support;

pub use access_gate::{Caller, allow, can_execute, is_user_action_allowed};
pub use action::{ActionDefinition, load_action};
pub use admin_bootstrap::AdminBootstrap;
pub use cache::{LookupCache, NullCache};
pub use error::{CoreError, Result};
pub use id_codec::ReferenceId;
pub use identity::IdentityResolver;
pub use permission::{GroupPermission, PermissionInstance, PermissionResolver};
pub use permission_bits::{Capability, PermissionBits, PermissionField};
pub use row::{CellValue, RowMap, TYPE_KEY};
pub use row_loader::{Include, IncludeConfig, LoadResult, RowLoader};
pub use sql_builder::{Filter, SelectBuilder};
