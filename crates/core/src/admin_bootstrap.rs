//! AdminBootstrap (spec §2.10, §4.7): the one-shot transition that makes the
//! first real user the owner of every user-owned row and promotes the
//! `administrators` group. Intentionally non-atomic (§7/§9): a crash
//! mid-bootstrap leaves the administrators membership row in place (so
//! `can_become_admin` never returns true again) but some tables still
//! carrying their prior owner; the design notes leave repair as a manual,
//! un-tooled operation rather than forcing one long-held transaction over an
//! arbitrary, schema-shape-dependent set of tables.

use chrono::Utc;
use rowgate_db::{Executor, params, query_scalar_i64};
use rowgate_schema::Catalog;

use crate::error::{CoreError, Result};
use crate::id_codec::ReferenceId;
use crate::permission_bits::PermissionBits;

const ADMINISTRATORS_GROUP: &str = "administrators";
const USER_ACCOUNT_TYPE: &str = "user_account";
const SIGNIN_ACTION: &str = "signin";

pub struct AdminBootstrap<'a> {
  executor: &'a dyn Executor,
  catalog: &'a Catalog,
}

impl<'a> AdminBootstrap<'a> {
  pub fn new(executor: &'a dyn Executor, catalog: &'a Catalog) -> Self {
    Self { executor, catalog }
  }

  /// True iff no row exists in the `administrators` group's membership table
  /// (§4.7). Once any user has joined that group, this is permanently false.
  pub async fn can_become_admin(&self) -> Result<bool> {
    let Some(admin_group_id) = self.administrators_group_id().await? else {
      // No `administrators` group row at all: trivially nobody is a member yet.
      return Ok(true);
    };

    let join_table = user_group_join_table();
    let sql = format!("SELECT 1 FROM {join_table} WHERE usergroup_id = ? LIMIT 1");
    let exists = self.executor.query_row(&sql, &params!(admin_group_id)).await?.is_some();
    return Ok(!exists);
  }

  /// Runs the four steps of §4.7 if allowed; returns `false` without acting
  /// if `can_become_admin` is already false.
  pub async fn become_admin(&self, user_id: i64) -> Result<bool> {
    if !self.can_become_admin().await? {
      return Ok(false);
    }

    // Step 1: every table with a user_account_id column (except the
    // user↔group link table) gets its rows re-owned and reset to the
    // default permission.
    for type_descriptor in self.catalog.user_owned_tables() {
      let sql = format!("UPDATE {} SET user_account_id = ?, permission = ?", type_descriptor.name);
      self
        .executor
        .execute(&sql, &params!(user_id, PermissionBits::DEFAULT_PERMISSION))
        .await?;
    }

    // Step 2: insert the user into the administrators group.
    let admin_group_id = self
      .administrators_group_id()
      .await?
      .ok_or_else(|| CoreError::not_found("usergroup", ADMINISTRATORS_GROUP.to_string()))?;

    let join_table = user_group_join_table();
    let reference = ReferenceId::new_v7();
    let sql = format!("INSERT INTO {join_table} (user_account_id, usergroup_id, reference_id, created_at) VALUES (?, ?, ?, ?)");
    self
      .executor
      .execute(&sql, &params!(user_id, admin_group_id, reference.to_string(), Utc::now().to_rfc3339()))
      .await?;

    // Step 3: world.permission / world.default_permission, audit tables excepted.
    for type_descriptor in self.catalog.iter() {
      let (permission, default_permission) = if type_descriptor.is_audit_table {
        (
          PermissionBits::USER_CREATE | PermissionBits::GROUP_CREATE,
          PermissionBits::USER_READ | PermissionBits::GROUP_READ,
        )
      } else {
        (PermissionBits::DEFAULT_PERMISSION, PermissionBits::DEFAULT_PERMISSION)
      };

      self
        .executor
        .execute(
          "UPDATE world SET permission = ?, default_permission = ? WHERE table_name = ?",
          &params!(permission, default_permission, type_descriptor.name.clone()),
        )
        .await?;
    }

    // Step 4: action.permission, with signin getting guest peek/execute on top.
    const ACTION_PERMISSION: i64 =
      PermissionBits::USER_READ | PermissionBits::USER_EXECUTE | PermissionBits::GROUP_CRUD | PermissionBits::GROUP_EXECUTE | PermissionBits::GROUP_REFER;

    self.executor.execute("UPDATE action SET permission = ?", &params!(ACTION_PERMISSION)).await?;

    const SIGNIN_PERMISSION: i64 = ACTION_PERMISSION | PermissionBits::GUEST_PEEK | PermissionBits::GUEST_EXECUTE;
    self
      .executor
      .execute("UPDATE action SET permission = ? WHERE name = ?", &params!(SIGNIN_PERMISSION, SIGNIN_ACTION.to_string()))
      .await?;

    return Ok(true);
  }

  async fn administrators_group_id(&self) -> Result<Option<i64>> {
    return Ok(query_scalar_i64(self.executor, "SELECT id FROM usergroup WHERE name = ?", &params!(ADMINISTRATORS_GROUP.to_string())).await?);
  }
}

fn user_group_join_table() -> String {
  format!("{0}_{0}_id_has_usergroup_usergroup_id", USER_ACCOUNT_TYPE)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rowgate_schema::{Column, ColumnDataType, TypeDescriptor};

  async fn seed(conn: &rowgate_db::Connection) -> Catalog {
    conn
      .execute(
        "CREATE TABLE usergroup (id INTEGER PRIMARY KEY, name TEXT, reference_id TEXT, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE user_account_user_account_id_has_usergroup_usergroup_id \
         (user_account_id INTEGER, usergroup_id INTEGER, reference_id TEXT, created_at TEXT)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE user_account (id INTEGER PRIMARY KEY, reference_id TEXT, user_account_id INTEGER, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE blog (id INTEGER PRIMARY KEY, reference_id TEXT, user_account_id INTEGER, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE world (table_name TEXT, permission INTEGER, default_permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "CREATE TABLE action (name TEXT, on_type TEXT, permission INTEGER)",
        &Default::default(),
      )
      .await
      .unwrap();

    conn
      .execute("INSERT INTO usergroup (id, name, reference_id, permission) VALUES (1, 'administrators', 'g-1', 0)", &Default::default())
      .await
      .unwrap();
    conn
      .execute(
        "INSERT INTO user_account (id, reference_id, permission) VALUES (1, 'u-1', 0)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute(
        "INSERT INTO blog (id, reference_id, permission) VALUES (1, 'b-1', 0)",
        &Default::default(),
      )
      .await
      .unwrap();
    conn
      .execute("INSERT INTO world (table_name, permission, default_permission) VALUES ('blog', 0, 0)", &Default::default())
      .await
      .unwrap();
    conn
      .execute("INSERT INTO world (table_name, permission, default_permission) VALUES ('blog_audit', 0, 0)", &Default::default())
      .await
      .unwrap();
    conn
      .execute("INSERT INTO action (name, on_type, permission) VALUES ('signin', 'user_account', 0)", &Default::default())
      .await
      .unwrap();

    let blog = TypeDescriptor::builder("blog")
      .column(Column::new("user_account_id", ColumnDataType::Integer))
      .build();
    let blog_audit = TypeDescriptor::builder("blog_audit").audit_table(true).build();
    let user_account = TypeDescriptor::builder("user_account").build();

    return Catalog::new(vec![blog, blog_audit, user_account]);
  }

  #[tokio::test]
  async fn first_admin_bootstrap_is_a_one_shot() {
    let conn = crate::test_support::memory_executor().await;
    let catalog = seed(&conn).await;
    let bootstrap = AdminBootstrap::new(&conn, &catalog);

    assert!(bootstrap.can_become_admin().await.unwrap());
    assert!(bootstrap.become_admin(1).await.unwrap());
    assert!(!bootstrap.can_become_admin().await.unwrap());

    let blog_owner = conn
      .query_row("SELECT user_account_id, permission FROM blog WHERE id = 1", &params!())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(blog_owner.get_value(0).and_then(|v| v.as_i64()), Some(1));
    assert_eq!(blog_owner.get_value(1).and_then(|v| v.as_i64()), Some(PermissionBits::DEFAULT_PERMISSION));

    let world_blog = conn
      .query_row("SELECT permission FROM world WHERE table_name = 'blog'", &params!())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(world_blog.get_value(0).and_then(|v| v.as_i64()), Some(PermissionBits::DEFAULT_PERMISSION));

    let signin = conn
      .query_row("SELECT permission FROM action WHERE name = 'signin'", &params!())
      .await
      .unwrap()
      .unwrap();
    let signin_bits = signin.get_value(0).and_then(|v| v.as_i64()).unwrap();
    assert_ne!(signin_bits & PermissionBits::GUEST_PEEK, 0);
    assert_ne!(signin_bits & PermissionBits::GUEST_EXECUTE, 0);

    // Second call is a no-op: guarded by can_become_admin, not re-run.
    assert!(!bootstrap.become_admin(1).await.unwrap());
  }
}
