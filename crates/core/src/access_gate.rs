//! AccessGate (spec §2.9, §4.5): applies [`PermissionBits`] to a caller
//! against a [`PermissionInstance`]'s owner/group/guest clauses.

use rowgate_db::Executor;

use crate::action;
use crate::cache::LookupCache;
use crate::error::Result;
use crate::id_codec::ReferenceId;
use crate::permission::PermissionInstance;
use crate::permission_bits::{Capability, PermissionField};

/// The identity an operation is authorised against: a caller's own reference
/// id (absent for a guest) plus every group it belongs to.
#[derive(Debug, Clone, Default)]
pub struct Caller {
  pub user_ref_id: Option<ReferenceId>,
  pub group_ref_ids: Vec<ReferenceId>,
}

impl Caller {
  pub fn guest() -> Self {
    Self::default()
  }

  pub fn user(user_ref_id: ReferenceId, group_ref_ids: Vec<ReferenceId>) -> Self {
    Self {
      user_ref_id: Some(user_ref_id),
      group_ref_ids,
    }
  }
}

/// `allow(p, caller, cap)` (§4.5): true iff the caller is the owner and owner
/// bits permit `cap`, OR the caller shares a group with `p.groups` whose bits
/// permit `cap`, OR guest bits permit `cap`. §8 invariant 7: this is a pure
/// disjunction — clearing every bit for `cap` across all three fields denies
/// every caller, regardless of ownership or membership.
pub fn allow(instance: &PermissionInstance, caller: &Caller, capability: Capability) -> bool {
  if let Some(user_ref_id) = caller.user_ref_id {
    if instance.owner_ref_id == Some(user_ref_id) && instance.bits.has(PermissionField::User, capability) {
      return true;
    }
  }

  for group in &instance.groups {
    if caller.group_ref_ids.contains(&group.group_ref_id) && group.bits.has(PermissionField::Group, capability) {
      return true;
    }
  }

  return instance.bits.has(PermissionField::Guest, capability);
}

/// The 2-arg predicate backing `IsUserActionAllowed`: true iff both the
/// type-level row permission and the action-level permission independently
/// grant Execute (§4.5).
pub fn can_execute(row_instance: &PermissionInstance, action_bits: &crate::permission_bits::PermissionBits, caller: &Caller) -> bool {
  let action_instance = PermissionInstance {
    owner_ref_id: row_instance.owner_ref_id,
    groups: row_instance.groups.clone(),
    bits: *action_bits,
  };
  return allow(row_instance, caller, Capability::Execute) && allow(&action_instance, caller, Capability::Execute);
}

/// §4.5 / S2: loads the action row by `(on_type, name)` and the row's own
/// permission instance, then checks both independently grant Execute.
pub async fn is_user_action_allowed(
  executor: &dyn Executor,
  cache: &dyn LookupCache,
  caller: &Caller,
  row_instance: &PermissionInstance,
  on_type: &str,
  action_name: &str,
) -> Result<bool> {
  let action = action::load_action(executor, cache, on_type, action_name).await?;
  return Ok(can_execute(row_instance, &action.permission, caller));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::permission::GroupPermission;
  use crate::permission_bits::PermissionBits;

  fn instance_with_bits(bits: i64) -> PermissionInstance {
    PermissionInstance {
      owner_ref_id: None,
      groups: Vec::new(),
      bits: PermissionBits(bits),
    }
  }

  #[test]
  fn owner_allowed_when_owner_bits_grant_capability() {
    let owner = ReferenceId::new_v7();
    let instance = PermissionInstance {
      owner_ref_id: Some(owner),
      groups: Vec::new(),
      bits: PermissionBits(PermissionBits::USER_READ),
    };
    let caller = Caller::user(owner, Vec::new());
    assert!(allow(&instance, &caller, Capability::Read));
    assert!(!allow(&instance, &caller, Capability::Update));
  }

  #[test]
  fn group_member_allowed_when_group_bits_grant_capability() {
    let group = ReferenceId::new_v7();
    let instance = PermissionInstance {
      owner_ref_id: None,
      groups: vec![GroupPermission {
        group_ref_id: group,
        object_ref_id: ReferenceId::new_v7(),
        relation_ref_id: ReferenceId::new_v7(),
        bits: PermissionBits(PermissionBits::GROUP_READ),
      }],
      bits: PermissionBits(0),
    };
    let caller = Caller::user(ReferenceId::new_v7(), vec![group]);
    assert!(allow(&instance, &caller, Capability::Read));
  }

  #[test]
  fn guest_bits_grant_access_to_any_caller() {
    let instance = instance_with_bits(PermissionBits::GUEST_READ);
    assert!(allow(&instance, &Caller::guest(), Capability::Read));
    assert!(allow(&instance, &Caller::user(ReferenceId::new_v7(), Vec::new()), Capability::Read));
  }

  #[test]
  fn clearing_all_three_fields_denies_every_caller() {
    let owner = ReferenceId::new_v7();
    let instance = PermissionInstance {
      owner_ref_id: Some(owner),
      groups: Vec::new(),
      bits: PermissionBits(0),
    };
    assert!(!allow(&instance, &Caller::user(owner, Vec::new()), Capability::Update));
    assert!(!allow(&instance, &Caller::guest(), Capability::Update));
  }

  #[test]
  fn can_execute_requires_both_row_and_action_execute_bits() {
    let owner = ReferenceId::new_v7();
    let row_instance = PermissionInstance {
      owner_ref_id: Some(owner),
      groups: Vec::new(),
      bits: PermissionBits(PermissionBits::USER_READ | PermissionBits::USER_EXECUTE),
    };
    let caller = Caller::user(owner, Vec::new());

    assert!(can_execute(&row_instance, &PermissionBits(PermissionBits::USER_EXECUTE), &caller));
    assert!(!can_execute(&row_instance, &PermissionBits(PermissionBits::USER_READ), &caller));
  }
}
