//! 21-bit permission mask: three 7-bit fields (guest, user, group), each
//! encoding {Peek, Read, Create, Update, Delete, Execute, Refer}. The packing
//! is part of the wire contract (spec §6) — bit positions below must not move.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
  Peek,
  Read,
  Create,
  Update,
  Delete,
  Execute,
  Refer,
}

impl Capability {
  const ALL: [Capability; 7] = [
    Capability::Peek,
    Capability::Read,
    Capability::Create,
    Capability::Update,
    Capability::Delete,
    Capability::Execute,
    Capability::Refer,
  ];

  const fn field_offset(&self) -> u32 {
    match self {
      Capability::Peek => 0,
      Capability::Read => 1,
      Capability::Create => 2,
      Capability::Update => 3,
      Capability::Delete => 4,
      Capability::Execute => 5,
      Capability::Refer => 6,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Guest,
  User,
  Group,
}

impl Field {
  const fn base_bit(&self) -> u32 {
    match self {
      Field::Guest => 0,
      Field::User => 7,
      Field::Group => 14,
    }
  }
}

const fn bit(field: Field, cap: Capability) -> u32 {
  field.base_bit() + cap.field_offset()
}

/// A 21-bit owner/user/group/guest permission mask, stored as an `i64` to
/// match the database column's affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct PermissionBits(pub i64);

macro_rules! const_bit {
  ($name:ident, $field:expr, $cap:expr) => {
    pub const $name: i64 = 1 << bit($field, $cap);
  };
}

impl PermissionBits {
  const_bit!(GUEST_PEEK, Field::Guest, Capability::Peek);
  const_bit!(GUEST_READ, Field::Guest, Capability::Read);
  const_bit!(GUEST_CREATE, Field::Guest, Capability::Create);
  const_bit!(GUEST_UPDATE, Field::Guest, Capability::Update);
  const_bit!(GUEST_DELETE, Field::Guest, Capability::Delete);
  const_bit!(GUEST_EXECUTE, Field::Guest, Capability::Execute);
  const_bit!(GUEST_REFER, Field::Guest, Capability::Refer);

  const_bit!(USER_PEEK, Field::User, Capability::Peek);
  const_bit!(USER_READ, Field::User, Capability::Read);
  const_bit!(USER_CREATE, Field::User, Capability::Create);
  const_bit!(USER_UPDATE, Field::User, Capability::Update);
  const_bit!(USER_DELETE, Field::User, Capability::Delete);
  const_bit!(USER_EXECUTE, Field::User, Capability::Execute);
  const_bit!(USER_REFER, Field::User, Capability::Refer);

  const_bit!(GROUP_PEEK, Field::Group, Capability::Peek);
  const_bit!(GROUP_READ, Field::Group, Capability::Read);
  const_bit!(GROUP_CREATE, Field::Group, Capability::Create);
  const_bit!(GROUP_UPDATE, Field::Group, Capability::Update);
  const_bit!(GROUP_DELETE, Field::Group, Capability::Delete);
  const_bit!(GROUP_EXECUTE, Field::Group, Capability::Execute);
  const_bit!(GROUP_REFER, Field::Group, Capability::Refer);

  pub const USER_CRUD: i64 = Self::USER_READ | Self::USER_CREATE | Self::USER_UPDATE | Self::USER_DELETE;
  pub const GROUP_CRUD: i64 = Self::GROUP_READ | Self::GROUP_CREATE | Self::GROUP_UPDATE | Self::GROUP_DELETE;

  /// Owner full control plus group read.
  pub const DEFAULT_PERMISSION: i64 = Self::USER_CRUD
    | Self::USER_PEEK
    | Self::USER_EXECUTE
    | Self::USER_REFER
    | Self::GROUP_READ;

  pub fn new(bits: i64) -> Self {
    Self(bits)
  }

  pub fn guest_read() -> Self {
    Self(Self::GUEST_READ)
  }

  pub fn has(&self, field: PermissionField, cap: Capability) -> bool {
    let f = match field {
      PermissionField::Guest => Field::Guest,
      PermissionField::User => Field::User,
      PermissionField::Group => Field::Group,
    };
    return self.0 & (1 << bit(f, cap)) != 0;
  }

  /// Decodes every set capability across all three fields, for round-trip
  /// tests and diagnostics.
  pub fn decode(&self) -> Vec<(PermissionField, Capability)> {
    let mut out = Vec::new();
    for field in [PermissionField::Guest, PermissionField::User, PermissionField::Group] {
      for cap in Capability::ALL {
        if self.has(field, cap) {
          out.push((field, cap));
        }
      }
    }
    return out;
  }

  pub fn encode(pairs: &[(PermissionField, Capability)]) -> Self {
    let mut bits = PermissionBits(0);
    for (field, cap) in pairs {
      bits = bits.with(*field, *cap);
    }
    return bits;
  }

  pub fn with(&self, field: PermissionField, cap: Capability) -> Self {
    let f = match field {
      PermissionField::Guest => Field::Guest,
      PermissionField::User => Field::User,
      PermissionField::Group => Field::Group,
    };
    return Self(self.0 | (1 << bit(f, cap)));
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionField {
  Guest,
  User,
  Group,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_permission_is_owner_full_plus_group_read() {
    let bits = PermissionBits(PermissionBits::DEFAULT_PERMISSION);
    assert!(bits.has(PermissionField::User, Capability::Read));
    assert!(bits.has(PermissionField::User, Capability::Create));
    assert!(bits.has(PermissionField::User, Capability::Update));
    assert!(bits.has(PermissionField::User, Capability::Delete));
    assert!(bits.has(PermissionField::Group, Capability::Read));
    assert!(!bits.has(PermissionField::Group, Capability::Update));
    assert!(!bits.has(PermissionField::Guest, Capability::Read));
  }

  #[test]
  fn decode_then_encode_round_trips_every_bit_value() {
    for raw in 0..(1i64 << 21) {
      let bits = PermissionBits(raw);
      let decoded = bits.decode();
      let re_encoded = PermissionBits::encode(&decoded);
      assert_eq!(re_encoded.0, raw);
    }
  }

  #[test]
  fn guest_read_is_a_single_bit() {
    let bits = PermissionBits::guest_read();
    assert_eq!(bits.0, PermissionBits::GUEST_READ);
    assert!(bits.has(PermissionField::Guest, Capability::Read));
    assert!(!bits.has(PermissionField::Guest, Capability::Peek));
  }
}
