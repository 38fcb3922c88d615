use uuid::Uuid;

/// The 16-byte opaque reference id every row carries. Textual form is an
/// RFC-4122 UUID (`Uuid::to_string`/`Uuid::parse_str`), binary form is the raw
/// 16 bytes for database storage. Equality is byte-wise, which `Uuid`'s own
/// `PartialEq` already gives us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(Uuid);

impl ReferenceId {
  pub const NULL: ReferenceId = ReferenceId(Uuid::nil());

  pub fn new_v7() -> Self {
    Self(Uuid::now_v7())
  }

  pub fn from_bytes(bytes: [u8; 16]) -> Self {
    Self(Uuid::from_bytes(bytes))
  }

  pub fn as_bytes(&self) -> &[u8; 16] {
    self.0.as_bytes()
  }

  pub fn is_null(&self) -> bool {
    self.0.is_nil()
  }

  pub fn parse(text: &str) -> Result<Self, uuid::Error> {
    Ok(Self(Uuid::parse_str(text)?))
  }
}

impl std::fmt::Display for ReferenceId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl std::str::FromStr for ReferenceId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl From<Uuid> for ReferenceId {
  fn from(uuid: Uuid) -> Self {
    Self(uuid)
  }
}

impl From<ReferenceId> for Uuid {
  fn from(id: ReferenceId) -> Self {
    id.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_text() {
    let id = ReferenceId::new_v7();
    let text = id.to_string();
    assert_eq!(ReferenceId::parse(&text).unwrap(), id);
  }

  #[test]
  fn null_is_all_zero_bytes() {
    assert_eq!(ReferenceId::NULL.as_bytes(), &[0u8; 16]);
    assert!(ReferenceId::NULL.is_null());
  }
}
