use crate::value::Value;

/// Positional bind parameters, in the order they fill `?` placeholders.
/// `sqlx::Any` rewrites `?` to `$1, $2, ...` for Postgres and leaves it
/// untouched for MySQL, so `SqlBuilder` only ever emits `?`.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
  pub fn new() -> Self {
    Self(Vec::new())
  }

  pub fn push(&mut self, value: impl Into<Value>) {
    self.0.push(value.into());
  }

  pub fn as_slice(&self) -> &[Value] {
    &self.0
  }
}

impl FromIterator<Value> for Params {
  fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($param:expr),+ $(,)?) => {
        $crate::Params(vec![$(Into::<$crate::Value>::into($param)),+])
    };
}
