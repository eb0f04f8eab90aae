//! The partial-update tri-state.
//!
//! An update payload must distinguish "leave this column alone" from
//! "clear this column". `Option<T>` cannot express both, so every nullable
//! field in an update type is a [`Patch`].

/// A requested change to one nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
  /// Field is omitted from the outgoing payload.
  #[default]
  Keep,
  /// Field is sent as `null`.
  Clear,
  /// Field is sent with this value.
  Set(T),
}

impl<T> Patch<T> {
  pub fn is_keep(&self) -> bool { matches!(self, Self::Keep) }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
    match self {
      Self::Keep => Patch::Keep,
      Self::Clear => Patch::Clear,
      Self::Set(v) => Patch::Set(f(v)),
    }
  }
}
