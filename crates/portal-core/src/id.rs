//! Identifier validation.
//!
//! The backend identifies every row by a UUID in its canonical textual form:
//! 36 characters, lowercase hex, hyphens at offsets 8, 13, 18 and 23.
//! [`Uuid::parse_str`] is more lenient (braces, URNs, the simple form,
//! uppercase), so ids typed by a user are checked here first.

use uuid::Uuid;

use crate::{Error, Result};

const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Whether `s` is a canonical lowercase hyphenated UUID.
pub fn is_canonical(s: &str) -> bool {
  s.len() == 36
    && s.bytes().enumerate().all(|(i, b)| {
      if HYPHENS.contains(&i) {
        b == b'-'
      } else {
        b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
      }
    })
}

/// Parse a user-supplied identifier, rejecting anything non-canonical.
pub fn parse_id(s: &str) -> Result<Uuid> {
  if !is_canonical(s) {
    return Err(Error::InvalidId(s.to_owned()));
  }
  Uuid::parse_str(s).map_err(|_| Error::InvalidId(s.to_owned()))
}

/// Check that a required text field is present and not blank.
pub fn require(field: &'static str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::MissingField(field));
  }
  Ok(())
}
