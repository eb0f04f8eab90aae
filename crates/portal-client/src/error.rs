//! Error type for `portal-client`.
//!
//! The variants follow the failure taxonomy callers act on: bad local input,
//! rejected credentials, insufficient role, and anything the backend
//! reported. Errors are `Clone` so one failed fetch can be handed to every
//! caller that was waiting on it.

use std::sync::Arc;

use portal_core::access::Denied;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
  /// Malformed input caught before any network call.
  #[error("validation error: {0}")]
  Validation(String),

  /// Credentials rejected, or no usable session.
  #[error("authentication error: {0}")]
  Auth(String),

  /// The signed-in role may not perform this action.
  #[error("permission denied: {0}")]
  Forbidden(String),

  /// The backend reported a failure.
  #[error("repository error: {0}")]
  Repository(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn repository<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Repository(Arc::new(err))
  }

  pub fn not_authenticated() -> Self { Self::Auth("not signed in".to_string()) }
}

impl From<portal_core::Error> for Error {
  fn from(err: portal_core::Error) -> Self { Self::Validation(err.to_string()) }
}

impl From<Denied> for Error {
  fn from(err: Denied) -> Self { Self::Forbidden(err.0) }
}

/// A plain-text error for failures with no underlying source.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Message(pub String);

pub type Result<T, E = Error> = std::result::Result<T, E>;
