//! Error type for `portal-gateway-http`.

use portal_core::gateway::Table;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The backend answered with a non-success status. `message` is the
  /// human-readable part of its error body.
  #[error("{message}")]
  Status { status: StatusCode, message: String },

  #[error("{table} row not found: {id}")]
  NotFound { table: Table, id: Uuid },

  #[error("{0} requires a service key")]
  MissingServiceKey(&'static str),

  #[error("unexpected response: {0}")]
  UnexpectedResponse(&'static str),

  #[error("session file error: {0}")]
  SessionFile(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Pull the readable message out of an error body. The auth, rest and
/// storage services each use a different field for it.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
  let parsed: Option<Value> = serde_json::from_str(body).ok();
  parsed
    .as_ref()
    .and_then(|json| {
      ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|field| json.get(field).and_then(Value::as_str))
    })
    .map(str::to_owned)
    .unwrap_or_else(|| {
      if body.trim().is_empty() {
        status.to_string()
      } else {
        body.trim().to_owned()
      }
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn auth_errors_use_error_description() {
    let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
    assert_eq!(
      error_message(StatusCode::BAD_REQUEST, body),
      "Invalid login credentials"
    );
  }

  #[test]
  fn rest_errors_use_message() {
    let body = r#"{"code":"23505","message":"duplicate key value"}"#;
    assert_eq!(error_message(StatusCode::CONFLICT, body), "duplicate key value");
  }

  #[test]
  fn empty_body_falls_back_to_status() {
    assert_eq!(
      error_message(StatusCode::UNAUTHORIZED, ""),
      "401 Unauthorized"
    );
  }
}
