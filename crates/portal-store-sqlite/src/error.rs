//! Error type for `portal-store-sqlite`.

use portal_core::gateway::Table;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("{table} has no column {column:?}")]
  UnknownColumn { table: Table, column: String },

  #[error("{table}.{column} expects {expected}")]
  InvalidValue {
    table:    Table,
    column:   String,
    expected: &'static str,
  },

  #[error("{table} row not found: {id}")]
  NotFound { table: Table, id: Uuid },

  #[error("Invalid login credentials")]
  InvalidCredentials,

  #[error("an identity with email {0:?} already exists")]
  EmailTaken(String),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
