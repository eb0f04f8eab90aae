//! SQLite backend for the portal.
//!
//! Implements [`portal_core::gateway::Gateway`] on a single SQLite file:
//! every portal table, password identities, the current session and blob
//! storage. Wraps [`tokio_rusqlite`] so all database access runs on a
//! dedicated thread without blocking the async runtime.

mod auth;
mod schema;
mod store;
mod tables;

pub mod error;

pub use error::{Error, Result};
pub use store::{GatewaySettings, SqliteGateway};

#[cfg(test)]
mod tests;
