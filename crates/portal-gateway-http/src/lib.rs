//! HTTP backend for the portal.
//!
//! Implements [`portal_core::gateway::Gateway`] against a hosted backend
//! that exposes a REST row API under `/rest/v1`, password auth under
//! `/auth/v1` and object storage under `/storage/v1`.

mod client;
mod session_file;

pub mod error;

pub use client::{HttpGateway, HttpSettings};
pub use error::{Error, Result};
