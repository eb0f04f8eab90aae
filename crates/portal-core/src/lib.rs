//! Core types and trait definitions for the franchise intranet portal.
//!
//! This crate is free of HTTP and database dependencies. It defines the
//! domain shape of every entity, the role/permission model, and the
//! [`gateway::Gateway`] abstraction that backends implement.

pub mod access;
pub mod branch;
pub mod company;
pub mod document;
pub mod error;
pub mod event;
pub mod gateway;
pub mod id;
pub mod news;
pub mod notification;
pub mod patch;
pub mod product;
pub mod user;

pub use error::{Error, Result};
pub use patch::Patch;
