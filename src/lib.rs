//! Deita - join builder and paginated query session for the Deita workspace API
//!
//! This crate provides the client-side core of the Deita query explorer:
//! - Join graph building from table/field gestures, rendered to SQL text
//! - A paginated query session that infers page size and counts lazily
//! - An HTTP backend for the workspace query, export and saved-query endpoints
//! - An explorer event loop tying the two state machines together

pub mod backend;
pub mod catalog;
pub mod config;
pub mod explorer;
pub mod export;
pub mod join_builder;
pub mod session;
pub mod sql_guard;
