//! Bulk find/replace engine for YouTube video descriptions.
//!
//! The core is split into two layers:
//!
//! - [`youtube`] - the remote collaborator: authentication, HTTP plumbing,
//!   and typed calls against the YouTube Data API v3
//! - [`engine`] - the bulk mutation engine: pagination, matching, the
//!   backup ledger, the quota-aware mutator, and the link auditor
//!
//! The CLI in `main.rs` is a thin consumer of these request/response
//! contracts; nothing in the core depends on it.

pub mod config;
pub mod engine;
pub mod error;
pub mod youtube;
