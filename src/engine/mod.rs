//! Bulk mutation engine
//!
//! The engine turns a find/replace pair into applied description updates,
//! with a durable backup trail and quota awareness throughout.
//!
//! # Architecture
//!
//! - [`pager`] - paginated retrieval of the channel's videos
//! - [`matcher`] - substring matching and literal substitution
//! - [`ledger`] - append-only backup store enabling restore
//! - [`mutator`] - orchestrates snapshot-then-update with pacing, backoff,
//!   quota budgeting, and cooperative cancellation
//! - [`auditor`] - read-only link liveness probing and CSV reporting
//!
//! Control flow: the pager feeds the matcher, the caller selects from the
//! proposed changes, and the mutator executes the selection writing through
//! the ledger before every remote call.

pub mod auditor;
pub mod ledger;
pub mod matcher;
pub mod mutator;
pub mod pager;
