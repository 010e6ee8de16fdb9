//! Core domain entities.
//!
//! Entities are plain data structures. Creation input uses a separate
//! `New*` struct so that storage-assigned fields (id, timestamps, counters)
//! can never be supplied by callers.

pub mod link;

pub use link::{Link, NewLink, PLACEHOLDER_PREFIX};
