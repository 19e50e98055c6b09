//! Domain logic behind the HTTP surface.
//!
//! `file_tree` is the authoritative in-memory model; the other modules
//! query it, persist the session blob, or schedule its sync transitions.

pub mod analytics;
pub mod collections;
pub mod drive_service;
pub mod file_tree;
pub mod query;
pub mod session_store;
pub mod sync_scheduler;
