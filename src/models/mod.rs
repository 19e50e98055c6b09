//! Core data models for the drive.
//!
//! Records, tags and collections live in memory only; the session model is
//! the one piece written to the local key-value store. Everything serializes
//! as camelCase JSON via `serde`.

pub mod collection;
pub mod file_record;
pub mod session;
pub mod tag;
