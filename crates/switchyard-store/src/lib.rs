//! # switchyard-store
//!
//! Durable conversation state for Switchyard, backed by one SQLite file.
//!
//! The crate exposes a [`SessionStore`] handle that owns a serialized
//! `rusqlite::Connection` and provides typed operations for sessions,
//! messages, tags, bookmarks, full-text search, export/import and the
//! analytics views. Every write that touches more than one table runs in a
//! single transaction, so session aggregates and the search index never drift
//! from the messages they summarize.

pub mod analytics;
pub mod database;
pub mod export;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod search;
pub mod sessions;
pub mod tags;

mod error;
mod time;

pub use database::SessionStore;
pub use error::{Result, StoreError};
pub use models::*;
