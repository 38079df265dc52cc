//! SQLite-backed offline store for saved pages and cached GET responses.
//!
//! This module provides the persistent half of the offline layer using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - A `pages` table keyed by `"{language}/{slug}"` (last write wins)
//! - Versioned response buckets for the network-first proxy
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod pages;
pub mod responses;

pub use crate::Error;

pub use connection::CacheDb;
pub use pages::{PageId, PageRecord, PageStore};
pub use responses::CachedResponse;
