//! Core types and shared functionality for klazz-offline.
//!
//! This crate provides:
//! - SQLite-backed page store and versioned response buckets
//! - Unified error types
//! - Configuration structures
//! - The online/offline connectivity state machine
//! - Content tree utilities (search index, table of contents, pre-cache list)

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod content;
pub mod error;

pub use cache::{CacheDb, CachedResponse, PageId, PageRecord, PageStore};
pub use config::{AppConfig, ConfigError};
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivitySubscription};
pub use error::Error;
