//! Saved page storage.
//!
//! Pages are keyed by [`PageId`] (`"{language}/{slug}"`) and hold an opaque
//! payload (markdown or rendered HTML). Every write replaces the previous
//! record and stamps `updated_at`; there is no expiry or eviction.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, types::Type};

/// Composite page key: `{language}/{slug/path}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageId(String);

impl PageId {
    /// Build an id from a language and a (possibly nested) slug.
    pub fn new(language: &str, slug: &str) -> Result<Self, Error> {
        Self::parse(&format!("{}/{}", language.trim(), slug.trim()))
    }

    /// Parse and validate a raw `{language}/{slug}` id.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        let segments: Vec<&str> = raw.split('/').collect();

        if segments.len() < 2 {
            return Err(Error::InvalidPageId(format!("{raw:?} needs a language and a slug")));
        }

        for segment in &segments {
            if segment.is_empty() {
                return Err(Error::InvalidPageId(format!("{raw:?} has an empty segment")));
            }
            if *segment == "." || *segment == ".." {
                return Err(Error::InvalidPageId(format!("{raw:?} has a relative segment")));
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(Error::InvalidPageId(format!("{raw:?} contains whitespace")));
            }
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First path segment.
    pub fn language(&self) -> &str {
        self.0.split_once('/').map(|(lang, _)| lang).unwrap_or(&self.0)
    }

    /// Everything after the language segment.
    pub fn slug(&self) -> &str {
        self.0.split_once('/').map(|(_, slug)| slug).unwrap_or("")
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PageId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PageId> for String {
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// A saved page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: PageId,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Persistent page store used by the sync coordinator.
///
/// Every method is a single short-lived operation against the backing store.
/// Concurrent saves to the same id are last-completed-wins.
#[async_trait::async_trait]
pub trait PageStore: Send + Sync {
    /// Insert or replace the page, stamping `updated_at` with the current time.
    async fn save(&self, id: &PageId, payload: &str) -> Result<(), Error>;

    /// The saved record, or `None` if the id was never saved (or was deleted).
    async fn get(&self, id: &PageId) -> Result<Option<PageRecord>, Error>;

    /// Remove the page. Deleting an absent id is not an error.
    async fn delete(&self, id: &PageId) -> Result<(), Error>;

    /// Every saved id.
    async fn list_keys(&self) -> Result<BTreeSet<PageId>, Error>;

    /// Every saved record, ordered by id.
    async fn list_records(&self) -> Result<Vec<PageRecord>, Error>;
}

fn conversion_failure(column: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRecord> {
    let id: String = row.get(0)?;
    let updated_at: String = row.get(2)?;

    Ok(PageRecord {
        id: PageId::parse(&id).map_err(|e| conversion_failure(0, e))?,
        payload: row.get(1)?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| conversion_failure(2, e))?
            .with_timezone(&Utc),
    })
}

impl CacheDb {
    /// Insert or update a saved page.
    ///
    /// Uses UPSERT semantics: inserts if the id doesn't exist, replaces the
    /// payload and timestamp if it does.
    pub async fn save_page(&self, id: &PageId, payload: &str) -> Result<(), Error> {
        let id = id.to_string();
        let payload = payload.to_string();
        let updated_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO pages (id, payload, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(id) DO UPDATE SET
                        payload = excluded.payload,
                        updated_at = excluded.updated_at",
                    params![id, payload, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a saved page by id.
    ///
    /// Returns None if the id doesn't exist in the store.
    pub async fn get_page(&self, id: &PageId) -> Result<Option<PageRecord>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<PageRecord>, Error> {
                let mut stmt = conn.prepare("SELECT id, payload, updated_at FROM pages WHERE id = ?1")?;

                match stmt.query_row(params![id], row_to_record) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a saved page.
    ///
    /// Returns whether a row was removed.
    pub async fn delete_page(&self, id: &PageId) -> Result<bool, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM pages WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List every saved page, ordered by id.
    pub async fn list_pages(&self) -> Result<Vec<PageRecord>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PageRecord>, Error> {
                let mut stmt = conn.prepare("SELECT id, payload, updated_at FROM pages ORDER BY id")?;
                let records = stmt
                    .query_map([], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// List every saved page id.
    pub async fn list_page_ids(&self) -> Result<BTreeSet<PageId>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<PageId>, Error> {
                let mut stmt = conn.prepare("SELECT id FROM pages")?;
                let raw = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                raw.iter().map(|id| PageId::parse(id)).collect()
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl PageStore for CacheDb {
    async fn save(&self, id: &PageId, payload: &str) -> Result<(), Error> {
        self.save_page(id, payload).await
    }

    async fn get(&self, id: &PageId) -> Result<Option<PageRecord>, Error> {
        self.get_page(id).await
    }

    async fn delete(&self, id: &PageId) -> Result<(), Error> {
        let removed = self.delete_page(id).await?;
        if !removed {
            tracing::debug!(%id, "delete of unsaved page");
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<BTreeSet<PageId>, Error> {
        self.list_page_ids().await
    }

    async fn list_records(&self) -> Result<Vec<PageRecord>, Error> {
        self.list_pages().await
    }
}
