//! Versioned response buckets.
//!
//! Each deployment writes GET responses into one named bucket. Activating a
//! bucket makes it the one every proxy reads from; older buckets keep their
//! rows but are never consulted again.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, types::Type};

/// A response stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub bucket: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedResponse> {
    let headers_json: String = row.get(5)?;
    let body: Vec<u8> = row.get(6)?;
    let stored_at: String = row.get(7)?;

    Ok(CachedResponse {
        bucket: row.get(0)?,
        method: row.get(1)?,
        url: row.get(2)?,
        status: row.get(3)?,
        content_type: row.get(4)?,
        headers: serde_json::from_str(&headers_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        body: Bytes::from(body),
        stored_at: DateTime::parse_from_rfc3339(&stored_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
            .with_timezone(&Utc),
    })
}

impl CacheDb {
    /// Mark a bucket as the active one.
    ///
    /// Re-activating an existing bucket refreshes its activation time, so the
    /// most recent call always wins.
    pub async fn activate_bucket(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let activated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_buckets (name, activated_at) VALUES (?1, ?2)
                    ON CONFLICT(name) DO UPDATE SET activated_at = excluded.activated_at",
                    params![name, activated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The most recently activated bucket, if any.
    pub async fn active_bucket(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM cache_buckets ORDER BY activated_at DESC, rowid DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                );

                match result {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Every bucket ever activated, newest first.
    pub async fn list_buckets(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_buckets ORDER BY activated_at DESC, rowid DESC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response, replacing any earlier one for the same request.
    pub async fn put_response(&self, response: &CachedResponse) -> Result<(), Error> {
        let response = response.clone();
        let key = compute_request_key(&response.method, &response.url);
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO responses (
                        bucket, request_key, method, url, status, content_type,
                        headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(bucket, request_key) DO UPDATE SET
                        status = excluded.status,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &response.bucket,
                        key,
                        response.method.to_ascii_uppercase(),
                        &response.url,
                        response.status,
                        &response.content_type,
                        headers_json,
                        response.body.as_ref(),
                        response.stored_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request in one bucket.
    pub async fn match_response(&self, bucket: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let bucket = bucket.to_string();
        let key = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT bucket, method, url, status, content_type, headers_json, body, stored_at
                    FROM responses WHERE bucket = ?1 AND request_key = ?2",
                )?;

                match stmt.query_row(params![bucket, key], row_to_response) {
                    Ok(response) => Ok(Some(response)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of responses held in a bucket.
    pub async fn count_responses(&self, bucket: &str) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM responses WHERE bucket = ?1", params![bucket], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(bucket: &str, url: &str, body: &'static [u8]) -> CachedResponse {
        CachedResponse {
            bucket: bucket.to_string(),
            method: "GET".to_string(),
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            headers: BTreeMap::from([("etag".to_string(), "\"abc\"".to_string())]),
            body: Bytes::from_static(body),
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://klazz.example/language/rust/intro";
        db.put_response(&make_response("klazz-v1", url, b"<h1>Intro</h1>"))
            .await
            .unwrap();

        let hit = db.match_response("klazz-v1", "GET", url).await.unwrap().unwrap();
        assert_eq!(hit.body.as_ref(), b"<h1>Intro</h1>");
        assert_eq!(hit.status, 200);
        assert_eq!(hit.headers.get("etag").map(String::as_str), Some("\"abc\""));
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://klazz.example/";
        db.put_response(&make_response("klazz-v1", url, b"old")).await.unwrap();

        assert!(db.match_response("klazz-v2", "GET", url).await.unwrap().is_none());
        assert_eq!(db.count_responses("klazz-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_supersedes_previous() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://klazz.example/";
        db.put_response(&make_response("klazz-v1", url, b"first")).await.unwrap();
        db.put_response(&make_response("klazz-v1", url, b"second")).await.unwrap();

        let hit = db.match_response("klazz-v1", "get", url).await.unwrap().unwrap();
        assert_eq!(hit.body.as_ref(), b"second");
        assert_eq!(db.count_responses("klazz-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_active_bucket_tracks_latest_activation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.active_bucket().await.unwrap().is_none());

        db.activate_bucket("klazz-v1").await.unwrap();
        db.activate_bucket("klazz-v2").await.unwrap();

        assert_eq!(db.active_bucket().await.unwrap().as_deref(), Some("klazz-v2"));
        assert_eq!(db.list_buckets().await.unwrap(), vec!["klazz-v2".to_string(), "klazz-v1".to_string()]);
    }
}
