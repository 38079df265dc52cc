//! Network-first request interceptor backed by a versioned response bucket.
//!
//! ### Request handling
//! - Non-GET requests go straight to the network and are never cached.
//! - GET is attempted live first; 2xx responses are written through to the
//!   active bucket.
//! - When the network fails, the active bucket is consulted. A stored entry
//!   is returned byte-for-byte; otherwise the original error propagates.
//!
//! ### Buckets
//! - Each proxy has its own bucket name (the deployment's cache version).
//! - [`NetworkCacheProxy::activate`] makes that bucket the one every proxy on
//!   the same database reads from. Older buckets are ignored from then on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;

use crate::fetch::{FetchRequest, FetchResponse};
use klazz_core::{CacheDb, CachedResponse, Error};

/// Something that can put a request on the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, Error>;
}

/// Where a proxied response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub response: FetchResponse,
    pub source: ResponseSource,
}

/// Outcome of [`NetworkCacheProxy::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

pub struct NetworkCacheProxy<T> {
    transport: T,
    db: CacheDb,
    bucket: String,
}

impl<T: Transport> NetworkCacheProxy<T> {
    pub fn new(transport: T, db: CacheDb, bucket: impl Into<String>) -> Self {
        Self { transport, db, bucket: bucket.into() }
    }

    /// This proxy's own bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Make this proxy's bucket the active one.
    pub async fn activate(&self) -> Result<(), Error> {
        self.db.activate_bucket(&self.bucket).await?;
        tracing::info!(bucket = %self.bucket, "activated response bucket");
        Ok(())
    }

    /// The bucket reads and writes go to right now.
    ///
    /// Falls back to this proxy's own bucket when nothing has been activated
    /// yet or the store cannot be read.
    pub async fn current_bucket(&self) -> String {
        match self.db.active_bucket().await {
            Ok(Some(bucket)) => bucket,
            Ok(None) => self.bucket.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read active bucket; using {}", self.bucket);
                self.bucket.clone()
            }
        }
    }

    /// Warm this proxy's bucket before activation.
    ///
    /// Each URL is fetched once; failures are recorded and skipped.
    pub async fn install(&self, urls: &[Url]) -> InstallReport {
        let mut report = InstallReport::default();

        for url in urls {
            let request = FetchRequest::get(url.clone());
            match self.transport.send(&request).await {
                Ok(response) if response.status.is_success() => {
                    match self.db.put_response(&to_cached(&self.bucket, &request, &response)).await {
                        Ok(()) => report.cached.push(url.to_string()),
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "failed to store pre-cached response");
                            report.failed.push(url.to_string());
                        }
                    }
                }
                Ok(response) => {
                    tracing::warn!(url = %url, status = response.status.as_u16(), "pre-cache skipped non-success");
                    report.failed.push(url.to_string());
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "pre-cache fetch failed");
                    report.failed.push(url.to_string());
                }
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installed response bucket"
        );
        report
    }

    /// Shorthand for a proxied GET.
    pub async fn get(&self, url: Url) -> Result<ProxyResponse, Error> {
        self.handle(&FetchRequest::get(url)).await
    }

    /// Intercept one request.
    pub async fn handle(&self, request: &FetchRequest) -> Result<ProxyResponse, Error> {
        if request.method != Method::GET {
            let response = self.transport.send(request).await?;
            return Ok(ProxyResponse { response, source: ResponseSource::Network });
        }

        let bucket = self.current_bucket().await;

        match self.transport.send(request).await {
            Ok(response) => {
                if response.status.is_success() {
                    // Write-through; a failed write never fails the request.
                    if let Err(e) = self.db.put_response(&to_cached(&bucket, request, &response)).await {
                        tracing::warn!(url = %request.url, error = %e, "failed to cache response");
                    }
                }
                Ok(ProxyResponse { response, source: ResponseSource::Network })
            }
            Err(err) => match self.db.match_response(&bucket, Method::GET.as_str(), request.url.as_str()).await {
                Ok(Some(cached)) => {
                    tracing::debug!(url = %request.url, bucket = %bucket, error = %err, "serving cached response");
                    Ok(ProxyResponse { response: from_cached(request, cached), source: ResponseSource::Cache })
                }
                Ok(None) => Err(err),
                Err(lookup) => {
                    tracing::warn!(url = %request.url, error = %lookup, "cache lookup failed");
                    Err(err)
                }
            },
        }
    }
}

fn to_cached(bucket: &str, request: &FetchRequest, response: &FetchResponse) -> CachedResponse {
    let headers: BTreeMap<String, String> = response
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();

    CachedResponse {
        bucket: bucket.to_string(),
        method: request.method.as_str().to_string(),
        url: request.url.to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type.clone(),
        headers,
        body: response.bytes.clone(),
        stored_at: Utc::now(),
    }
}

fn from_cached(request: &FetchRequest, cached: CachedResponse) -> FetchResponse {
    let mut headers = HeaderMap::new();
    for (name, value) in &cached.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }

    FetchResponse {
        url: request.url.clone(),
        final_url: request.url.clone(),
        status: StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK),
        content_type: cached.content_type,
        bytes: cached.body,
        headers,
        fetch_ms: 0,
    }
}
