//! Fetching page payloads from the live site.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use crate::fetch::page_url;
use crate::proxy::{NetworkCacheProxy, ResponseSource, Transport};
use klazz_core::{Error, PageId};

/// A page body and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub payload: String,
    pub source: ResponseSource,
}

/// Source of fresh page content for the sync coordinator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, id: &PageId) -> Result<FetchedPage, Error>;
}

/// Fetches `{base}{route_prefix}/{id}` through the proxy.
pub struct SiteFetcher<T> {
    proxy: Arc<NetworkCacheProxy<T>>,
    base_url: Url,
    route_prefix: String,
}

impl<T: Transport> SiteFetcher<T> {
    pub fn new(proxy: Arc<NetworkCacheProxy<T>>, base_url: Url, route_prefix: impl Into<String>) -> Self {
        Self { proxy, base_url, route_prefix: route_prefix.into() }
    }

    pub fn proxy(&self) -> &Arc<NetworkCacheProxy<T>> {
        &self.proxy
    }
}

#[async_trait]
impl<T: Transport> PageFetcher for SiteFetcher<T> {
    async fn fetch_page(&self, id: &PageId) -> Result<FetchedPage, Error> {
        let url = page_url(&self.base_url, &self.route_prefix, id).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let response = self.proxy.get(url).await?;

        let status = response.response.status;
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} for {}", status.as_u16(), id)));
        }

        Ok(FetchedPage {
            payload: String::from_utf8_lossy(&response.response.bytes).into_owned(),
            source: response.source,
        })
    }
}
