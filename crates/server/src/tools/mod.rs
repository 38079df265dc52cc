//! MCP tool implementations.
//!
//! This module contains all tools exposed by the klazz-offline server.

pub mod offline;
pub mod pages;
pub mod search;
pub mod toc;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use klazz_core::{Error, PageId};

pub use offline::{ConnectivitySetParams, OfflineDeleteParams, OfflineDownloadParams, OfflineStatusParams};
pub use pages::{PageOpenParams, PageViewParams};
pub use search::{SearchParams, SearchReindexParams};
pub use toc::TocGetParams;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub(crate) fn parse_ids(raw: &[String]) -> Result<Vec<PageId>, Error> {
    raw.iter().map(|id| PageId::parse(id)).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use rmcp::model::CallToolResult;

    use klazz_client::{FetchedPage, OfflineSyncCoordinator, PageFetcher, ResponseSource};
    use klazz_core::{CacheDb, Connectivity, ConnectivityMonitor, Error, PageId};

    /// Serves a fixed set of pages; everything else is unreachable.
    #[derive(Default)]
    pub struct StaticFetcher {
        pub pages: HashMap<String, String>,
    }

    impl StaticFetcher {
        pub fn with(pages: &[(&str, &str)]) -> Self {
            Self { pages: pages.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch_page(&self, id: &PageId) -> Result<FetchedPage, Error> {
            self.pages
                .get(id.as_str())
                .map(|payload| FetchedPage { payload: payload.clone(), source: ResponseSource::Network })
                .ok_or_else(|| Error::Network(format!("unreachable: {id}")))
        }
    }

    pub type TestSync = OfflineSyncCoordinator<CacheDb, StaticFetcher>;

    pub async fn coordinator(pages: &[(&str, &str)], state: Connectivity) -> TestSync {
        let db = CacheDb::open_in_memory().await.unwrap();
        let monitor = Arc::new(ConnectivityMonitor::new(state));
        OfflineSyncCoordinator::new(db, StaticFetcher::with(pages), monitor)
    }

    /// Parse the JSON text of a successful tool result.
    pub fn output(result: &CallToolResult) -> serde_json::Value {
        let text = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .expect("Expected text content");
        serde_json::from_str(&text.text).unwrap()
    }
}
