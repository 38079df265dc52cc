//! page_open and page_view tool implementations.
//!
//! `page_open` is the explicit load path: live when online, saved copy
//! otherwise. `page_view` records a page the caller rendered itself.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use klazz_client::{OfflineSyncCoordinator, PageFetcher};
use klazz_core::{PageId, PageStore};

/// Input parameters for page_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageOpenParams {
    /// Page id as `{language}/{slug}`, e.g. `javascript/intro`.
    pub id: String,
}

/// Input parameters for page_view tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageViewParams {
    /// Page id as `{language}/{slug}`.
    pub id: String,

    /// The rendered payload (markdown or HTML).
    pub payload: String,
}

/// Output structure for page_view tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageViewOutput {
    pub id: String,
    /// Whether the page was saved for offline use.
    pub saved: bool,
    /// Storage error, when the save failed.
    pub error: Option<String>,
}

/// Implementation of the page_open tool.
pub async fn open_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>, params: PageOpenParams,
) -> Result<CallToolResult, McpError> {
    let id = PageId::parse(&params.id)?;
    let view = sync.open(&id).await;
    json_result(&view)
}

/// Implementation of the page_view tool.
///
/// A failed save is reported in the output, never as a tool error.
pub async fn view_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>, params: PageViewParams,
) -> Result<CallToolResult, McpError> {
    let id = PageId::parse(&params.id)?;
    let result = sync.record_view(&id, &params.payload).await;

    let output =
        PageViewOutput { id: id.to_string(), saved: result.is_ok(), error: result.err().map(|e| e.to_string()) };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{coordinator, output};
    use klazz_core::Connectivity;

    #[tokio::test]
    async fn test_open_online_returns_live_page() {
        let sync = coordinator(&[("rust/intro", "# Intro")], Connectivity::Online).await;

        let result = open_impl(&sync, PageOpenParams { id: "rust/intro".into() }).await.unwrap();
        let json = output(&result);
        assert_eq!(json["status"], "live");
        assert_eq!(json["payload"], "# Intro");
        assert_eq!(json["source"], "network");
    }

    #[tokio::test]
    async fn test_open_offline_uses_saved_copy() {
        let sync = coordinator(&[], Connectivity::Offline).await;
        let params = PageViewParams { id: "javascript/intro".into(), payload: "# Intro".into() };
        let saved = output(&view_impl(&sync, params).await.unwrap());
        assert_eq!(saved["saved"], true);

        let json = output(&open_impl(&sync, PageOpenParams { id: "javascript/intro".into() }).await.unwrap());
        assert_eq!(json["status"], "cached");
        assert_eq!(json["record"]["payload"], "# Intro");
        assert_eq!(json["banner"], "You are offline. Showing cached content.");
    }

    #[tokio::test]
    async fn test_open_offline_unknown_page() {
        let sync = coordinator(&[], Connectivity::Offline).await;

        let json = output(&open_impl(&sync, PageOpenParams { id: "go/intro".into() }).await.unwrap());
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["message"], "This page is not available offline yet.");
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_id() {
        let sync = coordinator(&[], Connectivity::Online).await;

        let err = open_impl(&sync, PageOpenParams { id: "nolanguage".into() }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
