//! search and search_reindex tool implementations.

use std::path::PathBuf;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::json_result;
use klazz_core::content::{DEFAULT_LIMIT, SearchHit, SearchIndex, build_index, write_index};
use klazz_core::{AppConfig, Error};

/// Input parameters for search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search text; at least two characters.
    pub query: String,

    /// Maximum number of hits (default: 5).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Input parameters for search_reindex tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchReindexParams {
    /// Write the rebuilt index to the configured path (default: true).
    #[serde(default = "default_true")]
    pub persist: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReindexOutput {
    pub entries: usize,
    /// Where the index was written, if it was persisted.
    pub path: Option<PathBuf>,
}

/// Implementation of the search tool.
pub async fn search_impl(index: &RwLock<SearchIndex>, params: SearchParams) -> Result<CallToolResult, McpError> {
    if params.limit == 0 {
        return Err(Error::InvalidInput("limit must be at least 1".into()).into());
    }

    let hits = index.read().await.search(&params.query, params.limit);
    tracing::debug!(query = %params.query, hits = hits.len(), "search");

    json_result(&SearchOutput { query: params.query, hits })
}

/// Implementation of the search_reindex tool.
///
/// Walks the content tree, optionally writes the JSON index, and swaps it in.
pub async fn reindex_impl(
    index: &RwLock<SearchIndex>, config: &AppConfig, params: SearchReindexParams,
) -> Result<CallToolResult, McpError> {
    let content_dir = config.content_dir.clone();
    let route_prefix = config.route_prefix.clone();
    let snippet_len = config.snippet_len;

    let entries = tokio::task::spawn_blocking(move || build_index(&content_dir, &route_prefix, snippet_len))
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))??;

    let path = if params.persist {
        write_index(&config.search_index_path, &entries)?;
        Some(config.search_index_path.clone())
    } else {
        None
    };

    let count = entries.len();
    *index.write().await = SearchIndex::new(entries);
    tracing::info!(entries = count, "search index reloaded");

    json_result(&SearchReindexOutput { entries: count, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;

    fn config(root: &std::path::Path) -> AppConfig {
        let content = root.join("Note");
        std::fs::create_dir_all(content.join("rust")).unwrap();
        std::fs::write(content.join("rust/ownership.md"), "---\ntitle: Ownership Rules\n---\nEvery value has an owner.")
            .unwrap();
        std::fs::write(content.join("rust/Table_Of_Contents.md"), "## Basics\n- ownership\n").unwrap();

        AppConfig {
            content_dir: content,
            search_index_path: root.join("search-index.json"),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_reindex_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let index = RwLock::new(SearchIndex::new(Vec::new()));

        let json = output(&reindex_impl(&index, &config, SearchReindexParams { persist: true }).await.unwrap());
        assert_eq!(json["entries"], 1);
        assert!(config.search_index_path.exists());

        let params = SearchParams { query: "owner".into(), limit: DEFAULT_LIMIT };
        let json = output(&search_impl(&index, params).await.unwrap());
        assert_eq!(json["hits"][0]["url"], "/language/rust/ownership");
        assert_eq!(json["hits"][0]["type"], "Tutorial");
    }

    #[tokio::test]
    async fn test_reindex_without_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let index = RwLock::new(SearchIndex::new(Vec::new()));

        let json = output(&reindex_impl(&index, &config, SearchReindexParams { persist: false }).await.unwrap());
        assert!(json["path"].is_null());
        assert!(!config.search_index_path.exists());
        assert_eq!(index.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_short_query_returns_no_hits() {
        let index = RwLock::new(SearchIndex::new(Vec::new()));
        let json = output(&search_impl(&index, SearchParams { query: "a".into(), limit: 5 }).await.unwrap());
        assert_eq!(json["hits"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let index = RwLock::new(SearchIndex::new(Vec::new()));
        let err = search_impl(&index, SearchParams { query: "loops".into(), limit: 0 }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
