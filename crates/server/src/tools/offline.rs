//! Offline management tools.
//!
//! Download, delete and inspect saved pages, flip the connectivity state,
//! and trigger a resync by hand.

use std::path::Path;

use chrono::{DateTime, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{json_result, parse_ids};
use klazz_client::{OfflineSyncCoordinator, PageFetcher, TopicStatus};
use klazz_core::content::load_toc;
use klazz_core::{CacheDb, Connectivity, Error, PageId, PageStore};

/// Input parameters for offline_download tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineDownloadParams {
    /// Page ids to fetch and save, e.g. `["python/intro", "python/loops"]`.
    pub ids: Vec<String>,
}

/// Input parameters for offline_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineDeleteParams {
    pub id: String,
}

/// Input parameters for offline_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OfflineStatusParams {
    /// Language whose table of contents should be checked against the store.
    #[serde(default)]
    pub language: Option<String>,
}

/// Input parameters for connectivity_set tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectivitySetParams {
    pub online: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedPage {
    pub id: PageId,
    pub updated_at: DateTime<Utc>,
    pub bytes: usize,
}

/// Output structure for offline_status tool.
#[derive(Debug, Clone, Serialize)]
pub struct OfflineStatusOutput {
    pub connectivity: Connectivity,
    /// The response bucket currently served from.
    pub bucket: String,
    /// Every bucket ever activated, newest first.
    pub buckets: Vec<String>,
    pub saved: Vec<SavedPage>,
    /// Per-section saved state, when a language was given.
    pub topics: Option<Vec<TopicStatus>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivitySetOutput {
    pub state: Connectivity,
    /// False when the state was already the requested one.
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineDeleteOutput {
    pub id: PageId,
    pub deleted: bool,
}

/// Implementation of the offline_download tool.
pub async fn download_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>, params: OfflineDownloadParams,
) -> Result<CallToolResult, McpError> {
    if params.ids.is_empty() {
        return Err(Error::InvalidInput("ids cannot be empty".into()).into());
    }
    let ids = parse_ids(&params.ids)?;

    let report = sync.download_selected(&ids).await;
    json_result(&report)
}

/// Implementation of the offline_delete tool.
pub async fn delete_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>, params: OfflineDeleteParams,
) -> Result<CallToolResult, McpError> {
    let id = PageId::parse(&params.id)?;
    sync.delete(&id).await?;
    json_result(&OfflineDeleteOutput { id, deleted: true })
}

/// Implementation of the offline_status tool.
pub async fn status_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>, db: &CacheDb, bucket: String, content_dir: &Path,
    params: OfflineStatusParams,
) -> Result<CallToolResult, McpError> {
    let buckets = db.list_buckets().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to list response buckets");
        Vec::new()
    });

    let saved = sync
        .saved_pages()
        .await
        .into_iter()
        .map(|r| SavedPage { bytes: r.payload.len(), id: r.id, updated_at: r.updated_at })
        .collect();

    let topics = match params.language.as_deref() {
        Some(language) => {
            let toc = load_toc(content_dir, language)?;
            Some(sync.dashboard(language, &toc.sections).await)
        }
        None => None,
    };

    json_result(&OfflineStatusOutput { connectivity: sync.monitor().state(), bucket, buckets, saved, topics })
}

/// Implementation of the connectivity_set tool.
///
/// The background sync task reacts to the change; this only flips the state.
pub fn connectivity_set_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>, params: ConnectivitySetParams,
) -> Result<CallToolResult, McpError> {
    let state = Connectivity::from(params.online);
    let changed = sync.monitor().set(state);
    json_result(&ConnectivitySetOutput { state, changed })
}

/// Implementation of the offline_resync tool.
pub async fn resync_impl<S: PageStore, F: PageFetcher>(
    sync: &OfflineSyncCoordinator<S, F>,
) -> Result<CallToolResult, McpError> {
    if !sync.monitor().is_online() {
        return Err(Error::Network("offline; saved pages refresh on reconnect".into()).into());
    }
    let report = sync.resync().await;
    json_result(&report)
}
