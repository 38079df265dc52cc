//! Offline page policy.
//!
//! The coordinator sits above the proxy: every page it fetches goes through
//! the response bucket first, and the page store is the second fallback.
//!
//! - A successful live render is written through with [`OfflineSyncCoordinator::record_view`].
//! - While offline, pages are rendered from the store with a banner.
//! - On reconnect every saved page is re-fetched; failures leave the
//!   previous payload in place.

mod fetcher;
mod task;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use fetcher::{FetchedPage, PageFetcher, SiteFetcher};
pub use task::{SyncHandle, spawn};

use crate::proxy::ResponseSource;
use klazz_core::content::Section;
use klazz_core::{Connectivity, ConnectivityMonitor, Error, PageId, PageRecord, PageStore};

pub const OFFLINE_BANNER: &str = "You are offline. Showing cached content.";
pub const UNAVAILABLE_MESSAGE: &str = "This page is not available offline yet.";

/// What to show for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageView {
    /// Fetched just now. `source` is `cache` when the network failed and the
    /// response bucket answered instead.
    Live { id: PageId, payload: String, source: ResponseSource },
    Cached { record: PageRecord, banner: String },
    Unavailable { id: PageId, message: String },
    /// The site answered while online but the page could not be served,
    /// e.g. a 404. The saved copy is not substituted.
    Failed { id: PageId, reason: String },
}

impl PageView {
    pub fn id(&self) -> &PageId {
        match self {
            PageView::Live { id, .. } | PageView::Unavailable { id, .. } | PageView::Failed { id, .. } => id,
            PageView::Cached { record, .. } => &record.id,
        }
    }

    /// The body to render, if there is one.
    pub fn payload(&self) -> Option<&str> {
        match self {
            PageView::Live { payload, .. } => Some(payload),
            PageView::Cached { record, .. } => Some(&record.payload),
            PageView::Unavailable { .. } | PageView::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub id: PageId,
    pub reason: String,
}

/// Aggregate result of a resync or download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub succeeded: Vec<PageId>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// One row of the offline dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStatus {
    pub id: PageId,
    pub title: String,
    pub saved: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct OfflineSyncCoordinator<S, F> {
    store: S,
    fetcher: F,
    monitor: Arc<ConnectivityMonitor>,
}

impl<S: PageStore, F: PageFetcher> OfflineSyncCoordinator<S, F> {
    pub fn new(store: S, fetcher: F, monitor: Arc<ConnectivityMonitor>) -> Self {
        Self { store, fetcher, monitor }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Persist a page that was just rendered.
    pub async fn record_view(&self, id: &PageId, payload: &str) -> Result<(), Error> {
        match self.store.save(id, payload).await {
            Ok(()) => {
                tracing::debug!(%id, bytes = payload.len(), "saved page for offline use");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "failed to save page for offline use");
                Err(e)
            }
        }
    }

    /// Load a page for display, preferring the live site.
    ///
    /// Only an unreachable network falls back to the saved copy. Any other
    /// fetch error while online yields [`PageView::Failed`].
    pub async fn open(&self, id: &PageId) -> PageView {
        if !self.monitor.is_online() {
            return self.offline_view(id).await;
        }

        match self.fetcher.fetch_page(id).await {
            Ok(page) => {
                // A bucket fallback is not a fresh render.
                if page.source == ResponseSource::Network {
                    let _ = self.record_view(id, &page.payload).await;
                }
                PageView::Live { id: id.clone(), payload: page.payload, source: page.source }
            }
            Err(e) if e.is_network() => {
                tracing::info!(%id, error = %e, "network unreachable; using saved copy");
                self.offline_view(id).await
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "live fetch failed");
                PageView::Failed { id: id.clone(), reason: e.to_string() }
            }
        }
    }

    /// Render from the store only.
    pub async fn offline_view(&self, id: &PageId) -> PageView {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%id, error = %e, "failed to read saved page");
                None
            }
        };

        match record {
            Some(record) => PageView::Cached { record, banner: OFFLINE_BANNER.to_string() },
            None => PageView::Unavailable { id: id.clone(), message: UNAVAILABLE_MESSAGE.to_string() },
        }
    }

    /// React to a connectivity change. Returns the resync report when the
    /// transition was to online.
    pub async fn handle_transition(&self, state: Connectivity) -> Option<SyncReport> {
        match state {
            Connectivity::Offline => {
                tracing::debug!("offline; rendering from saved pages");
                None
            }
            Connectivity::Online => Some(self.resync().await),
        }
    }

    /// Re-fetch every saved page.
    ///
    /// Only live responses overwrite the store. A page answered from the
    /// response bucket is reported as failed and keeps its saved payload.
    pub async fn resync(&self) -> SyncReport {
        let ids = match self.store.list_keys().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list saved pages; skipping resync");
                return SyncReport::default();
            }
        };

        let mut report = SyncReport::default();
        for id in ids {
            match self.refresh(&id, true).await {
                Ok(()) => report.succeeded.push(id),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "background refresh failed");
                    report.failed.push(SyncFailure { id, reason: e.to_string() });
                }
            }
        }

        tracing::info!(refreshed = report.succeeded.len(), failed = report.failed.len(), "resync finished");
        report
    }

    /// Fetch and save each chosen page. Already-saved pages are kept on failure.
    pub async fn download_selected(&self, ids: &[PageId]) -> SyncReport {
        let mut report = SyncReport::default();
        for id in ids {
            match self.refresh(id, false).await {
                Ok(()) => report.succeeded.push(id.clone()),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "download failed");
                    report.failed.push(SyncFailure { id: id.clone(), reason: e.to_string() });
                }
            }
        }

        tracing::info!(downloaded = report.succeeded.len(), failed = report.failed.len(), "download finished");
        report
    }

    pub async fn delete(&self, id: &PageId) -> Result<(), Error> {
        self.store.delete(id).await?;
        tracing::info!(%id, "removed saved page");
        Ok(())
    }

    /// Every saved record. Storage errors yield an empty list.
    pub async fn saved_pages(&self) -> Vec<PageRecord> {
        self.store.list_records().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to list saved pages");
            Vec::new()
        })
    }

    /// Saved state of each table-of-contents section under `prefix`
    /// (a language, or `language/track`).
    pub async fn dashboard(&self, prefix: &str, sections: &[Section]) -> Vec<TopicStatus> {
        let saved: HashMap<PageId, DateTime<Utc>> =
            self.saved_pages().await.into_iter().map(|r| (r.id, r.updated_at)).collect();

        sections
            .iter()
            .filter_map(|section| {
                let id = match PageId::new(prefix, &section.slug()) {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::debug!(title = %section.title, error = %e, "section has no page id");
                        return None;
                    }
                };
                let updated_at = saved.get(&id).copied();
                Some(TopicStatus { id, title: section.title.clone(), saved: updated_at.is_some(), updated_at })
            })
            .collect()
    }

    async fn refresh(&self, id: &PageId, require_live: bool) -> Result<(), Error> {
        let page = self.fetcher.fetch_page(id).await?;
        if require_live && page.source == ResponseSource::Cache {
            return Err(Error::Network(format!("{id} was only available from the response cache")));
        }
        self.store.save(id, &page.payload).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenStore, FakeFetcher};
    use super::*;
    use klazz_core::CacheDb;

    fn id(raw: &str) -> PageId {
        PageId::parse(raw).unwrap()
    }

    async fn coordinator(fetcher: FakeFetcher, state: Connectivity) -> OfflineSyncCoordinator<CacheDb, FakeFetcher> {
        let db = CacheDb::open_in_memory().await.unwrap();
        OfflineSyncCoordinator::new(db, fetcher, Arc::new(ConnectivityMonitor::new(state)))
    }

    #[tokio::test]
    async fn test_offline_without_record_shows_placeholder() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Offline).await;

        let view = sync.open(&id("python/intro")).await;
        assert_eq!(
            view,
            PageView::Unavailable { id: id("python/intro"), message: "This page is not available offline yet.".into() }
        );
        assert!(view.payload().is_none());
        assert!(sync.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offline_renders_saved_page_with_banner() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Offline).await;
        sync.record_view(&id("javascript/intro"), "# Intro").await.unwrap();

        match sync.open(&id("javascript/intro")).await {
            PageView::Cached { record, banner } => {
                assert_eq!(record.payload, "# Intro");
                assert_eq!(banner, "You are offline. Showing cached content.");
            }
            other => panic!("expected cached view, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_online_open_writes_through() {
        let fetcher = FakeFetcher::default().with_page("rust/ownership", "# Ownership");
        let sync = coordinator(fetcher, Connectivity::Online).await;

        let view = sync.open(&id("rust/ownership")).await;
        assert_eq!(
            view,
            PageView::Live { id: id("rust/ownership"), payload: "# Ownership".into(), source: ResponseSource::Network }
        );

        let saved = sync.store().get(&id("rust/ownership")).await.unwrap().unwrap();
        assert_eq!(saved.payload, "# Ownership");
    }

    #[tokio::test]
    async fn test_online_fetch_failure_falls_back_to_store() {
        let fetcher = FakeFetcher::default();
        fetcher.fail("go/intro");
        let sync = coordinator(fetcher, Connectivity::Online).await;
        sync.record_view(&id("go/intro"), "# Go").await.unwrap();

        let view = sync.open(&id("go/intro")).await;
        assert!(matches!(view, PageView::Cached { .. }));
        assert_eq!(view.payload(), Some("# Go"));
    }

    #[tokio::test]
    async fn test_online_http_error_does_not_show_saved_copy() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Online).await;
        sync.record_view(&id("rust/gone"), "# old").await.unwrap();

        match sync.open(&id("rust/gone")).await {
            PageView::Failed { id: failed, reason } => {
                assert_eq!(failed, id("rust/gone"));
                assert!(reason.contains("404"));
            }
            other => panic!("expected failed view, got {other:?}"),
        }
        assert!(matches!(sync.open(&id("rust/missing")).await, PageView::Failed { .. }));

        // The saved copy is untouched.
        assert_eq!(sync.store().get(&id("rust/gone")).await.unwrap().unwrap().payload, "# old");
    }

    #[tokio::test]
    async fn test_bucket_fallback_is_not_written_through() {
        let fetcher = FakeFetcher::default().with_page("rust/intro", "# stale");
        fetcher.serve_from_cache("rust/intro");
        let sync = coordinator(fetcher, Connectivity::Online).await;

        let view = sync.open(&id("rust/intro")).await;
        assert!(matches!(view, PageView::Live { source: ResponseSource::Cache, .. }));
        assert!(sync.store().get(&id("rust/intro")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resync_keeps_failed_entries() {
        let fetcher = FakeFetcher::default()
            .with_page("rust/intro", "# Intro v2")
            .with_page("rust/traits", "# Traits v2");
        let sync = coordinator(fetcher, Connectivity::Online).await;

        sync.record_view(&id("rust/intro"), "# Intro v1").await.unwrap();
        sync.record_view(&id("rust/traits"), "# Traits v1").await.unwrap();
        sync.record_view(&id("rust/macros"), "# Macros v1").await.unwrap();
        sync.fetcher.fail("rust/traits");

        let report = sync.handle_transition(Connectivity::Online).await.unwrap();

        assert_eq!(report.succeeded, vec![id("rust/intro")]);
        assert_eq!(report.attempted(), 3);
        assert!(!report.is_complete());
        let failed: Vec<&PageId> = report.failed.iter().map(|f| &f.id).collect();
        assert_eq!(failed, vec![&id("rust/macros"), &id("rust/traits")]);

        let store = sync.store();
        assert_eq!(store.get(&id("rust/intro")).await.unwrap().unwrap().payload, "# Intro v2");
        assert_eq!(store.get(&id("rust/traits")).await.unwrap().unwrap().payload, "# Traits v1");
        assert_eq!(store.get(&id("rust/macros")).await.unwrap().unwrap().payload, "# Macros v1");
    }

    #[tokio::test]
    async fn test_resync_ignores_cache_served_pages() {
        let fetcher = FakeFetcher::default().with_page("rust/intro", "# bucket copy");
        fetcher.serve_from_cache("rust/intro");
        let sync = coordinator(fetcher, Connectivity::Online).await;
        sync.record_view(&id("rust/intro"), "# saved").await.unwrap();

        let report = sync.resync().await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(sync.store().get(&id("rust/intro")).await.unwrap().unwrap().payload, "# saved");
    }

    #[tokio::test]
    async fn test_offline_transition_does_nothing() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Online).await;
        sync.record_view(&id("rust/intro"), "# Intro").await.unwrap();

        assert!(sync.handle_transition(Connectivity::Offline).await.is_none());
        assert!(sync.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_download_selected_reports_each_item() {
        let fetcher = FakeFetcher::default()
            .with_page("python/intro", "# Intro")
            .with_page("python/loops", "# Loops");
        fetcher.fail("python/loops");
        let sync = coordinator(fetcher, Connectivity::Online).await;

        let report = sync
            .download_selected(&[id("python/intro"), id("python/loops"), id("python/missing")])
            .await;

        assert_eq!(report.succeeded, vec![id("python/intro")]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[1].reason.contains("404"));
        assert_eq!(sync.store().list_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_download_empty_selection() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Online).await;
        let report = sync.download_selected(&[]).await;
        assert_eq!(report, SyncReport::default());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_delete_then_offline_is_unavailable() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Offline).await;
        sync.record_view(&id("rust/intro"), "# Intro").await.unwrap();

        sync.delete(&id("rust/intro")).await.unwrap();
        sync.delete(&id("rust/intro")).await.unwrap();

        assert!(matches!(sync.offline_view(&id("rust/intro")).await, PageView::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_dashboard_marks_saved_sections() {
        let sync = coordinator(FakeFetcher::default(), Connectivity::Online).await;
        sync.record_view(&id("javascript/getting-started"), "# Start").await.unwrap();

        let sections = vec![
            Section { title: "Getting Started".into(), content: "- intro".into() },
            Section { title: "Async Await".into(), content: "- promises".into() },
            Section { title: "!!!".into(), content: "- nothing".into() },
        ];
        let rows = sync.dashboard("javascript", &sections).await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, id("javascript/getting-started"));
        assert!(rows[0].saved);
        assert!(rows[0].updated_at.is_some());
        assert_eq!(rows[1].id, id("javascript/async-await"));
        assert!(!rows[1].saved);
        assert!(rows[1].updated_at.is_none());
    }

    #[tokio::test]
    async fn test_storage_failures_are_contained() {
        let fetcher = FakeFetcher::default().with_page("rust/intro", "# Intro");
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Online));
        let sync = OfflineSyncCoordinator::new(BrokenStore, fetcher, monitor.clone());

        // Rendering still succeeds even though the save fails.
        let view = sync.open(&id("rust/intro")).await;
        assert_eq!(view.payload(), Some("# Intro"));
        assert!(sync.record_view(&id("rust/intro"), "# Intro").await.is_err());

        monitor.set(Connectivity::Offline);
        assert!(matches!(sync.open(&id("rust/intro")).await, PageView::Unavailable { .. }));

        assert_eq!(sync.resync().await, SyncReport::default());
        assert!(sync.saved_pages().await.is_empty());
        assert!(sync.delete(&id("rust/intro")).await.unwrap_err().is_storage());
    }

    #[tokio::test]
    async fn test_site_chain_falls_back_through_bucket_then_store() {
        use crate::proxy::NetworkCacheProxy;
        use crate::proxy::testing::FakeTransport;
        use reqwest::Url;

        let db = CacheDb::open_in_memory().await.unwrap();
        let proxy = Arc::new(NetworkCacheProxy::new(FakeTransport::new("# Live intro"), db.clone(), "klazz-v1"));
        let fetcher = SiteFetcher::new(Arc::clone(&proxy), Url::parse("http://klazz.test").unwrap(), "/language");
        let sync = OfflineSyncCoordinator::new(db, fetcher, Arc::new(ConnectivityMonitor::new(Connectivity::Online)));

        sync.record_view(&id("rust/saved"), "# Saved copy").await.unwrap();
        sync.open(&id("rust/intro")).await;

        proxy.transport().set_online(false);

        // Bucket hit for a page fetched earlier.
        let view = sync.open(&id("rust/intro")).await;
        assert_eq!(
            view,
            PageView::Live { id: id("rust/intro"), payload: "# Live intro".into(), source: ResponseSource::Cache }
        );

        // Empty bucket for this URL, saved record in the store.
        match sync.open(&id("rust/saved")).await {
            PageView::Cached { record, banner } => {
                assert_eq!(record.payload, "# Saved copy");
                assert_eq!(banner, OFFLINE_BANNER);
            }
            other => panic!("expected cached view, got {other:?}"),
        }

        assert!(matches!(sync.open(&id("rust/never")).await, PageView::Unavailable { .. }));
    }

    #[test]
    fn test_page_view_serializes_status_tag() {
        let view = PageView::Unavailable { id: id("rust/intro"), message: UNAVAILABLE_MESSAGE.into() };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["id"], "rust/intro");
    }
}
