//! Shared server state and startup wiring.

use std::path::Path;
use std::sync::Arc;

use klazz_client::fetch::{canonicalize, site_url};
use klazz_client::sync::{self, SyncHandle};
use klazz_client::{
    FetchClient, FetchConfig, InstallReport, NetworkCacheProxy, OfflineSyncCoordinator, SiteFetcher,
};
use klazz_core::content::{SearchIndex, precache_paths};
use klazz_core::{AppConfig, CacheDb, Connectivity, ConnectivityMonitor, Error};
use tokio::sync::RwLock;
use url::Url;

pub type SiteProxy = NetworkCacheProxy<FetchClient>;
pub type SiteSync = OfflineSyncCoordinator<CacheDb, SiteFetcher<FetchClient>>;

pub struct AppState {
    pub config: AppConfig,
    pub proxy: Arc<SiteProxy>,
    pub sync: Arc<SiteSync>,
    pub search: RwLock<SearchIndex>,
    _background: SyncHandle,
}

impl AppState {
    /// Open the store, warm and activate the response bucket, and start the
    /// background sync task. Must be called inside a tokio runtime.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        let base_url = canonicalize(&config.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let client = FetchClient::new(FetchConfig::from_app_config(&config))?;
        let proxy = Arc::new(NetworkCacheProxy::new(client, db.clone(), config.cache_version.clone()));

        let previous = db.active_bucket().await?;
        let report = if previous.as_deref() != Some(proxy.bucket()) && !config.start_offline {
            let urls = precache_urls(&base_url, &config.content_dir, &config.route_prefix);
            Some(proxy.install(&urls).await)
        } else {
            None
        };

        let root = site_url(&base_url, "/").map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if should_activate(previous.as_deref(), proxy.bucket(), report.as_ref(), &root) {
            proxy.activate().await?;
        } else {
            tracing::warn!(
                bucket = %proxy.bucket(),
                previous = previous.as_deref().unwrap_or_default(),
                "site root was not cached; keeping the previous response bucket"
            );
        }

        let initial = if config.start_offline { Connectivity::Offline } else { Connectivity::Online };
        let monitor = Arc::new(ConnectivityMonitor::new(initial));

        let fetcher = SiteFetcher::new(Arc::clone(&proxy), base_url, config.route_prefix.clone());
        let coordinator = Arc::new(OfflineSyncCoordinator::new(db, fetcher, monitor));
        let background = sync::spawn(Arc::clone(&coordinator), config.resync_interval());

        let search = match SearchIndex::from_file(&config.search_index_path) {
            Ok(index) => {
                tracing::info!(entries = index.len(), "loaded search index");
                index
            }
            Err(e) => {
                tracing::warn!(error = %e, "search index unavailable; starting empty");
                SearchIndex::new(Vec::new())
            }
        };

        Ok(Self { config, proxy, sync: coordinator, search: RwLock::new(search), _background: background })
    }
}

/// A new bucket replaces the previous one only once the site root is in it.
/// With no previous bucket there is nothing to lose, so it always activates.
fn should_activate(previous: Option<&str>, bucket: &str, report: Option<&InstallReport>, root: &Url) -> bool {
    match previous {
        None => true,
        Some(active) if active == bucket => true,
        Some(_) => report.is_some_and(|r| r.cached.iter().any(|url| url == root.as_str())),
    }
}

/// Absolute URLs to warm into a new bucket. Unreadable content trees fall
/// back to just the site root.
pub fn precache_urls(base: &Url, content_dir: &Path, route_prefix: &str) -> Vec<Url> {
    let paths = precache_paths(content_dir, route_prefix).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to list pages to pre-cache");
        vec!["/".to_string()]
    });

    paths
        .iter()
        .filter_map(|path| match site_url(base, path) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "skipping pre-cache path");
                None
            }
        })
        .collect()
}
