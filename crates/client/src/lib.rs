//! Client code for klazz-offline.
//!
//! This crate provides the HTTP fetch pipeline, the network-first caching
//! proxy, and the offline sync coordinator used by the server.

pub mod fetch;
pub mod proxy;
pub mod sync;

pub use fetch::{FetchClient, FetchConfig, FetchRequest, FetchResponse};
pub use proxy::{InstallReport, NetworkCacheProxy, ProxyResponse, ResponseSource, Transport};
pub use sync::{
    FetchedPage, OFFLINE_BANNER, OfflineSyncCoordinator, PageFetcher, PageView, SiteFetcher, SyncFailure, SyncHandle,
    SyncReport, TopicStatus, UNAVAILABLE_MESSAGE,
};
