//! Background task reacting to connectivity changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{OfflineSyncCoordinator, PageFetcher};
use klazz_core::PageStore;

/// Owner of the background task. Dropping it stops the task.
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start observing the coordinator's monitor.
///
/// Each transition is handled on its own detached task, so aborting the
/// handle never interrupts a resync that is already saving pages. With a
/// `heartbeat`, saved pages are also refreshed on that period while online.
pub fn spawn<S, F>(coordinator: Arc<OfflineSyncCoordinator<S, F>>, heartbeat: Option<Duration>) -> SyncHandle
where
    S: PageStore + 'static,
    F: PageFetcher + 'static,
{
    let mut subscription = coordinator.monitor().subscribe();

    let task = tokio::spawn(async move {
        let mut ticker = heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                changed = subscription.changed() => {
                    let Some(state) = changed else {
                        tracing::debug!("connectivity monitor closed; stopping sync task");
                        break;
                    };
                    let coordinator = Arc::clone(&coordinator);
                    tokio::spawn(async move {
                        coordinator.handle_transition(state).await;
                    });
                }
                _ = tick(&mut ticker) => {
                    if coordinator.monitor().is_online() {
                        tracing::debug!("heartbeat resync");
                        let coordinator = Arc::clone(&coordinator);
                        tokio::spawn(async move {
                            coordinator.resync().await;
                        });
                    }
                }
            }
        }
    });

    SyncHandle { task }
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
