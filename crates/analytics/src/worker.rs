//! Background refresh worker.

use std::sync::Arc;

use common::DormId;
use domain::TaskRunner;
use store::MarketStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::service::AnalyticsService;
use crate::view::PopularSellersView;

/// Handle to a spawned refresh loop.
///
/// Implements [`TaskRunner`] so the order workflow can request refreshes
/// without depending on this crate's internals. Dropping the handle closes
/// the queue and stops the loop.
pub struct AnalyticsWorker {
    sender: mpsc::UnboundedSender<DormId>,
    handle: JoinHandle<()>,
}

impl AnalyticsWorker {
    /// Spawns the refresh loop over the given store and view.
    pub fn spawn<S: MarketStore + 'static>(store: Arc<S>, view: PopularSellersView) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<DormId>();
        let service = AnalyticsService::new(store, view);

        let handle = tokio::spawn(async move {
            while let Some(dorm_id) = receiver.recv().await {
                if let Err(e) = service.refresh_popular_sellers(dorm_id).await {
                    tracing::error!(%dorm_id, error = %e, "popular sellers refresh failed");
                }
            }
            tracing::debug!("analytics worker stopped");
        });

        Self { sender, handle }
    }

    /// Waits for the loop to finish after all senders are gone.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

impl TaskRunner for AnalyticsWorker {
    fn refresh_popular_sellers(&self, dorm_id: DormId) {
        if self.sender.send(dorm_id).is_err() {
            tracing::warn!(%dorm_id, "analytics queue closed, refresh dropped");
        }
    }
}
