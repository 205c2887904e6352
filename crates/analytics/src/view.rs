//! Popular-sellers read model.

use std::collections::HashMap;
use std::sync::Arc;

use common::{DormId, Money, UserId};
use tokio::sync::RwLock;

/// One seller's 30-day standing within a dorm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerRank {
    pub seller_id: UserId,
    pub order_count: u64,
    pub revenue: Money,
}

/// Per-dorm seller ranking, replaced wholesale on each refresh.
#[derive(Clone, Default)]
pub struct PopularSellersView {
    state: Arc<RwLock<HashMap<DormId, Vec<SellerRank>>>>,
}

impl PopularSellersView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top sellers for a dorm, at most ten entries.
    pub async fn top_sellers(&self, dorm_id: DormId) -> Vec<SellerRank> {
        let state = self.state.read().await;
        let mut ranks = state.get(&dorm_id).cloned().unwrap_or_default();
        ranks.truncate(10);
        ranks
    }

    /// Replaces a dorm's ranking. Input must already be sorted.
    pub(crate) async fn replace(&self, dorm_id: DormId, ranks: Vec<SellerRank>) {
        self.state.write().await.insert(dorm_id, ranks);
    }
}
