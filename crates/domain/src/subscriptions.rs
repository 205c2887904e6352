//! Subscription gate for sellers.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{PlanId, UserId};
use store::MarketStore;
use store::records::{SellerSubscription, SubscriptionPlan};

use crate::bus::EventBus;
use crate::error::DomainError;
use crate::event::MarketEvent;

/// Snapshot of a seller's subscription state.
#[derive(Debug, Clone)]
pub struct SubscriptionStatus {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub plan: Option<SubscriptionPlan>,
    pub slots_in_use: u64,
}

/// Expiry-based subscription checks and activation.
pub struct SubscriptionService<S> {
    store: Arc<S>,
    bus: EventBus,
}

impl<S> Clone for SubscriptionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<S: MarketStore> SubscriptionService<S> {
    pub fn new(store: Arc<S>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// A subscription is active while its expiry lies in the future.
    pub async fn has_active_subscription(&self, seller_id: UserId) -> Result<bool, DomainError> {
        Ok(self
            .store
            .active_subscription(seller_id, Utc::now())
            .await?
            .is_some())
    }

    /// Starts a subscription on the given plan, expiring after the plan's
    /// duration.
    #[tracing::instrument(skip(self))]
    pub async fn start_subscription(
        &self,
        seller_id: UserId,
        plan_id: PlanId,
    ) -> Result<SellerSubscription, DomainError> {
        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "plan",
                id: plan_id.to_string(),
            })?;

        let now = Utc::now();
        let subscription = SellerSubscription {
            seller_id,
            plan_id,
            expires_at: now + Duration::days(i64::from(plan.duration_days)),
            created_at: now,
        };
        self.store.insert_subscription(subscription.clone()).await?;
        self.store
            .upsert_usage(seller_id, plan.max_products)
            .await?;

        self.bus
            .publish(MarketEvent::SubscriptionActivated { seller_id, plan_id });
        tracing::info!(%seller_id, plan = %plan.name, expires_at = %subscription.expires_at, "subscription activated");
        Ok(subscription)
    }

    pub async fn subscription_status(
        &self,
        seller_id: UserId,
    ) -> Result<SubscriptionStatus, DomainError> {
        let active = self.store.active_subscription(seller_id, Utc::now()).await?;
        let plan = match &active {
            Some(subscription) => self.store.get_plan(subscription.plan_id).await?,
            None => None,
        };
        let slots_in_use = self.store.count_active_products(seller_id).await?;

        Ok(SubscriptionStatus {
            active: active.is_some(),
            expires_at: active.map(|s| s.expires_at),
            plan,
            slots_in_use,
        })
    }

    /// Records the seller's current active product count.
    pub async fn update_usage(&self, seller_id: UserId) -> Result<(), DomainError> {
        let count = self.store.count_active_products(seller_id).await?;
        self.store
            .upsert_usage(seller_id, u32::try_from(count).unwrap_or(u32::MAX))
            .await?;
        Ok(())
    }
}
