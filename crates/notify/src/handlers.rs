//! Event handlers.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainError, EventEnvelope, EventHandler, MarketEvent};
use store::MarketStore;

use crate::mailer::Mailer;

/// Emails the seller when an order lands in their store.
///
/// The recipient is the profile's notification address when set,
/// otherwise the seller's account email.
pub struct OrderCreatedNotifier<S> {
    store: Arc<S>,
    mailer: Arc<dyn Mailer>,
}

impl<S: MarketStore> OrderCreatedNotifier<S> {
    pub fn new(store: Arc<S>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    async fn recipient(&self, seller_id: common::UserId) -> Result<Option<String>, DomainError> {
        let profile = self.store.get_seller_profile(seller_id).await?;
        if let Some(profile) = profile
            && let Some(email) = profile.notification_email
        {
            return Ok(Some(email));
        }
        Ok(self.store.get_user(seller_id).await?.map(|user| user.email))
    }
}

#[async_trait]
impl<S: MarketStore> EventHandler for OrderCreatedNotifier<S> {
    fn name(&self) -> &'static str {
        "order_created_notifier"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), DomainError> {
        let MarketEvent::OrderCreated {
            order_id,
            seller_id,
            ..
        } = &envelope.event
        else {
            return Ok(());
        };

        let Some(recipient) = self.recipient(*seller_id).await? else {
            tracing::warn!(%seller_id, "no recipient for order notification");
            return Ok(());
        };

        let body = format!("You have a new order: {order_id}");
        if let Err(e) = self
            .mailer
            .send(&recipient, "You have a new order", &body)
            .await
        {
            // Delivery is best-effort; the order itself already committed.
            tracing::error!(%order_id, error = %e, "order notification failed");
        } else {
            metrics::counter!("notifications_sent").increment(1);
        }
        Ok(())
    }
}

/// Logs stock movements and out-of-stock flips.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLogHandler;

#[async_trait]
impl EventHandler for StockLogHandler {
    fn name(&self) -> &'static str {
        "stock_log"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), DomainError> {
        match &envelope.event {
            MarketEvent::StockDecreased {
                product_id,
                quantity,
                remaining,
            } => {
                tracing::info!(%product_id, quantity, remaining, "stock decreased");
            }
            MarketEvent::ProductOutOfStock { product_id } => {
                tracing::warn!(%product_id, "product out of stock");
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use common::{OrderId, ProductId, Role, UserId};
    use domain::EventBus;
    use store::InMemoryStore;
    use store::records::{Dorm, SellerProfile, User};

    use super::*;
    use crate::mailer::MailError;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Delivery("smtp down".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    async fn seeded_seller(store: &InMemoryStore, notification_email: Option<&str>) -> UserId {
        let dorm = Dorm::new("North Hall");
        store.insert_dorm(dorm.clone()).await.unwrap();
        let seller = User::new("seller@campus.edu", Role::Seller, Some(dorm.id));
        store.insert_user(seller.clone()).await.unwrap();
        let mut profile = SellerProfile::new(seller.id, dorm.id, "5550002");
        profile.notification_email = notification_email.map(String::from);
        store.upsert_seller_profile(profile).await.unwrap();
        seller.id
    }

    fn order_created(seller_id: UserId) -> MarketEvent {
        MarketEvent::OrderCreated {
            order_id: OrderId::new(),
            seller_id,
            customer_id: UserId::new(),
        }
    }

    #[tokio::test]
    async fn prefers_the_profile_notification_address() {
        let store = Arc::new(InMemoryStore::new());
        let seller_id = seeded_seller(&store, Some("orders@shop.example")).await;
        let mailer = Arc::new(RecordingMailer::default());

        let (bus, mut worker) = EventBus::channel();
        worker.subscribe(
            "order_created",
            Arc::new(OrderCreatedNotifier::new(store, mailer.clone())),
        );
        bus.publish(order_created(seller_id));
        worker.run_until_idle().await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders@shop.example");
    }

    #[tokio::test]
    async fn falls_back_to_the_account_email() {
        let store = Arc::new(InMemoryStore::new());
        let seller_id = seeded_seller(&store, None).await;
        let mailer = Arc::new(RecordingMailer::default());

        let (bus, mut worker) = EventBus::channel();
        worker.subscribe(
            "order_created",
            Arc::new(OrderCreatedNotifier::new(store, mailer.clone())),
        );
        bus.publish(order_created(seller_id));
        worker.run_until_idle().await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].0, "seller@campus.edu");
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let store = Arc::new(InMemoryStore::new());
        let seller_id = seeded_seller(&store, None).await;
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });

        let notifier = OrderCreatedNotifier::new(store, mailer);
        let envelope = EventEnvelope::new(order_created(seller_id));
        assert!(notifier.handle(&envelope).await.is_ok());
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = OrderCreatedNotifier::new(store, mailer.clone());

        let envelope = EventEnvelope::new(MarketEvent::ProductOutOfStock {
            product_id: ProductId::new(),
        });
        notifier.handle(&envelope).await.unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stock_log_handler_accepts_all_stock_events() {
        let handler = StockLogHandler;
        let envelope = EventEnvelope::new(MarketEvent::StockDecreased {
            product_id: ProductId::new(),
            quantity: 1,
            remaining: 0,
        });
        handler.handle(&envelope).await.unwrap();
    }
}
