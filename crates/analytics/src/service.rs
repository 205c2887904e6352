//! Popular-sellers recomputation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{DormId, Money, OrderStatus, UserId};
use store::{MarketStore, StoreError};

use crate::view::{PopularSellersView, SellerRank};

/// Window of orders considered for the ranking.
const WINDOW_DAYS: i64 = 30;

/// Recomputes per-dorm seller rankings from approved orders.
pub struct AnalyticsService<S> {
    store: Arc<S>,
    view: PopularSellersView,
}

impl<S: MarketStore> AnalyticsService<S> {
    pub fn new(store: Arc<S>, view: PopularSellersView) -> Self {
        Self { store, view }
    }

    pub fn view(&self) -> &PopularSellersView {
        &self.view
    }

    /// Rebuilds one dorm's ranking: approved orders from the last 30 days,
    /// aggregated per seller and sorted by revenue descending.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_popular_sellers(&self, dorm_id: DormId) -> Result<(), StoreError> {
        let since = Utc::now() - Duration::days(WINDOW_DAYS);
        let orders = self.store.orders_for_dorm_since(dorm_id, since).await?;

        let mut per_seller: HashMap<UserId, (u64, Money)> = HashMap::new();
        for order in orders {
            if order.status != OrderStatus::Onay {
                continue;
            }
            let entry = per_seller.entry(order.seller_id).or_insert((0, Money::zero()));
            entry.0 += 1;
            entry.1 += order.total_amount;
        }

        let mut ranks: Vec<SellerRank> = per_seller
            .into_iter()
            .map(|(seller_id, (order_count, revenue))| SellerRank {
                seller_id,
                order_count,
                revenue,
            })
            .collect();
        ranks.sort_by(|a, b| b.revenue.cents().cmp(&a.revenue.cents()));

        metrics::counter!("analytics_refreshes").increment(1);
        tracing::debug!(%dorm_id, sellers = ranks.len(), "popular sellers refreshed");
        self.view.replace(dorm_id, ranks).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{DeliveryType, PaymentMethod, Role};
    use store::records::{Category, Dorm, Product, User};
    use store::{InMemoryStore, NewOrder, NewOrderItem, StatusLogEntry};

    use super::*;

    struct Seeded {
        store: Arc<InMemoryStore>,
        dorm: Dorm,
        customer: User,
    }

    async fn seed() -> Seeded {
        let store = Arc::new(InMemoryStore::new());
        let dorm = Dorm::new("North Hall");
        store.insert_dorm(dorm.clone()).await.unwrap();
        let customer = User::new("customer@campus.edu", Role::Student, Some(dorm.id));
        store.insert_user(customer.clone()).await.unwrap();
        Seeded {
            store,
            dorm,
            customer,
        }
    }

    /// Places an order of the given total for a fresh seller and returns
    /// the seller id and order id.
    async fn order_for_new_seller(
        seeded: &Seeded,
        email: &str,
        cents: i64,
    ) -> (UserId, common::OrderId) {
        let seller = User::new(email, Role::Seller, Some(seeded.dorm.id));
        seeded.store.insert_user(seller.clone()).await.unwrap();
        let category = Category::new(seeded.dorm.id, email, email);
        seeded.store.insert_category(category.clone()).await.unwrap();
        let product = Product::new(
            seller.id,
            seeded.dorm.id,
            category.id,
            "Item",
            Money::from_cents(cents),
        );
        seeded.store.insert_product(product.clone(), 100).await.unwrap();

        let created = seeded
            .store
            .create_order(NewOrder {
                customer_id: seeded.customer.id,
                seller_id: seller.id,
                dorm_id: seeded.dorm.id,
                notes: String::new(),
                payment_method: PaymentMethod::CashOnDelivery,
                delivery_type: DeliveryType::CustomerPickup,
                delivery_address: String::new(),
                delivery_phone: String::new(),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    quantity: 1,
                    unit_price: product.price,
                }],
            })
            .await
            .unwrap();
        (seller.id, created.order.id)
    }

    async fn approve(store: &InMemoryStore, order_id: common::OrderId) {
        store
            .update_order_status(
                order_id,
                OrderStatus::Onay,
                StatusLogEntry {
                    status: OrderStatus::Onay,
                    changed_by: None,
                    note: String::new(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ranks_approved_orders_by_revenue() {
        let seeded = seed().await;
        let (small_seller, small_order) =
            order_for_new_seller(&seeded, "small@campus.edu", 100).await;
        let (big_seller, big_order) = order_for_new_seller(&seeded, "big@campus.edu", 900).await;
        approve(&seeded.store, small_order).await;
        approve(&seeded.store, big_order).await;

        let service = AnalyticsService::new(seeded.store.clone(), PopularSellersView::new());
        service.refresh_popular_sellers(seeded.dorm.id).await.unwrap();

        let ranks = service.view().top_sellers(seeded.dorm.id).await;
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[0].seller_id, big_seller);
        assert_eq!(ranks[0].revenue, Money::from_cents(900));
        assert_eq!(ranks[1].seller_id, small_seller);
        assert_eq!(ranks[1].order_count, 1);
    }

    #[tokio::test]
    async fn pending_orders_do_not_count() {
        let seeded = seed().await;
        order_for_new_seller(&seeded, "pending@campus.edu", 500).await;

        let service = AnalyticsService::new(seeded.store.clone(), PopularSellersView::new());
        service.refresh_popular_sellers(seeded.dorm.id).await.unwrap();

        assert!(service.view().top_sellers(seeded.dorm.id).await.is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_previous_ranking() {
        let seeded = seed().await;
        let (seller, order) = order_for_new_seller(&seeded, "seller@campus.edu", 500).await;
        approve(&seeded.store, order).await;

        let service = AnalyticsService::new(seeded.store.clone(), PopularSellersView::new());
        service.refresh_popular_sellers(seeded.dorm.id).await.unwrap();
        assert_eq!(service.view().top_sellers(seeded.dorm.id).await.len(), 1);

        // Cancelling the only order empties the ranking on the next pass.
        seeded
            .store
            .update_order_status(
                order,
                OrderStatus::Iptal,
                StatusLogEntry {
                    status: OrderStatus::Iptal,
                    changed_by: Some(seller),
                    note: String::new(),
                },
            )
            .await
            .unwrap();
        service.refresh_popular_sellers(seeded.dorm.id).await.unwrap();
        assert!(service.view().top_sellers(seeded.dorm.id).await.is_empty());
    }
}
