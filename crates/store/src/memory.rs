use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, DormId, OrderId, OrderStatus, PlanId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::records::{
    Category, ChatMessage, Dorm, Order, OrderItem, OrderStatusLog, Product, SellerProfile,
    SellerSubscription, SubscriptionPlan, UsageTracking, User,
};
use crate::store::{
    CreatedOrder, MarketStore, NewOrder, StatusLogEntry, StockDecrement,
};

#[derive(Default)]
struct Inner {
    dorms: HashMap<DormId, Dorm>,
    users: HashMap<UserId, User>,
    profiles: HashMap<UserId, SellerProfile>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    stocks: HashMap<ProductId, u32>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
    status_logs: HashMap<OrderId, Vec<OrderStatusLog>>,
    chats: HashMap<OrderId, Vec<ChatMessage>>,
    plans: HashMap<PlanId, SubscriptionPlan>,
    subscriptions: HashMap<UserId, Vec<SellerSubscription>>,
    usage: HashMap<UserId, UsageTracking>,
}

/// In-memory market store for tests and local runs.
///
/// Atomicity comes from the single write lock: every multi-step operation
/// validates fully before mutating, so a failure never leaves partial
/// writes behind.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }
}

/// Applies one decrement against a working copy of the stock map.
fn decrement_in(
    stocks: &mut HashMap<ProductId, u32>,
    product_id: ProductId,
    amount: u32,
) -> Result<StockDecrement> {
    if amount == 0 {
        return Err(StoreError::InvalidAmount { amount });
    }
    let quantity = stocks
        .get_mut(&product_id)
        .ok_or_else(|| StoreError::NotFound {
            entity: "stock",
            id: product_id.to_string(),
        })?;
    if *quantity < amount {
        return Err(StoreError::InsufficientStock {
            product_id,
            requested: amount,
            available: *quantity,
        });
    }
    *quantity -= amount;
    Ok(StockDecrement {
        product_id,
        remaining: *quantity,
        out_of_stock: *quantity == 0,
    })
}

/// Flags products that just crossed to zero.
fn flag_out_of_stock(inner: &mut Inner, decrements: &[StockDecrement]) {
    for decrement in decrements {
        if decrement.out_of_stock
            && let Some(product) = inner.products.get_mut(&decrement.product_id)
        {
            product.is_out_of_stock = true;
            product.is_active = false;
        }
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict {
                entity: "user",
                id: user.id.to_string(),
            });
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn upsert_seller_profile(&self, profile: SellerProfile) -> Result<()> {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile);
        Ok(())
    }

    async fn get_seller_profile(&self, seller_id: UserId) -> Result<Option<SellerProfile>> {
        Ok(self.inner.read().await.profiles.get(&seller_id).cloned())
    }

    async fn insert_dorm(&self, dorm: Dorm) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.dorms.contains_key(&dorm.id) {
            return Err(StoreError::Conflict {
                entity: "dorm",
                id: dorm.id.to_string(),
            });
        }
        inner.dorms.insert(dorm.id, dorm);
        Ok(())
    }

    async fn get_dorm(&self, id: DormId) -> Result<Option<Dorm>> {
        Ok(self.inner.read().await.dorms.get(&id).cloned())
    }

    async fn insert_category(&self, category: Category) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.categories.contains_key(&category.id) {
            return Err(StoreError::Conflict {
                entity: "category",
                id: category.id.to_string(),
            });
        }
        inner.categories.insert(category.id, category);
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.inner.read().await.categories.get(&id).cloned())
    }

    async fn insert_product(&self, product: Product, quantity: u32) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.products.contains_key(&product.id) {
            return Err(StoreError::Conflict {
                entity: "product",
                id: product.id.to_string(),
            });
        }
        inner.stocks.insert(product.id, quantity);
        inner.products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.products.contains_key(&product.id) {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id.to_string(),
            });
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.products.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            });
        }
        let referenced = inner
            .order_items
            .values()
            .flatten()
            .any(|item| item.product_id == id);
        if referenced {
            return Err(StoreError::Conflict {
                entity: "product",
                id: id.to_string(),
            });
        }
        inner.products.remove(&id);
        inner.stocks.remove(&id);
        Ok(())
    }

    async fn products_for_dorm(&self, dorm_id: DormId) -> Result<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut products: Vec<_> = inner
            .products
            .values()
            .filter(|p| p.dorm_id == dorm_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn products_for_seller(&self, seller_id: UserId) -> Result<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut products: Vec<_> = inner
            .products
            .values()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn count_active_products(&self, seller_id: UserId) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .filter(|p| p.seller_id == seller_id && p.is_active)
            .count() as u64)
    }

    async fn stock_quantity(&self, product_id: ProductId) -> Result<Option<u32>> {
        Ok(self.inner.read().await.stocks.get(&product_id).copied())
    }

    async fn set_stock_quantity(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.stocks.contains_key(&product_id) {
            return Err(StoreError::NotFound {
                entity: "stock",
                id: product_id.to_string(),
            });
        }
        inner.stocks.insert(product_id, quantity);
        Ok(())
    }

    async fn decrease_stock(&self, product_id: ProductId, amount: u32) -> Result<StockDecrement> {
        let mut inner = self.inner.write().await;
        let decrement = decrement_in(&mut inner.stocks, product_id, amount)?;
        flag_out_of_stock(&mut inner, std::slice::from_ref(&decrement));
        metrics::counter!("store_stock_decrements").increment(1);
        Ok(decrement)
    }

    async fn create_order(&self, order: NewOrder) -> Result<CreatedOrder> {
        let mut inner = self.inner.write().await;

        // Validate every decrement against a working copy first; the real
        // stock map is only replaced once the whole order is known good.
        let mut stocks = inner.stocks.clone();
        let mut decrements = Vec::with_capacity(order.items.len());
        for item in &order.items {
            decrements.push(decrement_in(&mut stocks, item.product_id, item.quantity)?);
        }

        let order_id = OrderId::new();
        let now = Utc::now();
        let total = order
            .items
            .iter()
            .map(|item| item.unit_price.multiply(item.quantity))
            .sum();

        let items: Vec<OrderItem> = order
            .items
            .iter()
            .map(|item| OrderItem {
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let header = Order {
            id: order_id,
            customer_id: order.customer_id,
            seller_id: order.seller_id,
            dorm_id: order.dorm_id,
            status: OrderStatus::Pending,
            total_amount: total,
            notes: order.notes,
            payment_method: order.payment_method,
            delivery_type: order.delivery_type,
            delivery_address: order.delivery_address,
            delivery_phone: order.delivery_phone,
            created_at: now,
        };

        inner.stocks = stocks;
        flag_out_of_stock(&mut inner, &decrements);
        inner.orders.insert(order_id, header.clone());
        inner.order_items.insert(order_id, items.clone());
        inner.status_logs.insert(
            order_id,
            vec![OrderStatusLog {
                order_id,
                status: OrderStatus::Pending,
                changed_by: Some(order.customer_id),
                note: String::new(),
                created_at: now,
            }],
        );
        metrics::counter!("store_orders_created").increment(1);

        Ok(CreatedOrder {
            order: header,
            items,
            decrements,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .inner
            .read()
            .await
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn orders_for_seller(&self, seller_id: UserId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn orders_for_dorm_since(
        &self,
        dorm_id: DormId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.dorm_id == dorm_id && o.created_at >= since)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        log: StatusLogEntry,
    ) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;
        order.status = status;
        let updated = order.clone();
        inner
            .status_logs
            .entry(order_id)
            .or_default()
            .push(OrderStatusLog {
                order_id,
                status: log.status,
                changed_by: log.changed_by,
                note: log.note,
                created_at: Utc::now(),
            });
        Ok(updated)
    }

    async fn status_logs(&self, order_id: OrderId) -> Result<Vec<OrderStatusLog>> {
        Ok(self
            .inner
            .read()
            .await
            .status_logs
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_chat_message(&self, message: ChatMessage) -> Result<()> {
        self.inner
            .write()
            .await
            .chats
            .entry(message.order_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn chat_messages(&self, order_id: OrderId) -> Result<Vec<ChatMessage>> {
        Ok(self
            .inner
            .read()
            .await
            .chats
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_plan(&self, plan: SubscriptionPlan) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.plans.contains_key(&plan.id) {
            return Err(StoreError::Conflict {
                entity: "plan",
                id: plan.id.to_string(),
            });
        }
        inner.plans.insert(plan.id, plan);
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<SubscriptionPlan>> {
        Ok(self.inner.read().await.plans.get(&id).cloned())
    }

    async fn insert_subscription(&self, subscription: SellerSubscription) -> Result<()> {
        self.inner
            .write()
            .await
            .subscriptions
            .entry(subscription.seller_id)
            .or_default()
            .push(subscription);
        Ok(())
    }

    async fn active_subscription(
        &self,
        seller_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SellerSubscription>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscriptions
            .get(&seller_id)
            .and_then(|subs| {
                subs.iter()
                    .filter(|s| s.expires_at > now)
                    .max_by_key(|s| s.expires_at)
            })
            .cloned())
    }

    async fn upsert_usage(&self, seller_id: UserId, product_slots: u32) -> Result<()> {
        self.inner.write().await.usage.insert(
            seller_id,
            UsageTracking {
                seller_id,
                product_slots,
            },
        );
        Ok(())
    }

    async fn usage_for_seller(&self, seller_id: UserId) -> Result<Option<UsageTracking>> {
        Ok(self.inner.read().await.usage.get(&seller_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{DeliveryType, Money, PaymentMethod, Role};
    use crate::store::NewOrderItem;

    async fn seed_product(store: &InMemoryStore, price_cents: i64, quantity: u32) -> Product {
        let dorm = Dorm::new("Block A");
        let seller = User::new("seller@example.com", Role::Seller, Some(dorm.id));
        let category = Category::new(dorm.id, "Snacks", "snacks");
        let product = Product::new(
            seller.id,
            dorm.id,
            category.id,
            "Ramen",
            Money::from_cents(price_cents),
        );
        store.insert_dorm(dorm).await.unwrap();
        store.insert_user(seller).await.unwrap();
        store.insert_category(category).await.unwrap();
        store.insert_product(product.clone(), quantity).await.unwrap();
        product
    }

    fn new_order_for(product: &Product, customer_id: UserId, quantity: u32) -> NewOrder {
        NewOrder {
            customer_id,
            seller_id: product.seller_id,
            dorm_id: product.dorm_id,
            notes: String::new(),
            payment_method: PaymentMethod::CashOnDelivery,
            delivery_type: DeliveryType::CustomerPickup,
            delivery_address: "A-101".to_string(),
            delivery_phone: "+90 555 000 0000".to_string(),
            items: vec![NewOrderItem {
                product_id: product.id,
                quantity,
                unit_price: product.price,
            }],
        }
    }

    #[tokio::test]
    async fn decrease_stock_updates_quantity() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 5).await;

        let decrement = store.decrease_stock(product.id, 2).await.unwrap();
        assert_eq!(decrement.remaining, 3);
        assert!(!decrement.out_of_stock);
        assert_eq!(store.stock_quantity(product.id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn decrease_stock_zero_amount_is_rejected() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 5).await;

        let result = store.decrease_stock(product.id, 0).await;
        assert!(matches!(result, Err(StoreError::InvalidAmount { .. })));
        assert_eq!(store.stock_quantity(product.id).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn decrease_stock_insufficient_leaves_quantity_unchanged() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 2).await;

        let result = store.decrease_stock(product.id, 3).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert_eq!(store.stock_quantity(product.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn decrease_to_zero_flags_product() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 2).await;

        let decrement = store.decrease_stock(product.id, 2).await.unwrap();
        assert!(decrement.out_of_stock);

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert!(stored.is_out_of_stock);
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn decrease_above_zero_keeps_product_active() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 3).await;

        store.decrease_stock(product.id, 2).await.unwrap();
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert!(!stored.is_out_of_stock);
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn concurrent_decrements_never_go_negative() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 1).await;

        let a = {
            let store = store.clone();
            let id = product.id;
            tokio::spawn(async move { store.decrease_stock(id, 1).await })
        };
        let b = {
            let store = store.clone();
            let id = product.id;
            tokio::spawn(async move { store.decrease_stock(id, 1).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert_eq!(store.stock_quantity(product.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn create_order_persists_full_graph() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 5).await;
        let customer = User::new("student@example.com", Role::Student, Some(product.dorm_id));
        store.insert_user(customer.clone()).await.unwrap();

        let created = store
            .create_order(new_order_for(&product, customer.id, 2))
            .await
            .unwrap();

        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.order.total_amount.cents(), 2000);
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.decrements[0].remaining, 3);

        let logs = store.status_logs(created.order.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn create_order_rolls_back_on_insufficient_stock() {
        let store = InMemoryStore::new();
        let plenty = seed_product(&store, 1000, 10).await;
        let scarce = Product::new(
            plenty.seller_id,
            plenty.dorm_id,
            plenty.category_id,
            "Scarce",
            Money::from_cents(500),
        );
        store.insert_product(scarce.clone(), 1).await.unwrap();
        let customer = User::new("student@example.com", Role::Student, Some(plenty.dorm_id));
        store.insert_user(customer.clone()).await.unwrap();

        let mut order = new_order_for(&plenty, customer.id, 2);
        order.items.push(NewOrderItem {
            product_id: scarce.id,
            quantity: 5,
            unit_price: scarce.price,
        });

        let result = store.create_order(order).await;
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));

        // Nothing persisted, including the first item's decrement.
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.stock_quantity(plenty.id).await.unwrap(), Some(10));
        assert_eq!(store.stock_quantity(scarce.id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn update_order_status_appends_one_log_row() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 5).await;
        let customer = User::new("student@example.com", Role::Student, Some(product.dorm_id));
        store.insert_user(customer.clone()).await.unwrap();

        let created = store
            .create_order(new_order_for(&product, customer.id, 1))
            .await
            .unwrap();

        let updated = store
            .update_order_status(
                created.order.id,
                OrderStatus::Onay,
                StatusLogEntry {
                    status: OrderStatus::Onay,
                    changed_by: Some(product.seller_id),
                    note: String::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Onay);
        let logs = store.status_logs(created.order.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].status, OrderStatus::Onay);
    }

    #[tokio::test]
    async fn delete_product_referenced_by_order_is_blocked() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 5).await;
        let customer = User::new("student@example.com", Role::Student, Some(product.dorm_id));
        store.insert_user(customer.clone()).await.unwrap();
        store
            .create_order(new_order_for(&product, customer.id, 1))
            .await
            .unwrap();

        let result = store.delete_product(product.id).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert!(store.get_product(product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn active_subscription_respects_expiry() {
        let store = InMemoryStore::new();
        let seller_id = UserId::new();
        let plan_id = PlanId::new();
        let now = Utc::now();

        store
            .insert_subscription(SellerSubscription {
                seller_id,
                plan_id,
                expires_at: now - chrono::Duration::days(1),
                created_at: now - chrono::Duration::days(31),
            })
            .await
            .unwrap();
        assert!(store
            .active_subscription(seller_id, now)
            .await
            .unwrap()
            .is_none());

        store
            .insert_subscription(SellerSubscription {
                seller_id,
                plan_id,
                expires_at: now + chrono::Duration::days(30),
                created_at: now,
            })
            .await
            .unwrap();
        assert!(store
            .active_subscription(seller_id, now)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn count_active_products_ignores_inactive() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1000, 0).await;
        assert_eq!(
            store.count_active_products(product.seller_id).await.unwrap(),
            1
        );

        let mut deactivated = product.clone();
        deactivated.is_active = false;
        store.update_product(&deactivated).await.unwrap();
        assert_eq!(
            store.count_active_products(product.seller_id).await.unwrap(),
            0
        );
    }
}
