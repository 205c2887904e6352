use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CategoryId, DeliveryType, DormId, Money, OrderId, OrderStatus, PaymentMethod, PlanId,
    ProductId, UserId,
};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::records::{
    Category, ChatMessage, Dorm, Order, OrderItem, OrderStatusLog, Product, SellerProfile,
    SellerSubscription, SubscriptionPlan, UsageTracking, User,
};

/// Input for the atomic order-creation transaction.
///
/// Unit prices are frozen by the caller before the transaction starts so
/// concurrent price edits cannot skew the persisted totals.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub seller_id: UserId,
    pub dorm_id: DormId,
    pub notes: String,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub items: Vec<NewOrderItem>,
}

/// A single line of a [`NewOrder`].
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Audit data appended alongside a status write.
#[derive(Debug, Clone)]
pub struct StatusLogEntry {
    pub status: OrderStatus,
    pub changed_by: Option<UserId>,
    pub note: String,
}

/// Outcome of one committed stock decrement.
///
/// Carried back to the caller so domain events can be published after the
/// transaction commits; the stock value itself never depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub remaining: u32,
    /// True when this decrement drove the quantity to exactly zero (the
    /// product was flagged out of stock in the same transaction).
    pub out_of_stock: bool,
}

/// The persisted result of a successful order-creation transaction.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub decrements: Vec<StockDecrement>,
}

/// Storage seam for the marketplace.
///
/// All implementations must be thread-safe and must make the multi-step
/// operations (`create_order`, `update_order_status`, `decrease_stock`)
/// atomic: concurrent callers observe either all of their writes or none.
#[async_trait]
pub trait MarketStore: Send + Sync {
    // -- users & profiles --

    async fn insert_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn upsert_seller_profile(&self, profile: SellerProfile) -> Result<()>;
    async fn get_seller_profile(&self, seller_id: UserId) -> Result<Option<SellerProfile>>;

    // -- dorms & categories --

    async fn insert_dorm(&self, dorm: Dorm) -> Result<()>;
    async fn get_dorm(&self, id: DormId) -> Result<Option<Dorm>>;
    async fn insert_category(&self, category: Category) -> Result<()>;
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    // -- products --

    /// Inserts the product together with its stock row.
    async fn insert_product(&self, product: Product, quantity: u32) -> Result<()>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;
    /// Resolves a set of products; absent ids are silently skipped so the
    /// caller can detect them by comparing lengths.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    /// Deletes a product, failing with [`StoreError::Conflict`] when order
    /// items still reference it (the caller deactivates instead).
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    async fn delete_product(&self, id: ProductId) -> Result<()>;
    async fn products_for_dorm(&self, dorm_id: DormId) -> Result<Vec<Product>>;
    async fn products_for_seller(&self, seller_id: UserId) -> Result<Vec<Product>>;
    async fn count_active_products(&self, seller_id: UserId) -> Result<u64>;

    // -- stock --

    async fn stock_quantity(&self, product_id: ProductId) -> Result<Option<u32>>;
    async fn set_stock_quantity(&self, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Atomically decrements the stock row.
    ///
    /// The read-check-write runs under the store's isolation (a conditional
    /// UPDATE in Postgres, a write lock in memory): two concurrent
    /// decrements never jointly drive the quantity negative. Reaching
    /// exactly zero also flags the product out of stock and inactive in
    /// the same transaction.
    async fn decrease_stock(&self, product_id: ProductId, amount: u32) -> Result<StockDecrement>;

    // -- orders --

    /// Runs the whole order-creation write as one transaction: the order
    /// row, the per-item stock decrements, the item rows, the computed
    /// total and the initial PENDING status-log entry. Any failure leaves
    /// nothing persisted.
    async fn create_order(&self, order: NewOrder) -> Result<CreatedOrder>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;
    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>>;
    async fn orders_for_seller(&self, seller_id: UserId) -> Result<Vec<Order>>;
    async fn orders_for_dorm_since(
        &self,
        dorm_id: DormId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    /// Writes the new status and appends exactly one status-log row, in
    /// one transaction. Returns the updated order.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        log: StatusLogEntry,
    ) -> Result<Order>;
    async fn status_logs(&self, order_id: OrderId) -> Result<Vec<OrderStatusLog>>;
    async fn insert_chat_message(&self, message: ChatMessage) -> Result<()>;
    async fn chat_messages(&self, order_id: OrderId) -> Result<Vec<ChatMessage>>;

    // -- subscriptions --

    async fn insert_plan(&self, plan: SubscriptionPlan) -> Result<()>;
    async fn get_plan(&self, id: PlanId) -> Result<Option<SubscriptionPlan>>;
    async fn insert_subscription(&self, subscription: SellerSubscription) -> Result<()>;
    /// Returns the subscription with the latest expiry still in the
    /// future, if any.
    async fn active_subscription(
        &self,
        seller_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SellerSubscription>>;
    async fn upsert_usage(&self, seller_id: UserId, product_slots: u32) -> Result<()>;
    async fn usage_for_seller(&self, seller_id: UserId) -> Result<Option<UsageTracking>>;
}
