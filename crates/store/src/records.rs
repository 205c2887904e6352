//! Typed records mirroring the relational schema.

use chrono::{DateTime, Utc};
use common::{
    CategoryId, ChatSender, DeliveryType, DormId, Money, OrderId, OrderStatus, PaymentMethod,
    PlanId, ProductId, Role, UserId,
};
use serde::{Deserialize, Serialize};

/// A dorm, the tenant boundary of the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dorm {
    pub id: DormId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Dorm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DormId::new(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A marketplace user. Students and sellers both live here; the seller
/// side carries an additional [`SellerProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    /// Dorm assignment. Explicitly optional: a user without a dorm cannot
    /// place orders.
    pub dorm_id: Option<DormId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, role: Role, dorm_id: Option<DormId>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            role,
            dorm_id,
            created_at: Utc::now(),
        }
    }
}

/// Seller-only profile data, one-to-one with [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerProfile {
    pub user_id: UserId,
    pub dorm_id: DormId,
    pub phone: String,
    pub iban: String,
    pub notification_email: Option<String>,
    pub store_is_open: bool,
    pub created_at: DateTime<Utc>,
}

impl SellerProfile {
    pub fn new(user_id: UserId, dorm_id: DormId, phone: impl Into<String>) -> Self {
        Self {
            user_id,
            dorm_id,
            phone: phone.into(),
            iban: String::new(),
            notification_email: None,
            store_is_open: true,
            created_at: Utc::now(),
        }
    }
}

/// A product category within a dorm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub dorm_id: DormId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(dorm_id: DormId, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            dorm_id,
            name: name.into(),
            slug: slug.into(),
            created_at: Utc::now(),
        }
    }
}

/// A product listing owned by a seller. Referenced products are
/// deactivated rather than deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub dorm_id: DormId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub is_active: bool,
    pub is_out_of_stock: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        seller_id: UserId,
        dorm_id: DormId,
        category_id: CategoryId,
        name: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            id: ProductId::new(),
            seller_id,
            dorm_id,
            category_id,
            name: name.into(),
            description: String::new(),
            price,
            is_active: true,
            is_out_of_stock: false,
            created_at: Utc::now(),
        }
    }
}

/// An order header. Items, status logs and chat messages hang off it and
/// are cascade-deleted with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub seller_id: UserId,
    pub dorm_id: DormId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub notes: String,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub created_at: DateTime<Utc>,
}

/// A line item. The unit price is a snapshot taken at order time and is
/// immune to later product price changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Append-only audit entry for an order status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusLog {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_by: Option<UserId>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// A message on the order's seller/customer thread. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub order_id: OrderId,
    pub sender: ChatSender,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(order_id: OrderId, sender: ChatSender, message: impl Into<String>) -> Self {
        Self {
            order_id,
            sender,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// A paid tier a seller can subscribe to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub price: Money,
    pub duration_days: u32,
    pub max_products: u32,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    pub fn new(
        name: impl Into<String>,
        price: Money,
        duration_days: u32,
        max_products: u32,
    ) -> Self {
        Self {
            id: PlanId::new(),
            name: name.into(),
            price,
            duration_days,
            max_products,
            created_at: Utc::now(),
        }
    }
}

/// A seller's subscription to a plan. Active while `expires_at` is in the
/// future.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerSubscription {
    pub seller_id: UserId,
    pub plan_id: PlanId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// How many product slots a seller currently uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageTracking {
    pub seller_id: UserId,
    pub product_slots: u32,
}
