//! Order workflow: creation, the status FSM, and the audit trail.

use std::collections::HashMap;
use std::sync::Arc;

use common::{ChatSender, DeliveryType, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};
use store::records::{ChatMessage, Order, OrderItem, OrderStatusLog, Product};
use store::{MarketStore, NewOrder, NewOrderItem, StatusLogEntry};

use crate::bus::EventBus;
use crate::error::DomainError;
use crate::event::MarketEvent;
use crate::stock::publish_decrement;
use crate::tasks::TaskRunner;

/// Input for placing an order.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub customer_id: UserId,
    pub items: Vec<OrderItemInput>,
    pub notes: String,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    pub delivery_address: String,
    pub delivery_phone: String,
}

#[derive(Debug, Clone)]
pub struct OrderItemInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// An order with its lines and audit trail.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub logs: Vec<OrderStatusLog>,
}

/// Service for placing orders and driving them through the status FSM.
///
/// All validation happens before any write; the storage transaction then
/// either lands completely or not at all. Events and analytics triggers
/// fire strictly after the commit and never fail the operation.
pub struct OrderService<S> {
    store: Arc<S>,
    bus: EventBus,
    tasks: Arc<dyn TaskRunner>,
}

impl<S: MarketStore> OrderService<S> {
    pub fn new(store: Arc<S>, bus: EventBus, tasks: Arc<dyn TaskRunner>) -> Self {
        Self { store, bus, tasks }
    }

    /// Places an order for a single-seller basket.
    #[tracing::instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<Order, DomainError> {
        if input.items.is_empty() {
            return Err(DomainError::Validation(
                "order requires at least one item".into(),
            ));
        }
        for item in &input.items {
            if item.quantity == 0 {
                return Err(DomainError::InvalidAmount { amount: 0 });
            }
        }

        let customer = self
            .store
            .get_user(input.customer_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "user",
                id: input.customer_id.to_string(),
            })?;

        let mut distinct: Vec<ProductId> = input.items.iter().map(|i| i.product_id).collect();
        distinct.sort_unstable_by_key(|id| id.as_uuid());
        distinct.dedup();

        let products: HashMap<ProductId, Product> = self
            .store
            .get_products(&distinct)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        if products.len() != distinct.len() {
            return Err(DomainError::Validation("some products are invalid".into()));
        }

        // Seller and dorm come from the first line of the basket.
        let first = &products[&input.items[0].product_id];
        let seller_id = first.seller_id;
        let dorm_id = first.dorm_id;

        match customer.dorm_id {
            Some(dorm) if dorm == dorm_id => {}
            _ => {
                return Err(DomainError::Validation(
                    "customer must belong to the product's dorm".into(),
                ));
            }
        }
        if products.values().any(|p| p.seller_id != seller_id) {
            return Err(DomainError::Validation(
                "all items must come from the same seller".into(),
            ));
        }

        let profile = self.store.get_seller_profile(seller_id).await?;
        match profile {
            Some(profile) if profile.store_is_open => {}
            _ => {
                return Err(DomainError::Validation("store is closed".into()));
            }
        }

        // Unit prices are frozen here; later price edits do not touch the
        // persisted order.
        let items: Vec<NewOrderItem> = input
            .items
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: products[&item.product_id].price,
            })
            .collect();

        let created = self
            .store
            .create_order(NewOrder {
                customer_id: customer.id,
                seller_id,
                dorm_id,
                notes: input.notes,
                payment_method: input.payment_method,
                delivery_type: input.delivery_type,
                delivery_address: input.delivery_address,
                delivery_phone: input.delivery_phone,
                items,
            })
            .await?;

        for (item, decrement) in input.items.iter().zip(&created.decrements) {
            publish_decrement(&self.bus, item.quantity, decrement);
        }
        self.bus.publish(MarketEvent::OrderCreated {
            order_id: created.order.id,
            seller_id,
            customer_id: customer.id,
        });

        tracing::info!(order_id = %created.order.id, total = %created.order.total_amount, "order created");
        Ok(created.order)
    }

    /// Seller accepts the order. Triggers a popular-sellers refresh.
    #[tracing::instrument(skip(self))]
    pub async fn approve(
        &self,
        order_id: OrderId,
        actor: UserId,
        note: Option<String>,
    ) -> Result<Order, DomainError> {
        let order = self.fetch(order_id).await?;
        self.authorize_seller(&order, actor)?;
        let updated = self.write_status(order_id, OrderStatus::Onay, actor, note).await?;
        self.tasks.refresh_popular_sellers(order.dorm_id);
        Ok(updated)
    }

    /// Seller declines the order.
    #[tracing::instrument(skip(self))]
    pub async fn reject(
        &self,
        order_id: OrderId,
        actor: UserId,
        note: Option<String>,
    ) -> Result<Order, DomainError> {
        let order = self.fetch(order_id).await?;
        self.authorize_seller(&order, actor)?;
        self.write_status(order_id, OrderStatus::Red, actor, note).await
    }

    /// Either party cancels. A chat message with the reason is appended to
    /// the order thread, attributed to the seller role.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        actor: UserId,
        reason: Option<String>,
    ) -> Result<Order, DomainError> {
        let order = self.fetch(order_id).await?;
        self.authorize_party(&order, actor)?;
        let updated = self
            .write_status(order_id, OrderStatus::Iptal, actor, reason.clone())
            .await?;

        let message = reason.unwrap_or_else(|| "Order cancelled.".to_string());
        self.store
            .insert_chat_message(ChatMessage::new(order_id, ChatSender::Seller, message))
            .await?;
        Ok(updated)
    }

    /// Seller marks an approved order delivered. Only legal from ONAY.
    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        order_id: OrderId,
        actor: UserId,
        note: Option<String>,
    ) -> Result<Order, DomainError> {
        let order = self.fetch(order_id).await?;
        self.authorize_seller(&order, actor)?;
        if !order.status.can_complete() {
            return Err(DomainError::Validation(
                "only approved orders can be completed".into(),
            ));
        }
        let updated = self
            .write_status(order_id, OrderStatus::Completed, actor, note)
            .await?;
        self.tasks.refresh_popular_sellers(order.dorm_id);
        Ok(updated)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<OrderDetails, DomainError> {
        let order = self.fetch(order_id).await?;
        let items = self.store.order_items(order_id).await?;
        let logs = self.store.status_logs(order_id).await?;
        Ok(OrderDetails { order, items, logs })
    }

    pub async fn status_logs(&self, order_id: OrderId) -> Result<Vec<OrderStatusLog>, DomainError> {
        self.fetch(order_id).await?;
        Ok(self.store.status_logs(order_id).await?)
    }

    pub async fn chat(&self, order_id: OrderId) -> Result<Vec<ChatMessage>, DomainError> {
        self.fetch(order_id).await?;
        Ok(self.store.chat_messages(order_id).await?)
    }

    pub async fn list_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.orders_for_customer(customer_id).await?)
    }

    pub async fn list_for_seller(&self, seller_id: UserId) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.orders_for_seller(seller_id).await?)
    }

    async fn fetch(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    fn authorize_party(&self, order: &Order, actor: UserId) -> Result<(), DomainError> {
        if actor != order.customer_id && actor != order.seller_id {
            return Err(DomainError::PermissionDenied(
                "actor is not a party to this order".into(),
            ));
        }
        Ok(())
    }

    fn authorize_seller(&self, order: &Order, actor: UserId) -> Result<(), DomainError> {
        self.authorize_party(order, actor)?;
        if actor != order.seller_id {
            return Err(DomainError::PermissionDenied(
                "only the seller may perform this action".into(),
            ));
        }
        Ok(())
    }

    /// Writes the status and exactly one audit row. Deliberately not
    /// idempotent: a repeated call appends another row.
    async fn write_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        actor: UserId,
        note: Option<String>,
    ) -> Result<Order, DomainError> {
        let updated = self
            .store
            .update_order_status(
                order_id,
                status,
                StatusLogEntry {
                    status,
                    changed_by: Some(actor),
                    note: note.unwrap_or_default(),
                },
            )
            .await?;
        metrics::counter!("order_transitions", "status" => status.as_str()).increment(1);
        Ok(updated)
    }
}
