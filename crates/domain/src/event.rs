//! Market domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, PlanId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// Events published after a committed state change.
///
/// Events carry ids, not full records; handlers resolve what they need
/// from the store. Names are stable strings used as subscription keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MarketEvent {
    /// An order was created and its stock decrements committed.
    OrderCreated {
        order_id: OrderId,
        seller_id: UserId,
        customer_id: UserId,
    },

    /// A stock decrement committed.
    StockDecreased {
        product_id: ProductId,
        quantity: u32,
        remaining: u32,
    },

    /// A decrement drove the quantity to exactly zero.
    ProductOutOfStock { product_id: ProductId },

    /// A seller started a subscription.
    SubscriptionActivated { seller_id: UserId, plan_id: PlanId },
}

impl MarketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::OrderCreated { .. } => "order_created",
            MarketEvent::StockDecreased { .. } => "stock_decreased",
            MarketEvent::ProductOutOfStock { .. } => "product_out_of_stock",
            MarketEvent::SubscriptionActivated { .. } => "subscription_activated",
        }
    }
}

/// An event plus the moment it was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: MarketEvent,
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: MarketEvent) -> Self {
        Self {
            event,
            occurred_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.event.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        let event = MarketEvent::OrderCreated {
            order_id: OrderId::new(),
            seller_id: UserId::new(),
            customer_id: UserId::new(),
        };
        assert_eq!(event.name(), "order_created");

        let event = MarketEvent::ProductOutOfStock {
            product_id: ProductId::new(),
        };
        assert_eq!(event.name(), "product_out_of_stock");
    }

    #[test]
    fn events_serialize_with_tagged_shape() {
        let product_id = ProductId::new();
        let event = MarketEvent::StockDecreased {
            product_id,
            quantity: 2,
            remaining: 3,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stock_decreased");
        assert_eq!(json["data"]["remaining"], 3);

        let back: MarketEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
