//! Enumerations shared across the persistence and service layers.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Wire values keep the original Turkish status codes:
/// ```text
/// PENDING ──approve──► ONAY ──complete──► COMPLETED
///    │                  │
///    ├──reject──► RED   │
///    └──cancel──► IPTAL ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Waiting for the seller's decision.
    #[default]
    #[serde(rename = "PENDING")]
    Pending,

    /// Approved by the seller, being prepared.
    #[serde(rename = "ONAY")]
    Onay,

    /// Delivered and closed (terminal).
    #[serde(rename = "COMPLETED")]
    Completed,

    /// Rejected by the seller (terminal).
    #[serde(rename = "RED")]
    Red,

    /// Cancelled by either party (terminal).
    #[serde(rename = "IPTAL")]
    Iptal,
}

impl OrderStatus {
    /// Returns true if the order can be completed from this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Onay)
    }

    /// Returns true if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Red | OrderStatus::Iptal
        )
    }

    /// Returns the stable wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Onay => "ONAY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Red => "RED",
            OrderStatus::Iptal => "IPTAL",
        }
    }

    /// Parses a stable wire value.
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(OrderStatus::Pending),
            "ONAY" => Some(OrderStatus::Onay),
            "COMPLETED" => Some(OrderStatus::Completed),
            "RED" => Some(OrderStatus::Red),
            "IPTAL" => Some(OrderStatus::Iptal),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the customer receives the goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Customer picks the order up from the seller's room.
    #[default]
    CustomerPickup,
    /// Seller brings the order to the customer.
    SellerDelivery,
}

impl DeliveryType {
    /// Returns the stable wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::CustomerPickup => "customer_pickup",
            DeliveryType::SellerDelivery => "seller_delivery",
        }
    }

    /// Parses a stable wire value.
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "customer_pickup" => Some(DeliveryType::CustomerPickup),
            "seller_delivery" => Some(DeliveryType::SellerDelivery),
            _ => None,
        }
    }
}

/// Supported payment methods. Only cash on delivery is live; payment
/// provider adapters stay stubbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
}

impl PaymentMethod {
    /// Returns the stable wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }

    /// Parses a stable wire value.
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            _ => None,
        }
    }
}

/// Which side of an order a chat message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    Customer,
    Seller,
}

impl ChatSender {
    /// Returns the stable wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSender::Customer => "customer",
            ChatSender::Seller => "seller",
        }
    }

    /// Parses a stable wire value.
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(ChatSender::Customer),
            "seller" => Some(ChatSender::Seller),
            _ => None,
        }
    }
}

/// User role within a dorm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Seller,
}

impl Role {
    /// Returns the stable wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Seller => "seller",
        }
    }

    /// Parses a stable wire value.
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "seller" => Some(Role::Seller),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn only_onay_can_complete() {
        assert!(!OrderStatus::Pending.can_complete());
        assert!(OrderStatus::Onay.can_complete());
        assert!(!OrderStatus::Completed.can_complete());
        assert!(!OrderStatus::Red.can_complete());
        assert!(!OrderStatus::Iptal.can_complete());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Onay.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Red.is_terminal());
        assert!(OrderStatus::Iptal.is_terminal());
    }

    #[test]
    fn status_wire_values_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Onay,
            OrderStatus::Completed,
            OrderStatus::Red,
            OrderStatus::Iptal,
        ] {
            assert_eq!(OrderStatus::from_str_value(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::from_str_value("SHIPPED"), None);
    }

    #[test]
    fn status_serde_uses_wire_values() {
        let json = serde_json::to_string(&OrderStatus::Onay).unwrap();
        assert_eq!(json, "\"ONAY\"");
        let back: OrderStatus = serde_json::from_str("\"IPTAL\"").unwrap();
        assert_eq!(back, OrderStatus::Iptal);
    }

    #[test]
    fn delivery_and_payment_wire_values() {
        assert_eq!(
            DeliveryType::from_str_value("seller_delivery"),
            Some(DeliveryType::SellerDelivery)
        );
        assert_eq!(
            PaymentMethod::from_str_value("cash_on_delivery"),
            Some(PaymentMethod::CashOnDelivery)
        );
        assert_eq!(ChatSender::Seller.as_str(), "seller");
        assert_eq!(Role::from_str_value("seller"), Some(Role::Seller));
    }
}
