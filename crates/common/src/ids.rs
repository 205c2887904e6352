//! Typed UUID identifiers.
//!
//! Wrapping each identifier in its own newtype prevents mixing up, say,
//! a seller id with an order id at a call site.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id! {
    /// Identifier for a user (student or seller).
    UserId
}

entity_id! {
    /// Identifier for a product listing.
    ProductId
}

entity_id! {
    /// Identifier for an order.
    OrderId
}

entity_id! {
    /// Identifier for a dorm (tenant boundary).
    DormId
}

entity_id! {
    /// Identifier for a product category.
    CategoryId
}

entity_id! {
    /// Identifier for a subscription plan.
    PlanId
}
