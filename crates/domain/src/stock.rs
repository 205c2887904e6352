//! Stock ledger.

use std::sync::Arc;

use common::ProductId;
use store::{MarketStore, StockDecrement};

use crate::bus::EventBus;
use crate::error::DomainError;
use crate::event::MarketEvent;

/// Publishes the events for one committed decrement. The zero-crossing
/// decrement produces exactly one `ProductOutOfStock`.
pub(crate) fn publish_decrement(bus: &EventBus, quantity: u32, decrement: &StockDecrement) {
    bus.publish(MarketEvent::StockDecreased {
        product_id: decrement.product_id,
        quantity,
        remaining: decrement.remaining,
    });
    if decrement.out_of_stock {
        bus.publish(MarketEvent::ProductOutOfStock {
            product_id: decrement.product_id,
        });
    }
}

/// Validated entry point for standalone stock decrements.
///
/// The store handles atomicity; the ledger adds input validation and
/// publishes events once the write has committed.
pub struct StockLedger<S> {
    store: Arc<S>,
    bus: EventBus,
}

impl<S: MarketStore> StockLedger<S> {
    pub fn new(store: Arc<S>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    #[tracing::instrument(skip(self))]
    pub async fn decrease(
        &self,
        product_id: ProductId,
        amount: u32,
    ) -> Result<StockDecrement, DomainError> {
        if amount == 0 {
            return Err(DomainError::InvalidAmount { amount });
        }

        let decrement = self.store.decrease_stock(product_id, amount).await?;
        publish_decrement(&self.bus, amount, &decrement);
        Ok(decrement)
    }
}
