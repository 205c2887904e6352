//! Product management and the free-quota gate.

use std::sync::Arc;

use common::{CategoryId, Money, ProductId, UserId};
use store::records::Product;
use store::{MarketStore, StoreError};

use crate::error::DomainError;
use crate::subscriptions::SubscriptionService;

/// Active products a seller may list without a subscription.
pub const FREE_PRODUCT_QUOTA: u64 = 3;

/// Lowest allowed listing price.
const MIN_PRICE: Money = Money::from_cents(50);

#[derive(Debug, Clone)]
pub struct NewProductInput {
    pub seller_id: UserId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub quantity: u32,
}

/// Fields a seller may change on an existing listing.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub is_active: Option<bool>,
    pub quantity: Option<u32>,
}

/// Listing lifecycle: creation behind the quota gate, owner-only edits,
/// and delete-or-deactivate.
pub struct ProductService<S> {
    store: Arc<S>,
    subscriptions: SubscriptionService<S>,
}

impl<S: MarketStore> ProductService<S> {
    pub fn new(store: Arc<S>, subscriptions: SubscriptionService<S>) -> Self {
        Self {
            store,
            subscriptions,
        }
    }

    /// Creates a listing with its stock row. The product's dorm is the
    /// seller's dorm.
    #[tracing::instrument(skip(self, input), fields(seller_id = %input.seller_id))]
    pub async fn create_product(&self, input: NewProductInput) -> Result<Product, DomainError> {
        if input.price < MIN_PRICE {
            return Err(DomainError::Validation(format!(
                "price must be at least {MIN_PRICE}"
            )));
        }

        let profile = self
            .store
            .get_seller_profile(input.seller_id)
            .await?
            .ok_or_else(|| DomainError::Validation("seller profile required".into()))?;

        let active = self.store.count_active_products(input.seller_id).await?;
        if active >= FREE_PRODUCT_QUOTA
            && !self
                .subscriptions
                .has_active_subscription(input.seller_id)
                .await?
        {
            return Err(DomainError::Validation(
                "seller must subscribe to add more products".into(),
            ));
        }

        let mut product = Product::new(
            input.seller_id,
            profile.dorm_id,
            input.category_id,
            input.name,
            input.price,
        );
        product.description = input.description;

        self.store
            .insert_product(product.clone(), input.quantity)
            .await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Applies an owner's edits; may also set the stock quantity.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        product_id: ProductId,
        actor: UserId,
        update: ProductUpdate,
    ) -> Result<Product, DomainError> {
        let mut product = self.owned_product(product_id, actor).await?;

        if let Some(price) = update.price {
            if price < MIN_PRICE {
                return Err(DomainError::Validation(format!(
                    "price must be at least {MIN_PRICE}"
                )));
            }
            product.price = price;
        }
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(is_active) = update.is_active {
            product.is_active = is_active;
        }

        self.store.update_product(&product).await?;
        if let Some(quantity) = update.quantity {
            self.store.set_stock_quantity(product_id, quantity).await?;
        }
        Ok(product)
    }

    /// Removes a listing. A product already referenced by an order cannot
    /// be deleted; it is deactivated instead so order history stays intact.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(
        &self,
        product_id: ProductId,
        actor: UserId,
    ) -> Result<(), DomainError> {
        let mut product = self.owned_product(product_id, actor).await?;

        match self.store.delete_product(product_id).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict { .. }) => {
                product.is_active = false;
                self.store.update_product(&product).await?;
                tracing::debug!(%product_id, "referenced product deactivated instead of deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_for_dorm(
        &self,
        dorm_id: common::DormId,
    ) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.products_for_dorm(dorm_id).await?)
    }

    pub async fn list_for_seller(&self, seller_id: UserId) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.products_for_seller(seller_id).await?)
    }

    async fn owned_product(
        &self,
        product_id: ProductId,
        actor: UserId,
    ) -> Result<Product, DomainError> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;
        if product.seller_id != actor {
            return Err(DomainError::PermissionDenied(
                "only the owning seller may modify this product".into(),
            ));
        }
        Ok(product)
    }
}
