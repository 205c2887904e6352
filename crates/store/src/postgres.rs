use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CategoryId, ChatSender, DeliveryType, DormId, Money, OrderId, OrderStatus, PaymentMethod,
    PlanId, ProductId, Role, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::records::{
    Category, ChatMessage, Dorm, Order, OrderItem, OrderStatusLog, Product, SellerProfile,
    SellerSubscription, SubscriptionPlan, UsageTracking, User,
};
use crate::store::{
    CreatedOrder, MarketStore, NewOrder, StatusLogEntry, StockDecrement,
};

/// PostgreSQL-backed market store.
///
/// Multi-step operations run inside a single transaction; the stock
/// decrement is a conditional UPDATE, so the read-check-write is atomic
/// at the row level and concurrent decrements serialize on the row lock.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn decode<T>(value: Option<T>, kind: &str, raw: &str) -> Result<T> {
    value.ok_or_else(|| StoreError::Decode(format!("unknown {kind}: {raw}")))
}

fn cents_to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("negative {column}: {value}")))
}

fn conflict_or_db(e: sqlx::Error, entity: &'static str, id: String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict { entity, id };
    }
    StoreError::Database(e)
}

fn row_to_user(row: &PgRow) -> Result<User> {
    let role_raw: String = row.try_get("role")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        email: row.try_get("email")?,
        role: decode(Role::from_str_value(&role_raw), "role", &role_raw)?,
        dorm_id: row
            .try_get::<Option<Uuid>, _>("dorm_id")?
            .map(DormId::from_uuid),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_profile(row: &PgRow) -> Result<SellerProfile> {
    Ok(SellerProfile {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        dorm_id: DormId::from_uuid(row.try_get::<Uuid, _>("dorm_id")?),
        phone: row.try_get("phone")?,
        iban: row.try_get("iban")?,
        notification_email: row.try_get("notification_email")?,
        store_is_open: row.try_get("store_is_open")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        dorm_id: DormId::from_uuid(row.try_get::<Uuid, _>("dorm_id")?),
        category_id: CategoryId::from_uuid(row.try_get::<Uuid, _>("category_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        is_active: row.try_get("is_active")?,
        is_out_of_stock: row.try_get("is_out_of_stock")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status_raw: String = row.try_get("status")?;
    let payment_raw: String = row.try_get("payment_method")?;
    let delivery_raw: String = row.try_get("delivery_type")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        dorm_id: DormId::from_uuid(row.try_get::<Uuid, _>("dorm_id")?),
        status: decode(
            OrderStatus::from_str_value(&status_raw),
            "order status",
            &status_raw,
        )?,
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        notes: row.try_get("notes")?,
        payment_method: decode(
            PaymentMethod::from_str_value(&payment_raw),
            "payment method",
            &payment_raw,
        )?,
        delivery_type: decode(
            DeliveryType::from_str_value(&delivery_raw),
            "delivery type",
            &delivery_raw,
        )?,
        delivery_address: row.try_get("delivery_address")?,
        delivery_phone: row.try_get("delivery_phone")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: cents_to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_status_log(row: &PgRow) -> Result<OrderStatusLog> {
    let status_raw: String = row.try_get("status")?;
    Ok(OrderStatusLog {
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        status: decode(
            OrderStatus::from_str_value(&status_raw),
            "order status",
            &status_raw,
        )?,
        changed_by: row
            .try_get::<Option<Uuid>, _>("changed_by")?
            .map(UserId::from_uuid),
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_chat(row: &PgRow) -> Result<ChatMessage> {
    let sender_raw: String = row.try_get("sender")?;
    Ok(ChatMessage {
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        sender: decode(
            ChatSender::from_str_value(&sender_raw),
            "chat sender",
            &sender_raw,
        )?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_plan(row: &PgRow) -> Result<SubscriptionPlan> {
    Ok(SubscriptionPlan {
        id: PlanId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        duration_days: cents_to_u32(row.try_get("duration_days")?, "duration_days")?,
        max_products: cents_to_u32(row.try_get("max_products")?, "max_products")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_subscription(row: &PgRow) -> Result<SellerSubscription> {
    Ok(SellerSubscription {
        seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        plan_id: PlanId::from_uuid(row.try_get::<Uuid, _>("plan_id")?),
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Performs the conditional decrement inside an open transaction.
///
/// `UPDATE ... WHERE quantity >= amount` is the concurrency discipline:
/// the row lock serializes rival decrements and the predicate makes the
/// losing writer fail cleanly instead of driving the quantity negative.
async fn decrement_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    amount: u32,
) -> Result<StockDecrement> {
    if amount == 0 {
        return Err(StoreError::InvalidAmount { amount });
    }

    let remaining: Option<i32> = sqlx::query_scalar(
        "UPDATE stocks SET quantity = quantity - $2 WHERE product_id = $1 AND quantity >= $2 \
         RETURNING quantity",
    )
    .bind(product_id.as_uuid())
    .bind(amount as i32)
    .fetch_optional(&mut **tx)
    .await?;

    match remaining {
        Some(quantity) => {
            let out_of_stock = quantity == 0;
            if out_of_stock {
                sqlx::query(
                    "UPDATE products SET is_out_of_stock = TRUE, is_active = FALSE WHERE id = $1",
                )
                .bind(product_id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            Ok(StockDecrement {
                product_id,
                remaining: cents_to_u32(quantity, "quantity")?,
                out_of_stock,
            })
        }
        None => {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT quantity FROM stocks WHERE product_id = $1")
                    .bind(product_id.as_uuid())
                    .fetch_optional(&mut **tx)
                    .await?;
            match available {
                Some(available) => Err(StoreError::InsufficientStock {
                    product_id,
                    requested: amount,
                    available: cents_to_u32(available, "quantity")?,
                }),
                None => Err(StoreError::NotFound {
                    entity: "stock",
                    id: product_id.to_string(),
                }),
            }
        }
    }
}

async fn append_status_log_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    log: &StatusLogEntry,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO order_status_logs (order_id, status, changed_by, note, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order_id.as_uuid())
    .bind(log.status.as_str())
    .bind(log.changed_by.map(|id| id.as_uuid()))
    .bind(&log.note)
    .bind(at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl MarketStore for PostgresStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, role, dorm_id, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.dorm_id.map(|id| id.as_uuid()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "user", user.id.to_string()))?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_user(&row))
            .transpose()
    }

    async fn upsert_seller_profile(&self, profile: SellerProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO seller_profiles \
             (user_id, dorm_id, phone, iban, notification_email, store_is_open, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id) DO UPDATE SET \
             dorm_id = EXCLUDED.dorm_id, phone = EXCLUDED.phone, iban = EXCLUDED.iban, \
             notification_email = EXCLUDED.notification_email, \
             store_is_open = EXCLUDED.store_is_open",
        )
        .bind(profile.user_id.as_uuid())
        .bind(profile.dorm_id.as_uuid())
        .bind(&profile.phone)
        .bind(&profile.iban)
        .bind(&profile.notification_email)
        .bind(profile.store_is_open)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_seller_profile(&self, seller_id: UserId) -> Result<Option<SellerProfile>> {
        sqlx::query("SELECT * FROM seller_profiles WHERE user_id = $1")
            .bind(seller_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_profile(&row))
            .transpose()
    }

    async fn insert_dorm(&self, dorm: Dorm) -> Result<()> {
        sqlx::query("INSERT INTO dorms (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(dorm.id.as_uuid())
            .bind(&dorm.name)
            .bind(dorm.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_db(e, "dorm", dorm.id.to_string()))?;
        Ok(())
    }

    async fn get_dorm(&self, id: DormId) -> Result<Option<Dorm>> {
        let row = sqlx::query("SELECT * FROM dorms WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| -> Result<Dorm> {
                Ok(Dorm {
                    id: DormId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    name: row.try_get("name")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .transpose()?)
    }

    async fn insert_category(&self, category: Category) -> Result<()> {
        sqlx::query(
            "INSERT INTO categories (id, dorm_id, name, slug, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(category.id.as_uuid())
        .bind(category.dorm_id.as_uuid())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "category", category.id.to_string()))?;
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| -> Result<Category> {
                Ok(Category {
                    id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    dorm_id: DormId::from_uuid(row.try_get::<Uuid, _>("dorm_id")?),
                    name: row.try_get("name")?,
                    slug: row.try_get("slug")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .transpose()?)
    }

    async fn insert_product(&self, product: Product, quantity: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO products \
             (id, seller_id, dorm_id, category_id, name, description, price_cents, \
              is_active, is_out_of_stock, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(product.id.as_uuid())
        .bind(product.seller_id.as_uuid())
        .bind(product.dorm_id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.is_active)
        .bind(product.is_out_of_stock)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_db(e, "product", product.id.to_string()))?;

        sqlx::query("INSERT INTO stocks (product_id, quantity) VALUES ($1, $2)")
            .bind(product.id.as_uuid())
            .bind(quantity as i32)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_product(&row))
            .transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query("SELECT * FROM products WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price_cents = $4, \
             category_id = $5, is_active = $6, is_out_of_stock = $7 WHERE id = $1",
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.category_id.as_uuid())
        .bind(product.is_active)
        .bind(product.is_out_of_stock)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::Conflict {
                        entity: "product",
                        id: id.to_string(),
                    };
                }
                StoreError::Database(e)
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn products_for_dorm(&self, dorm_id: DormId) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT * FROM products WHERE dorm_id = $1 ORDER BY name")
            .bind(dorm_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn products_for_seller(&self, seller_id: UserId) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT * FROM products WHERE seller_id = $1 ORDER BY name")
            .bind(seller_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn count_active_products(&self, seller_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE seller_id = $1 AND is_active = TRUE",
        )
        .bind(seller_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn stock_quantity(&self, product_id: ProductId) -> Result<Option<u32>> {
        let quantity: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM stocks WHERE product_id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        quantity
            .map(|q| cents_to_u32(q, "quantity"))
            .transpose()
    }

    async fn set_stock_quantity(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE stocks SET quantity = $2 WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .bind(quantity as i32)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "stock",
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    async fn decrease_stock(&self, product_id: ProductId, amount: u32) -> Result<StockDecrement> {
        let mut tx = self.pool.begin().await?;
        let decrement = decrement_in_tx(&mut tx, product_id, amount).await?;
        tx.commit().await?;
        metrics::counter!("store_stock_decrements").increment(1);
        Ok(decrement)
    }

    async fn create_order(&self, order: NewOrder) -> Result<CreatedOrder> {
        let order_id = OrderId::new();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders \
             (id, customer_id, seller_id, dorm_id, status, total_cents, notes, \
              payment_method, delivery_type, delivery_address, delivery_phone, created_at) \
             VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order_id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.seller_id.as_uuid())
        .bind(order.dorm_id.as_uuid())
        .bind(OrderStatus::Pending.as_str())
        .bind(&order.notes)
        .bind(order.payment_method.as_str())
        .bind(order.delivery_type.as_str())
        .bind(&order.delivery_address)
        .bind(&order.delivery_phone)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut decrements = Vec::with_capacity(order.items.len());
        let mut items = Vec::with_capacity(order.items.len());
        let mut total = Money::zero();

        for item in &order.items {
            // Any failure here drops the transaction: no order, no items,
            // no earlier decrements survive.
            decrements.push(decrement_in_tx(&mut tx, item.product_id, item.quantity).await?);

            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;

            total += item.unit_price.multiply(item.quantity);
            items.push(OrderItem {
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        sqlx::query("UPDATE orders SET total_cents = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(total.cents())
            .execute(&mut *tx)
            .await?;

        append_status_log_in_tx(
            &mut tx,
            order_id,
            &StatusLogEntry {
                status: OrderStatus::Pending,
                changed_by: Some(order.customer_id),
                note: String::new(),
            },
            now,
        )
        .await?;

        tx.commit().await?;
        metrics::counter!("store_orders_created").increment(1);

        Ok(CreatedOrder {
            order: Order {
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
            },
            items,
            decrements,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_order(&row))
            .transpose()
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_order_item).collect()
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>> {
        let rows =
            sqlx::query("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
                .bind(customer_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn orders_for_seller(&self, seller_id: UserId) -> Result<Vec<Order>> {
        let rows =
            sqlx::query("SELECT * FROM orders WHERE seller_id = $1 ORDER BY created_at DESC")
                .bind(seller_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn orders_for_dorm_since(
        &self,
        dorm_id: DormId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE dorm_id = $1 AND created_at >= $2 \
             ORDER BY created_at DESC",
        )
        .bind(dorm_id.as_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        log: StatusLogEntry,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 RETURNING *")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;
        let order = row_to_order(&row)?;

        append_status_log_in_tx(&mut tx, order_id, &log, Utc::now()).await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn status_logs(&self, order_id: OrderId) -> Result<Vec<OrderStatusLog>> {
        let rows = sqlx::query("SELECT * FROM order_status_logs WHERE order_id = $1 ORDER BY id")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_status_log).collect()
    }

    async fn insert_chat_message(&self, message: ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (order_id, sender, message, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(message.order_id.as_uuid())
        .bind(message.sender.as_str())
        .bind(&message.message)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn chat_messages(&self, order_id: OrderId) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query("SELECT * FROM chat_messages WHERE order_id = $1 ORDER BY id")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_chat).collect()
    }

    async fn insert_plan(&self, plan: SubscriptionPlan) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscription_plans \
             (id, name, price_cents, duration_days, max_products, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(plan.price.cents())
        .bind(plan.duration_days as i32)
        .bind(plan.max_products as i32)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "plan", plan.id.to_string()))?;
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<SubscriptionPlan>> {
        sqlx::query("SELECT * FROM subscription_plans WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_plan(&row))
            .transpose()
    }

    async fn insert_subscription(&self, subscription: SellerSubscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO seller_subscriptions (seller_id, plan_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(subscription.seller_id.as_uuid())
        .bind(subscription.plan_id.as_uuid())
        .bind(subscription.expires_at)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_subscription(
        &self,
        seller_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SellerSubscription>> {
        sqlx::query(
            "SELECT * FROM seller_subscriptions WHERE seller_id = $1 AND expires_at > $2 \
             ORDER BY expires_at DESC LIMIT 1",
        )
        .bind(seller_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row_to_subscription(&row))
        .transpose()
    }

    async fn upsert_usage(&self, seller_id: UserId, product_slots: u32) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_tracking (seller_id, product_slots) VALUES ($1, $2) \
             ON CONFLICT (seller_id) DO UPDATE SET product_slots = EXCLUDED.product_slots",
        )
        .bind(seller_id.as_uuid())
        .bind(product_slots as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn usage_for_seller(&self, seller_id: UserId) -> Result<Option<UsageTracking>> {
        let row = sqlx::query("SELECT * FROM usage_tracking WHERE seller_id = $1")
            .bind(seller_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| -> Result<UsageTracking> {
                Ok(UsageTracking {
                    seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
                    product_slots: cents_to_u32(
                        row.try_get("product_slots")?,
                        "product_slots",
                    )?,
                })
            })
            .transpose()?)
    }
}
