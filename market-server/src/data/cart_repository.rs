use crate::domain::cart::CartLine;
use crate::domain::error::DomainError;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Cart lines joined against current product records, in the order
    /// items were added. An empty vec is an empty (lazily created) cart.
    async fn lines_for_user(&self, user_id: Uuid) -> Result<Vec<CartLine>, DomainError>;
    /// Inserts the item or replaces its quantity when the product is
    /// already in the cart.
    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), DomainError>;
    /// Idempotent; removing an absent item succeeds.
    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), DomainError>;
}

#[derive(Clone)]
pub struct PostgresCartRepository {
    pool: PgPool,
}

impl PostgresCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PostgresCartRepository {
    async fn lines_for_user(&self, user_id: Uuid) -> Result<Vec<CartLine>, DomainError> {
        sqlx::query_as::<_, CartLine>(
            r#"
            SELECT c.product_id, p.name, p.price, p.image_path, c.quantity
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.added_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching cart: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .and_then(|db| db.constraint())
                .map(|c| c.contains("cart_items_product_id"))
                == Some(true)
            {
                DomainError::ProductNotFound(product_id)
            } else {
                error!("failed to upsert cart item: {}", e);
                DomainError::Internal(format!("database error: {}", e))
            }
        })?;

        info!(user_id = %user_id, product_id = %product_id, quantity, "cart item set");
        Ok(())
    }

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        info!(user_id = %user_id, product_id = %product_id, "cart item removed");
        Ok(())
    }
}
