use crate::domain::error::DomainError;
use crate::domain::product::{Product, ProductListing};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

/// Partial update applied with COALESCE; absent fields keep their
/// stored value.
#[derive(Debug, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_path: Option<String>,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: Product) -> Result<Product, DomainError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DomainError>;
    async fn list_all(&self) -> Result<Vec<ProductListing>, DomainError>;
    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>, DomainError>;
    /// Conditional update scoped to the owner: one atomic statement, no
    /// read-then-write race on the ownership check. `None` when no row
    /// matched both id and seller.
    async fn update_owned(
        &self,
        id: Uuid,
        seller_id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, DomainError>;
    /// Owner-scoped delete; returns the stored image path when a row was
    /// deleted.
    async fn delete_owned(
        &self,
        id: Uuid,
        seller_id: Uuid,
    ) -> Result<Option<Option<String>>, DomainError>;
    async fn exists(&self, id: Uuid) -> Result<bool, DomainError>;
}

#[derive(Clone)]
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn insert(&self, product: Product) -> Result<Product, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, seller_id, store_name, name, description, price, image_path, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            "#,
        )
        .bind(product.id)
        .bind(product.seller_id)
        .bind(&product.store_name)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image_path)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create product: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        info!(product_id = %product.id, seller_id = %product.seller_id, "product created");
        Ok(product)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, seller_id, store_name, name, description, price, image_path,
                   created_at, updated_at
            FROM products WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error find_by_id {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn list_all(&self) -> Result<Vec<ProductListing>, DomainError> {
        sqlx::query_as::<_, ProductListing>(
            r#"
            SELECT p.id, p.seller_id, p.store_name, u.name AS seller_name,
                   p.name, p.description, p.price, p.image_path,
                   p.created_at, p.updated_at
            FROM products p
            JOIN users u ON u.id = p.seller_id
            ORDER BY p.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while listing products: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>, DomainError> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, seller_id, store_name, name, description, price, image_path,
                   created_at, updated_at
            FROM products
            WHERE seller_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while listing seller products: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn update_owned(
        &self,
        id: Uuid,
        seller_id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, DomainError> {
        let now = Utc::now();
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                image_path = COALESCE($4, image_path),
                updated_at = $5
            WHERE id = $6 AND seller_id = $7
            RETURNING id, seller_id, store_name, name, description, price, image_path,
                      created_at, updated_at
            "#,
        )
        .bind(update.name)
        .bind(update.description)
        .bind(update.price)
        .bind(update.image_path)
        .bind(now)
        .bind(id)
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update product {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })?;

        if product.is_some() {
            info!(product_id = %id, "product updated");
        }

        Ok(product)
    }

    async fn delete_owned(
        &self,
        id: Uuid,
        seller_id: Uuid,
    ) -> Result<Option<Option<String>>, DomainError> {
        let deleted = sqlx::query_scalar::<_, Option<String>>(
            r#"
            DELETE FROM products
            WHERE id = $1 AND seller_id = $2
            RETURNING image_path
            "#,
        )
        .bind(id)
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to delete product {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })?;

        if deleted.is_some() {
            info!(product_id = %id, "product deleted");
        }

        Ok(deleted)
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))
    }
}
