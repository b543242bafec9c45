use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::data::cart_repository::CartRepository;
use crate::domain::cart::{Cart, cart_total};
use crate::domain::error::DomainError;

#[derive(Clone)]
pub struct CartService<R: CartRepository + 'static> {
    repo: Arc<R>,
}

impl<R> CartService<R>
where
    R: CartRepository + 'static,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// The total is derived on every read from current product prices,
    /// never stored.
    pub async fn get_cart(&self, user_id: Uuid) -> Result<Cart, DomainError> {
        let items = self.repo.lines_for_user(user_id).await?;
        let total = cart_total(&items);
        Ok(Cart { items, total })
    }

    #[instrument(skip(self))]
    pub async fn put_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, DomainError> {
        if quantity < 1 {
            return Err(DomainError::Validation(
                "quantity must be at least 1".into(),
            ));
        }
        self.repo.upsert_item(user_id, product_id, quantity).await?;
        self.get_cart(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<Cart, DomainError> {
        self.repo.remove_item(user_id, product_id).await?;
        self.get_cart(user_id).await
    }
}
