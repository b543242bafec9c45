use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use crate::data::product_repository::{ProductRepository, ProductUpdate};
use crate::domain::error::DomainError;
use crate::domain::product::{Product, ProductListing};
use crate::domain::user::{Role, UserProfile};
use crate::infrastructure::uploads::{StoredImage, UploadStore};

/// Fields parsed from a multipart product write. Everything is optional
/// at this level; `create` enforces what a new product needs.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<StoredImage>,
}

#[derive(Clone)]
pub struct ProductService<R: ProductRepository + 'static> {
    repo: Arc<R>,
    uploads: UploadStore,
}

impl<R> ProductService<R>
where
    R: ProductRepository + 'static,
{
    pub fn new(repo: Arc<R>, uploads: UploadStore) -> Self {
        Self { repo, uploads }
    }

    pub async fn list_all(&self) -> Result<Vec<ProductListing>, DomainError> {
        self.repo.list_all().await
    }

    pub async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>, DomainError> {
        self.repo.list_by_seller(seller_id).await
    }

    /// Creates a product owned by the seller. Any failure after the image
    /// was committed rolls the file back so no orphan accumulates.
    #[instrument(skip(self, seller, form))]
    pub async fn create(
        &self,
        seller: &UserProfile,
        mut form: ProductForm,
    ) -> Result<Product, DomainError> {
        let image = form.image.take();
        match self.validate_and_insert(seller, form, image.as_ref()).await {
            Ok(product) => Ok(product),
            Err(err) => {
                if let Some(image) = image {
                    self.uploads.rollback(&image.reference).await;
                }
                Err(err)
            }
        }
    }

    async fn validate_and_insert(
        &self,
        seller: &UserProfile,
        form: ProductForm,
        image: Option<&StoredImage>,
    ) -> Result<Product, DomainError> {
        if seller.role != Role::Seller {
            return Err(DomainError::Forbidden);
        }
        let image = image.ok_or_else(|| DomainError::Validation("an image is required".into()))?;
        let name = form
            .name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::Validation("a product name is required".into()))?;
        let price = form
            .price
            .ok_or_else(|| DomainError::Validation("a price is required".into()))?;
        if price < Decimal::ZERO {
            return Err(DomainError::Validation("price must not be negative".into()));
        }

        // Display-only snapshot; ownership checks always use seller_id.
        let store_name = seller
            .store_name
            .clone()
            .unwrap_or_else(|| seller.name.clone());
        let product = Product::new(
            seller.id,
            store_name,
            name,
            form.description.unwrap_or_default(),
            price,
            Some(image.reference.clone()),
        );
        self.repo.insert(product).await
    }

    /// Owner-scoped conditional update. A replaced image's old file is
    /// deleted best-effort after the row is written; a new image is
    /// rolled back when the update does not go through.
    #[instrument(skip(self, form))]
    pub async fn update(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        mut form: ProductForm,
    ) -> Result<Product, DomainError> {
        let new_image = form.image.take();
        match self
            .apply_update(user_id, product_id, form, new_image.as_ref())
            .await
        {
            Ok(product) => Ok(product),
            Err(err) => {
                if let Some(image) = new_image {
                    self.uploads.rollback(&image.reference).await;
                }
                Err(err)
            }
        }
    }

    async fn apply_update(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        form: ProductForm,
        new_image: Option<&StoredImage>,
    ) -> Result<Product, DomainError> {
        if let Some(price) = form.price {
            if price < Decimal::ZERO {
                return Err(DomainError::Validation("price must not be negative".into()));
            }
        }

        // Old reference captured for cleanup only; authorization happens
        // in the conditional update below.
        let previous_image = if new_image.is_some() {
            self.repo
                .find_by_id(product_id)
                .await?
                .and_then(|p| p.image_path)
        } else {
            None
        };

        let update = ProductUpdate {
            name: form.name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            description: form.description,
            price: form.price,
            image_path: new_image.map(|i| i.reference.clone()),
        };

        match self.repo.update_owned(product_id, user_id, update).await? {
            Some(product) => {
                if let Some(old) = previous_image {
                    if product.image_path.as_deref() != Some(old.as_str()) {
                        self.uploads.remove(&old).await;
                    }
                }
                Ok(product)
            }
            None => Err(self.not_owned_error(product_id).await),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, product_id: Uuid) -> Result<(), DomainError> {
        match self.repo.delete_owned(product_id, user_id).await? {
            Some(image_path) => {
                if let Some(reference) = image_path {
                    self.uploads.remove(&reference).await;
                }
                Ok(())
            }
            None => Err(self.not_owned_error(product_id).await),
        }
    }

    /// The conditional statement matched nothing: either the product is
    /// gone or it belongs to someone else.
    async fn not_owned_error(&self, product_id: Uuid) -> DomainError {
        match self.repo.exists(product_id).await {
            Ok(true) => DomainError::Forbidden,
            Ok(false) => DomainError::ProductNotFound(product_id),
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::web::Bytes;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures_util::stream;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct InMemoryProductRepository {
        products: Mutex<HashMap<Uuid, Product>>,
        fail_insert: AtomicBool,
    }

    #[async_trait]
    impl ProductRepository for InMemoryProductRepository {
        async fn insert(&self, product: Product) -> Result<Product, DomainError> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(DomainError::Internal("insert failed".into()));
            }
            self.products
                .lock()
                .unwrap()
                .insert(product.id, product.clone());
            Ok(product)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
            Ok(self.products.lock().unwrap().get(&id).cloned())
        }

        async fn list_all(&self) -> Result<Vec<ProductListing>, DomainError> {
            Ok(Vec::new())
        }

        async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>, DomainError> {
            Ok(self
                .products
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.seller_id == seller_id)
                .cloned()
                .collect())
        }

        async fn update_owned(
            &self,
            id: Uuid,
            seller_id: Uuid,
            update: ProductUpdate,
        ) -> Result<Option<Product>, DomainError> {
            let mut products = self.products.lock().unwrap();
            match products.get_mut(&id) {
                Some(p) if p.seller_id == seller_id => {
                    if let Some(name) = update.name {
                        p.name = name;
                    }
                    if let Some(description) = update.description {
                        p.description = description;
                    }
                    if let Some(price) = update.price {
                        p.price = price;
                    }
                    if let Some(image_path) = update.image_path {
                        p.image_path = Some(image_path);
                    }
                    p.updated_at = Utc::now();
                    Ok(Some(p.clone()))
                }
                _ => Ok(None),
            }
        }

        async fn delete_owned(
            &self,
            id: Uuid,
            seller_id: Uuid,
        ) -> Result<Option<Option<String>>, DomainError> {
            let mut products = self.products.lock().unwrap();
            match products.get(&id) {
                Some(p) if p.seller_id == seller_id => {
                    let image = p.image_path.clone();
                    products.remove(&id);
                    Ok(Some(image))
                }
                _ => Ok(None),
            }
        }

        async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
            Ok(self.products.lock().unwrap().contains_key(&id))
        }
    }

    fn seller() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: "s1@shop.com".into(),
            name: "Sam".into(),
            role: Role::Seller,
            store_name: Some("Sam's Mugs".into()),
            created_at: Utc::now(),
        }
    }

    fn buyer() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: "b1@shop.com".into(),
            name: "Billie".into(),
            role: Role::Buyer,
            store_name: None,
            created_at: Utc::now(),
        }
    }

    struct Fixture {
        service: ProductService<InMemoryProductRepository>,
        repo: Arc<InMemoryProductRepository>,
        uploads: UploadStore,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::new(dir.path());
        let repo = Arc::new(InMemoryProductRepository::default());
        Fixture {
            service: ProductService::new(Arc::clone(&repo), uploads.clone()),
            repo,
            uploads,
            _dir: dir,
        }
    }

    async fn commit_image(uploads: &UploadStore, name: &str) -> StoredImage {
        let png: mime::Mime = "image/png".parse().unwrap();
        uploads
            .commit(
                Some(&png),
                Some(name),
                stream::iter(vec![Ok::<_, Infallible>(Bytes::from_static(b"png"))]),
            )
            .await
            .unwrap()
    }

    fn stored_files(uploads: &UploadStore) -> usize {
        std::fs::read_dir(uploads.root()).unwrap().count()
    }

    fn mug_form(image: Option<StoredImage>) -> ProductForm {
        ProductForm {
            name: Some("Mug".into()),
            description: Some("A mug".into()),
            price: Some(Decimal::new(999, 2)),
            image,
        }
    }

    #[tokio::test]
    async fn create_sets_owner_and_store_snapshot() {
        let fx = fixture();
        let seller = seller();
        let image = commit_image(&fx.uploads, "mug.png").await;
        let product = fx.service.create(&seller, mug_form(Some(image))).await.unwrap();

        assert_eq!(product.seller_id, seller.id);
        assert_eq!(product.store_name, "Sam's Mugs");
        assert_eq!(product.price, Decimal::new(999, 2));
        assert!(product.image_path.is_some());
    }

    #[tokio::test]
    async fn buyers_cannot_create_and_their_upload_is_rolled_back() {
        let fx = fixture();
        let image = commit_image(&fx.uploads, "mug.png").await;
        assert_eq!(stored_files(&fx.uploads), 1);

        let err = fx.service.create(&buyer(), mug_form(Some(image))).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
        assert_eq!(stored_files(&fx.uploads), 0);
    }

    #[tokio::test]
    async fn create_without_image_is_rejected() {
        let fx = fixture();
        let err = fx.service.create(&seller(), mug_form(None)).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_file_behind() {
        let fx = fixture();
        fx.repo.fail_insert.store(true, Ordering::SeqCst);
        let image = commit_image(&fx.uploads, "mug.png").await;

        let err = fx.service.create(&seller(), mug_form(Some(image))).await.unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        assert_eq!(stored_files(&fx.uploads), 0);
    }

    #[tokio::test]
    async fn only_the_owner_may_update() {
        let fx = fixture();
        let owner = seller();
        let image = commit_image(&fx.uploads, "mug.png").await;
        let product = fx.service.create(&owner, mug_form(Some(image))).await.unwrap();

        let intruder = seller();
        let update = ProductForm {
            price: Some(Decimal::new(1, 0)),
            ..ProductForm::default()
        };
        let err = fx
            .service
            .update(intruder.id, product.id, update)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        // Record unchanged.
        let unchanged = fx.repo.find_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.price, Decimal::new(999, 2));
    }

    #[tokio::test]
    async fn updating_a_missing_product_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .update(Uuid::new_v4(), Uuid::new_v4(), ProductForm::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn replacing_the_image_removes_the_old_file() {
        let fx = fixture();
        let owner = seller();
        let first = commit_image(&fx.uploads, "old.png").await;
        let product = fx.service.create(&owner, mug_form(Some(first))).await.unwrap();
        assert_eq!(stored_files(&fx.uploads), 1);

        let second = commit_image(&fx.uploads, "new.png").await;
        let new_reference = second.reference.clone();
        let update = ProductForm {
            image: Some(second),
            ..ProductForm::default()
        };
        let updated = fx.service.update(owner.id, product.id, update).await.unwrap();

        assert_eq!(updated.image_path.as_deref(), Some(new_reference.as_str()));
        assert_eq!(stored_files(&fx.uploads), 1);
    }

    #[tokio::test]
    async fn rejected_update_rolls_back_the_new_image() {
        let fx = fixture();
        let owner = seller();
        let first = commit_image(&fx.uploads, "old.png").await;
        let product = fx.service.create(&owner, mug_form(Some(first))).await.unwrap();

        let second = commit_image(&fx.uploads, "new.png").await;
        let update = ProductForm {
            image: Some(second),
            ..ProductForm::default()
        };
        let err = fx
            .service
            .update(Uuid::new_v4(), product.id, update)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
        // The old image stays, the rejected one is gone.
        assert_eq!(stored_files(&fx.uploads), 1);
    }

    #[tokio::test]
    async fn delete_removes_record_and_image() {
        let fx = fixture();
        let owner = seller();
        let image = commit_image(&fx.uploads, "mug.png").await;
        let product = fx.service.create(&owner, mug_form(Some(image))).await.unwrap();

        fx.service.delete(owner.id, product.id).await.unwrap();
        assert!(fx.repo.find_by_id(product.id).await.unwrap().is_none());
        assert_eq!(stored_files(&fx.uploads), 0);
    }

    #[tokio::test]
    async fn only_the_owner_may_delete() {
        let fx = fixture();
        let owner = seller();
        let image = commit_image(&fx.uploads, "mug.png").await;
        let product = fx.service.create(&owner, mug_form(Some(image))).await.unwrap();

        let err = fx
            .service
            .delete(Uuid::new_v4(), product.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
        assert!(fx.repo.find_by_id(product.id).await.unwrap().is_some());
        assert_eq!(stored_files(&fx.uploads), 1);
    }

    #[tokio::test]
    async fn deleting_a_missing_product_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .delete(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ProductNotFound(_)));
    }
}
