use crate::application::product_service::{ProductForm, ProductService};
use crate::data::product_repository::PostgresProductRepository;
use crate::domain::error::DomainError;
use crate::infrastructure::uploads::UploadStore;
use crate::presentation::dto::MessageResponse;
use crate::presentation::utils::AuthenticatedUser;
use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, web};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

const MAX_TEXT_FIELD_BYTES: usize = 16 * 1024;

pub async fn list_products(
    service: web::Data<ProductService<PostgresProductRepository>>,
) -> Result<HttpResponse, DomainError> {
    let products = service.list_all().await?;
    Ok(HttpResponse::Ok().json(products))
}

/// A seller's own inventory; there is no cross-seller view.
pub async fn my_store_products(
    user: AuthenticatedUser,
    service: web::Data<ProductService<PostgresProductRepository>>,
) -> Result<HttpResponse, DomainError> {
    let products = service.list_by_seller(user.id).await?;
    Ok(HttpResponse::Ok().json(products))
}

pub async fn create_product(
    user: AuthenticatedUser,
    service: web::Data<ProductService<PostgresProductRepository>>,
    uploads: web::Data<UploadStore>,
    mut payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let form = read_product_form(&uploads, &mut payload).await?;
    let product = service.create(&user, form).await?;

    info!(product_id = %product.id, seller_id = %user.id, "product created");

    Ok(HttpResponse::Created().json(product))
}

pub async fn update_product(
    user: AuthenticatedUser,
    service: web::Data<ProductService<PostgresProductRepository>>,
    uploads: web::Data<UploadStore>,
    path: web::Path<Uuid>,
    mut payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let product_id = path.into_inner();
    let form = read_product_form(&uploads, &mut payload).await?;
    let product = service.update(user.id, product_id, form).await?;

    info!(product_id = %product.id, seller_id = %user.id, "product updated");

    Ok(HttpResponse::Ok().json(product))
}

pub async fn delete_product(
    user: AuthenticatedUser,
    service: web::Data<ProductService<PostgresProductRepository>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let product_id = path.into_inner();
    service.delete(user.id, product_id).await?;

    info!(product_id = %product_id, seller_id = %user.id, "product deleted");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "product deleted".to_string(),
    }))
}

/// Parses a multipart product write. The image (if any) is committed to
/// the upload store while streaming; if a later part of the form turns
/// out to be malformed the committed file is rolled back before the
/// error leaves this function.
async fn read_product_form(
    uploads: &UploadStore,
    payload: &mut Multipart,
) -> Result<ProductForm, DomainError> {
    let mut form = ProductForm::default();
    if let Err(err) = fill_form(uploads, payload, &mut form).await {
        if let Some(image) = form.image.take() {
            uploads.rollback(&image.reference).await;
        }
        return Err(err);
    }
    Ok(form)
}

async fn fill_form(
    uploads: &UploadStore,
    payload: &mut Multipart,
    form: &mut ProductForm,
) -> Result<(), DomainError> {
    while let Some(mut field) = payload.try_next().await.map_err(bad_multipart)? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        match name.as_str() {
            "name" => form.name = Some(read_text(&mut field).await?),
            "description" => form.description = Some(read_text(&mut field).await?),
            "price" => {
                let raw = read_text(&mut field).await?;
                let price = raw.trim().parse::<Decimal>().map_err(|_| {
                    DomainError::Validation(format!("invalid price: {}", raw.trim()))
                })?;
                form.price = Some(price);
            }
            "image" => {
                if form.image.is_some() {
                    return Err(DomainError::Validation(
                        "exactly one image is accepted".into(),
                    ));
                }
                let content_type = field.content_type().cloned();
                let original_name = field
                    .content_disposition()
                    .get_filename()
                    .map(str::to_owned);
                let stored = uploads
                    .commit(content_type.as_ref(), original_name.as_deref(), &mut field)
                    .await?;
                form.image = Some(stored);
            }
            _ => drain(&mut field).await?,
        }
    }
    Ok(())
}

async fn read_text(field: &mut Field) -> Result<String, DomainError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
        buf.extend_from_slice(&chunk);
        if buf.len() > MAX_TEXT_FIELD_BYTES {
            return Err(DomainError::Validation("text field is too large".into()));
        }
    }
    String::from_utf8(buf)
        .map_err(|_| DomainError::Validation("text field is not valid UTF-8".into()))
}

async fn drain(field: &mut Field) -> Result<(), DomainError> {
    while field.try_next().await.map_err(bad_multipart)?.is_some() {}
    Ok(())
}

fn bad_multipart(err: actix_multipart::MultipartError) -> DomainError {
    DomainError::Validation(format!("malformed multipart body: {}", err))
}
