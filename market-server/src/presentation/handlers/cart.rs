use crate::application::cart_service::CartService;
use crate::data::cart_repository::PostgresCartRepository;
use crate::domain::error::DomainError;
use crate::presentation::dto::AddCartItemRequest;
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use tracing::info;
use uuid::Uuid;

pub async fn get_cart(
    user: AuthenticatedUser,
    service: web::Data<CartService<PostgresCartRepository>>,
) -> Result<HttpResponse, DomainError> {
    let cart = service.get_cart(user.id).await?;
    Ok(HttpResponse::Ok().json(cart))
}

pub async fn put_cart_item(
    user: AuthenticatedUser,
    service: web::Data<CartService<PostgresCartRepository>>,
    payload: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse, DomainError> {
    let cart = service
        .put_item(user.id, payload.product_id, payload.quantity)
        .await?;

    info!(user_id = %user.id, product_id = %payload.product_id, "cart item set");

    Ok(HttpResponse::Ok().json(cart))
}

pub async fn remove_cart_item(
    user: AuthenticatedUser,
    service: web::Data<CartService<PostgresCartRepository>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let product_id = path.into_inner();
    let cart = service.remove_item(user.id, product_id).await?;

    info!(user_id = %user.id, product_id = %product_id, "cart item removed");

    Ok(HttpResponse::Ok().json(cart))
}
