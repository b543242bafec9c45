use crate::application::auth_service::AuthService;
use crate::data::user_repository::PostgresUserRepository;
use crate::domain::error::DomainError;
use crate::presentation::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, Responder, Scope, web};
use tracing::info;

pub fn scope() -> Scope {
    web::scope("/auth")
        .route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/me", web::get().to(me))
}

pub async fn register(
    service: web::Data<AuthService<PostgresUserRepository>>,
    payload: web::Json<RegisterRequest>,
) -> Result<impl Responder, DomainError> {
    let (user, token) = service.register(payload.into_inner()).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");

    Ok(HttpResponse::Created().json(AuthResponse { token, user }))
}

pub async fn login(
    service: web::Data<AuthService<PostgresUserRepository>>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, DomainError> {
    let payload = payload.into_inner();
    let (user, token) = service.login(&payload.email, &payload.password).await?;

    info!(user_id = %user.id, "user logged in");

    Ok(HttpResponse::Ok().json(AuthResponse { token, user }))
}

/// Taking `AuthenticatedUser` makes this a protected route; extraction
/// already verified the token and loaded the user.
pub async fn me(user: AuthenticatedUser) -> Result<impl Responder, DomainError> {
    Ok(HttpResponse::Ok().json(user.0))
}
