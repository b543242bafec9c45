use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, FromRequest, HttpRequest, web};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::application::auth_service::AuthService;
use crate::data::user_repository::PostgresUserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::UserProfile;
use crate::infrastructure::security::JwtKeys;

/// The identity resolved from the request's bearer token, handed to
/// handlers as an explicit value rather than ambient request state.
/// Extraction verifies the token and loads the user, so a handler that
/// takes this argument is a protected route.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserProfile);

impl Deref for AuthenticatedUser {
    type Target = UserProfile;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let auth_service = req
            .app_data::<web::Data<AuthService<PostgresUserRepository>>>()
            .cloned();
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Box::pin(async move {
            let auth_service = auth_service
                .ok_or_else(|| actix_web::error::ErrorInternalServerError("AuthService missing"))?;

            let header = header.ok_or(DomainError::Unauthorized)?;
            let token = header
                .strip_prefix("Bearer ")
                .ok_or(DomainError::Unauthorized)?;

            extract_user_from_token(token, auth_service.keys(), auth_service.get_ref()).await
        })
    }
}

/// Verifies the token and resolves it to a live user. Every failure mode
/// (bad signature, expiry, deleted user) collapses into `Unauthorized`.
pub async fn extract_user_from_token(
    token: &str,
    keys: &JwtKeys,
    auth_service: &AuthService<PostgresUserRepository>,
) -> Result<AuthenticatedUser, Error> {
    let claims = keys
        .verify_token(token)
        .map_err(|_| DomainError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| DomainError::Unauthorized)?;

    let user = auth_service
        .get_user(user_id)
        .await
        .map_err(|_| DomainError::Unauthorized)?;

    Ok(AuthenticatedUser(user.into()))
}
