use std::sync::Arc;

use tracing::instrument;

use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::{Role, User, UserProfile};
use crate::infrastructure::security::{JwtKeys, hash_password, verify_password};
use crate::presentation::dto::RegisterRequest;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct AuthService<R: UserRepository + 'static> {
    repo: Arc<R>,
    keys: JwtKeys,
}

impl<R> AuthService<R>
where
    R: UserRepository + 'static,
{
    pub fn new(repo: Arc<R>, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn get_user(&self, id: uuid::Uuid) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound(id))
    }

    #[instrument(skip(self, req))]
    pub async fn register(
        &self,
        req: RegisterRequest,
    ) -> Result<(UserProfile, String), DomainError> {
        validate_registration(&req)?;

        let hash =
            hash_password(&req.password).map_err(|err| DomainError::Internal(err.to_string()))?;
        let store_name = match req.role {
            Role::Seller => req
                .store_name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            Role::Buyer => None,
        };
        let user = User::new(
            req.email.trim().to_lowercase(),
            hash,
            req.name.trim().to_string(),
            req.role,
            store_name,
        );
        let user = self.repo.create(user).await?;
        let token = self
            .keys
            .generate_token(user.id)
            .map_err(|err| DomainError::Internal(err.to_string()))?;

        Ok((user.into(), token))
    }

    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(UserProfile, String), DomainError> {
        // Unknown account and wrong password fail identically so the
        // response does not reveal which one it was.
        let user = self
            .repo
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        let valid = verify_password(password, &user.password_hash)
            .map_err(|_| DomainError::InvalidCredentials)?;
        if !valid {
            return Err(DomainError::InvalidCredentials);
        }

        let token = self
            .keys
            .generate_token(user.id)
            .map_err(|err| DomainError::Internal(err.to_string()))?;

        Ok((user.into(), token))
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), DomainError> {
    if req.email.trim().is_empty() {
        return Err(DomainError::Validation("email is required".into()));
    }
    if !is_valid_email(req.email.trim()) {
        return Err(DomainError::Validation("email is malformed".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if req.name.trim().is_empty() {
        return Err(DomainError::Validation("name is required".into()));
    }
    if req.role == Role::Seller
        && req
            .store_name
            .as_ref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        return Err(DomainError::Validation(
            "sellers must provide a store name".into(),
        ));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct InMemoryUserRepository {
        users: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn create(&self, user: User) -> Result<User, DomainError> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == user.email) {
                return Err(DomainError::EmailTaken);
            }
            users.push(user.clone());
            Ok(user)
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }
    }

    fn service() -> AuthService<InMemoryUserRepository> {
        AuthService::new(
            Arc::new(InMemoryUserRepository::default()),
            JwtKeys::new("test-secret".into()),
        )
    }

    fn seller_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "pw123456".into(),
            name: "Sam".into(),
            role: Role::Seller,
            store_name: Some("Sam's Mugs".into()),
        }
    }

    #[tokio::test]
    async fn register_issues_token_and_strips_password() {
        let service = service();
        let (profile, token) = service.register(seller_request("S1@shop.com")).await.unwrap();

        assert!(!token.is_empty());
        assert_eq!(profile.email, "s1@shop.com");
        assert_eq!(profile.role, Role::Seller);
        assert_eq!(profile.store_name.as_deref(), Some("Sam's Mugs"));
        let claims = service.keys().verify_token(&token).unwrap();
        assert_eq!(claims.sub, profile.id.to_string());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_on_second_attempt() {
        let service = service();
        service.register(seller_request("s1@shop.com")).await.unwrap();
        let err = service
            .register(seller_request("s1@shop.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EmailTaken));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let service = service();
        service.register(seller_request("s1@shop.com")).await.unwrap();

        let wrong_password = service
            .login("s1@shop.com", "not-the-password")
            .await
            .unwrap_err();
        let unknown_email = service
            .login("nobody@shop.com", "pw123456")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, DomainError::InvalidCredentials));
        assert!(matches!(unknown_email, DomainError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_succeeds_with_correct_credentials() {
        let service = service();
        service.register(seller_request("s1@shop.com")).await.unwrap();
        let (profile, token) = service.login("S1@shop.com", "pw123456").await.unwrap();
        assert_eq!(profile.email, "s1@shop.com");
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn buyer_store_name_is_dropped() {
        let service = service();
        let req = RegisterRequest {
            role: Role::Buyer,
            store_name: Some("should vanish".into()),
            ..seller_request("b1@shop.com")
        };
        let (profile, _) = service.register(req).await.unwrap();
        assert_eq!(profile.store_name, None);
    }

    #[test]
    fn registration_validation_rules() {
        let ok = seller_request("s1@shop.com");
        assert!(validate_registration(&ok).is_ok());

        let short_password = RegisterRequest {
            password: "pw12345".into(),
            ..seller_request("s1@shop.com")
        };
        assert!(matches!(
            validate_registration(&short_password),
            Err(DomainError::Validation(_))
        ));

        for bad in ["", "no-at.com", "local@", "@shop.com", "local@shop"] {
            let req = seller_request(bad);
            assert!(
                matches!(validate_registration(&req), Err(DomainError::Validation(_))),
                "email {:?} should be rejected",
                bad
            );
        }

        let no_store = RegisterRequest {
            store_name: None,
            ..seller_request("s1@shop.com")
        };
        assert!(matches!(
            validate_registration(&no_store),
            Err(DomainError::Validation(_))
        ));

        let blank_name = RegisterRequest {
            name: "  ".into(),
            ..seller_request("s1@shop.com")
        };
        assert!(matches!(
            validate_registration(&blank_name),
            Err(DomainError::Validation(_))
        ));

        let buyer_without_store = RegisterRequest {
            role: Role::Buyer,
            store_name: None,
            ..seller_request("b1@shop.com")
        };
        assert!(validate_registration(&buyer_without_store).is_ok());
    }
}
