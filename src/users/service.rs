use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::error::ApiError;
use crate::users::dto::{
    is_valid_username, AdminCreateUserRequest, LoginRequest, LoginResponse, PublicUser,
    RegisterRequest, UpdateUserRequest,
};
use crate::users::model::{Role, User};
use crate::users::repo::UserStore;

/// Orchestrates the user lifecycle. State-free; one operation per call.
///
/// Everything returned from here is sanitized: the password hash stays in
/// the `User` document and never reaches a `PublicUser`.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_username(username: &str) -> Result<(), ApiError> {
    if !is_valid_username(username) {
        return Err(ApiError::validation(
            "Username may only contain letters, digits, '.', '-' and '_'",
        ));
    }
    Ok(())
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), ApiError> {
        if self.store.find_by_email(email).await?.is_some() {
            warn!(email = %email, "email already in use");
            return Err(ApiError::Conflict("Email already in use".into()));
        }
        Ok(())
    }

    async fn ensure_username_free(&self, username: &str) -> Result<(), ApiError> {
        if self.store.find_by_username(username).await?.is_some() {
            warn!(username = %username, "username already in use");
            return Err(ApiError::Conflict("Username already in use".into()));
        }
        Ok(())
    }

    /// Self-service registration. Role is always `user` and `image` is not
    /// settable on this path.
    pub async fn register(&self, req: RegisterRequest) -> Result<PublicUser, ApiError> {
        let email = normalize_email(&req.email);
        check_username(&req.username)?;
        self.ensure_email_free(&email).await?;
        self.ensure_username_free(&req.username).await?;

        let hash = hash_password(&req.password)?;
        let mut user = User::new(email, req.username, hash, Role::User);
        user.first_name = req.first_name;
        user.last_name = req.last_name;

        let user = self.store.insert(user).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    /// Admin-side create; an elevated caller may set role and image directly.
    pub async fn admin_create(&self, req: AdminCreateUserRequest) -> Result<PublicUser, ApiError> {
        let email = normalize_email(&req.email);
        check_username(&req.username)?;
        self.ensure_email_free(&email).await?;
        self.ensure_username_free(&req.username).await?;

        let hash = hash_password(&req.password)?;
        let mut user = User::new(email, req.username, hash, req.role.unwrap_or_default());
        user.first_name = req.first_name;
        user.last_name = req.last_name;
        user.image = req.image;

        let user = self.store.insert(user).await?;
        info!(user_id = %user.id, email = %user.email, role = %user.role, "user created by admin");
        Ok(user.into())
    }

    /// Unknown email is 404, wrong password 401 (preserved behavior).
    pub async fn login(&self, req: LoginRequest, keys: &JwtKeys) -> Result<LoginResponse, ApiError> {
        let email = normalize_email(&req.email);
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        if !verify_password(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }

        let token = keys.sign(&user)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<PublicUser, ApiError> {
        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        Ok(user.into())
    }

    pub async fn list(&self) -> Result<Vec<PublicUser>, ApiError> {
        let users = self.store.list().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    /// Partial update. Re-hashes the password when one is supplied and
    /// re-checks uniqueness when email or username change.
    pub async fn update(
        &self,
        id: Uuid,
        mut req: UpdateUserRequest,
    ) -> Result<PublicUser, ApiError> {
        let mut user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        req.email = req.email.map(|e| normalize_email(&e));
        if let Some(ref email) = req.email {
            if *email != user.email {
                self.ensure_email_free(email).await?;
            }
        }
        if let Some(ref username) = req.username {
            check_username(username)?;
            if *username != user.username {
                self.ensure_username_free(username).await?;
            }
        }

        let hash = match req.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };

        user.apply_update(req, hash);
        let user = self.store.update(user).await?;
        info!(user_id = %user.id, "user updated");
        Ok(user.into())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        if !self.store.delete(id).await? {
            return Err(ApiError::NotFound("User not found".into()));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::users::repo::InMemoryUserStore;

    fn make_service() -> (Arc<InMemoryUserStore>, UserService) {
        let store = Arc::new(InMemoryUserStore::new());
        (store.clone(), UserService::new(store))
    }

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        })
    }

    fn register_req(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            username: username.into(),
            password: "hunter2hunter2".into(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_forces_user_role() {
        let (_, service) = make_service();
        let user = service
            .register(register_req("  Jane@Example.COM ", "jane"))
            .await
            .unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_regardless_of_username() {
        let (_, service) = make_service();
        service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();

        let err = service
            .register(register_req("jane@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Email already in use"));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username() {
        let (_, service) = make_service();
        service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();

        let err = service
            .register(register_req("other@example.com", "jane"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Username already in use"));
    }

    #[tokio::test]
    async fn register_rejects_bad_username_charset() {
        let (_, service) = make_service();
        let err = service
            .register(register_req("jane@example.com", "jane doe"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[tokio::test]
    async fn registered_output_is_sanitized() {
        let (_, service) = make_service();
        let user = service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("hunter2hunter2"));
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_not_found() {
        let (_, service) = make_service();
        let err = service
            .login(
                LoginRequest {
                    email: "ghost@example.com".into(),
                    password: "whatever123".into(),
                },
                &make_keys(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let (_, service) = make_service();
        service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();

        let err = service
            .login(
                LoginRequest {
                    email: "jane@example.com".into(),
                    password: "wrong-password".into(),
                },
                &make_keys(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_issues_a_verifiable_token_and_sanitized_user() {
        let (_, service) = make_service();
        let keys = make_keys();
        let registered = service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();

        let response = service
            .login(
                LoginRequest {
                    email: "Jane@Example.com".into(),
                    password: "hunter2hunter2".into(),
                },
                &keys,
            )
            .await
            .unwrap();

        let claims = keys.verify(&response.token).unwrap();
        assert_eq!(claims.sub, registered.id);
        assert_eq!(claims.role, Role::User);

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn update_rehashes_password_and_never_echoes_it() {
        let (store, service) = make_service();
        let registered = service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();
        let old_hash = store
            .find_by_id(registered.id)
            .await
            .unwrap()
            .unwrap()
            .password_hash;

        let updated = service
            .update(
                registered.id,
                UpdateUserRequest {
                    password: Some("n3w-password!".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.find_by_id(registered.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, old_hash);
        assert!(verify_password("n3w-password!", &stored.password_hash).unwrap());

        let json = serde_json::to_string(&updated).unwrap();
        assert!(!json.contains("n3w-password!"));
        assert!(!json.contains(&stored.password_hash));
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let (_, service) = make_service();
        let err = service
            .update(Uuid::new_v4(), UpdateUserRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_conflicts_on_taken_email_but_not_own() {
        let (_, service) = make_service();
        let jane = service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();
        service
            .register(register_req("john@example.com", "john"))
            .await
            .unwrap();

        let err = service
            .update(
                jane.id,
                UpdateUserRequest {
                    email: Some("john@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // Re-submitting the current email is not a conflict.
        service
            .update(
                jane.id,
                UpdateUserRequest {
                    email: Some("jane@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_is_permanent_and_missing_ids_are_not_found() {
        let (_, service) = make_service();
        let err = service.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let user = service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();
        service.delete(user.id).await.unwrap();

        let err = service.get(user.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn admin_create_sets_role_and_image() {
        let (_, service) = make_service();
        let user = service
            .admin_create(AdminCreateUserRequest {
                email: "root@example.com".into(),
                username: "root".into(),
                password: "sup3r-secret".into(),
                first_name: None,
                last_name: None,
                role: Some(Role::Admin),
                image: Some("uploads/root.png".into()),
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.image.as_deref(), Some("uploads/root.png"));
    }

    #[tokio::test]
    async fn list_outputs_are_sanitized() {
        let (_, service) = make_service();
        service
            .register(register_req("jane@example.com", "jane"))
            .await
            .unwrap();
        service
            .register(register_req("john@example.com", "john"))
            .await
            .unwrap();

        let users = service.list().await.unwrap();
        assert_eq!(users.len(), 2);
        let json = serde_json::to_string(&users).unwrap();
        assert!(!json.contains("password"));
    }
}
