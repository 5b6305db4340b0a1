//! Sign-in, registration and the second factor.
//!
//! A password check alone yields a full session only for users without a
//! second factor. Everyone else receives a short-lived pending token which
//! [`AuthSession::verify_second_factor`] trades for a full one.

use api_protocol::{EnableSecondFactorResponse, RegisterRequest, SessionResponse, UserInfo};
use chrono::{Duration, Utc};
use entities::{Role, SignupCode, User};
use inventory_store::{InventoryStore, UserChanges};

use crate::error::{ServerError, ServerResult};
use crate::services::validation::{duplicate_email, optional_text, validate_email, validate_password};
use crate::state::AppState;

/// Credential checks and session issuance.
pub struct AuthSession<'a, S: InventoryStore> {
    state: &'a AppState<S>,
}

impl<'a, S: InventoryStore> AuthSession<'a, S> {
    pub fn new(state: &'a AppState<S>) -> Self {
        Self { state }
    }

    /// Verifies an email and password pair.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServerResult<User> {
        let user = self
            .state
            .store
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| ServerError::NotFound("User not found".to_string()))?;

        if !auth::verify_password(password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "Password rejected");
            return Err(ServerError::InvalidCredentials(
                "Invalid email or password".to_string(),
            ));
        }
        if !user.is_active() {
            tracing::info!(user_id = %user.id, "Sign-in attempt on disabled account");
            return Err(ServerError::PermissionDenied("Account is disabled".to_string()));
        }

        Ok(user)
    }

    /// Signs a user in, stopping at the second factor when one is enabled.
    pub async fn login(&self, email: &str, password: &str) -> ServerResult<SessionResponse> {
        let user = self.authenticate(email, password).await?;

        if user.two_factor_enabled {
            let token = self
                .state
                .jwt_manager
                .generate_pending_token(user.id, user.email.clone())?;
            tracing::info!(user_id = %user.id, "Second factor challenged");
            return Ok(SessionResponse {
                token,
                second_factor_required: true,
                expires_in: (auth::PENDING_SECOND_FACTOR_MINUTES * 60) as u64,
                user: UserInfo::from(&user),
            });
        }

        self.start_session(user).await
    }

    /// Completes a pending sign-in with a one-time code.
    pub async fn verify_second_factor(&self, user: User, code: &str) -> ServerResult<SessionResponse> {
        let Some(secret) = user.two_factor_secret.as_deref().filter(|_| user.two_factor_enabled)
        else {
            return Err(ServerError::InvalidOperation(
                "Second factor is not enabled".to_string(),
            ));
        };

        if !auth::verify_totp(secret, code, Utc::now().timestamp())? {
            tracing::info!(user_id = %user.id, "Second-factor code rejected");
            return Err(ServerError::InvalidCredentials(
                "Invalid second-factor code".to_string(),
            ));
        }

        self.start_session(user).await
    }

    /// Creates an account by redeeming a signup code.
    ///
    /// The code is taken in one atomic step, so two concurrent registrations
    /// cannot both redeem it.
    pub async fn register(&self, request: RegisterRequest) -> ServerResult<User> {
        let email = validate_email(&request.email)?;
        validate_password(&request.password, Some(&request.confirm_password))?;

        let store = &self.state.store;
        if store.get_user_by_email(&email).await?.is_some() {
            return Err(ServerError::DuplicateEmail(email));
        }

        let now = Utc::now();
        let code = store
            .take_signup_code(request.signup_code.trim(), now)
            .await?
            .ok_or(ServerError::InvalidCode)?;

        let mut user = User::new(&email, auth::hash_password(&request.password)?)
            .with_role(code.granted_role());
        user.name = optional_text(Some(request.name));

        let user = store
            .create_user(user)
            .await
            .map_err(duplicate_email(&email))?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Generates a fresh secret for the user. The second factor stays off
    /// until [`AuthSession::confirm_second_factor`] sees a valid code.
    pub async fn begin_second_factor(
        &self,
        user: User,
    ) -> ServerResult<EnableSecondFactorResponse> {
        if user.two_factor_enabled {
            return Err(ServerError::InvalidOperation(
                "Second factor is already enabled".to_string(),
            ));
        }

        let secret = auth::generate_totp_secret();
        let provisioning_url =
            auth::provisioning_url(&self.state.config.totp_issuer, &user.email, &secret)?;

        self.state
            .store
            .update_user(user.id, UserChanges::second_factor(false, Some(secret.clone())))
            .await?;

        Ok(EnableSecondFactorResponse {
            secret,
            provisioning_url,
        })
    }

    /// Turns the second factor on once the user proves they hold the secret.
    pub async fn confirm_second_factor(&self, user: User, code: &str) -> ServerResult<User> {
        if user.two_factor_enabled {
            return Err(ServerError::InvalidOperation(
                "Second factor is already enabled".to_string(),
            ));
        }
        let Some(secret) = user.two_factor_secret.as_deref() else {
            return Err(ServerError::InvalidOperation(
                "Start second-factor enrolment first".to_string(),
            ));
        };
        if !auth::verify_totp(secret, code, Utc::now().timestamp())? {
            return Err(ServerError::InvalidCredentials(
                "Invalid second-factor code".to_string(),
            ));
        }

        let user = self
            .state
            .store
            .update_user(user.id, UserChanges::second_factor(true, Some(secret.to_string())))
            .await?;
        tracing::info!(user_id = %user.id, "Second factor enabled");
        Ok(user)
    }

    /// Turns the second factor off. Requires a current code.
    pub async fn disable_second_factor(&self, user: User, code: &str) -> ServerResult<User> {
        let Some(secret) = user.two_factor_secret.as_deref().filter(|_| user.two_factor_enabled)
        else {
            return Err(ServerError::InvalidOperation(
                "Second factor is not enabled".to_string(),
            ));
        };
        if !auth::verify_totp(secret, code, Utc::now().timestamp())? {
            return Err(ServerError::InvalidCredentials(
                "Invalid second-factor code".to_string(),
            ));
        }

        let user = self
            .state
            .store
            .update_user(user.id, UserChanges::second_factor(false, None))
            .await?;
        tracing::info!(user_id = %user.id, "Second factor disabled");
        Ok(user)
    }

    /// Issues a signup code valid for the configured lifetime.
    pub async fn issue_signup_code(
        &self,
        role: Option<Role>,
    ) -> ServerResult<SignupCode> {
        let store = &self.state.store;
        let purged = store.purge_expired_signup_codes(Utc::now()).await?;
        if purged > 0 {
            tracing::debug!(purged, "Expired signup codes purged");
        }

        let ttl = Duration::hours(self.state.config.signup_code_ttl_hours);
        let mut code = SignupCode::new(auth::generate_signup_code(), ttl);
        code.role = role;

        let code = store.create_signup_code(code).await?;
        tracing::info!(code_id = %code.id, role = ?code.role, "Signup code issued");
        Ok(code)
    }

    async fn start_session(&self, user: User) -> ServerResult<SessionResponse> {
        let token = self
            .state
            .jwt_manager
            .generate_token(user.id, user.email.clone())?;

        let user = self
            .state
            .store
            .update_user(user.id, UserChanges::last_login(Utc::now()))
            .await?;
        tracing::info!(user_id = %user.id, "Session started");

        Ok(SessionResponse {
            token,
            second_factor_required: false,
            expires_in: self.state.jwt_manager.expiration_seconds(),
            user: UserInfo::from(&user),
        })
    }
}

#[cfg(test)]
mod tests {
    use inventory_store::MemoryInventoryStore;

    use super::*;
    use crate::config::Config;

    fn state() -> AppState<MemoryInventoryStore> {
        let config = Config::new("test-secret-key-must-be-long-enough-for-security");
        let jwt = auth::JwtManager::new(auth::JwtConfig::new(config.jwt_secret.clone()));
        AppState::new(config, MemoryInventoryStore::new(), jwt)
    }

    async fn seed_user(state: &AppState<MemoryInventoryStore>, email: &str, password: &str) -> User {
        let user = User::new(email, auth::hash_password(password).unwrap());
        state.store.create_user(user).await.unwrap()
    }

    fn register_request(email: &str, code: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "s3cret!".to_string(),
            confirm_password: "s3cret!".to_string(),
            signup_code: code.to_string(),
            name: "New Person".to_string(),
        }
    }

    #[tokio::test]
    async fn test_authenticate_outcomes() {
        let state = state();
        seed_user(&state, "ada@example.com", "correct horse").await;
        let session = AuthSession::new(&state);

        let user = session
            .authenticate("ADA@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");

        assert!(matches!(
            session.authenticate("ada@example.com", "wrong").await,
            Err(ServerError::InvalidCredentials(_))
        ));
        assert!(matches!(
            session.authenticate("nobody@example.com", "x").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_signup_code_is_single_use() {
        let state = state();
        state
            .store
            .create_signup_code(SignupCode::new("abc", Duration::hours(1)).with_role(Role::Editor))
            .await
            .unwrap();
        let session = AuthSession::new(&state);

        let user = session
            .register(register_request("first@example.com", "abc"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Editor);
        assert_eq!(user.name.as_deref(), Some("New Person"));

        let err = session
            .register(register_request("second@example.com", "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidCode));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_without_burning_code() {
        let state = state();
        seed_user(&state, "taken@example.com", "whatever").await;
        state
            .store
            .create_signup_code(SignupCode::new("xyz", Duration::hours(1)))
            .await
            .unwrap();
        let session = AuthSession::new(&state);

        let err = session
            .register(register_request("Taken@Example.com", "xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::DuplicateEmail(_)));

        let user = session
            .register(register_request("fresh@example.com", "xyz"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_register_validates_before_consuming() {
        let state = state();
        state
            .store
            .create_signup_code(SignupCode::new("keep", Duration::hours(1)))
            .await
            .unwrap();
        let session = AuthSession::new(&state);

        let mut mismatched = register_request("a@example.com", "keep");
        mismatched.confirm_password = "different".to_string();
        assert!(matches!(
            session.register(mismatched).await,
            Err(ServerError::InvalidRequest(_))
        ));

        assert!(session.register(register_request("a@example.com", "keep")).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_factor_flow() {
        let state = state();
        let user = seed_user(&state, "otp@example.com", "password1").await;
        let session = AuthSession::new(&state);

        let enrolment = session.begin_second_factor(user.clone()).await.unwrap();
        assert!(enrolment.provisioning_url.starts_with("otpauth://totp/"));

        // Not active until confirmed.
        let login = session.login("otp@example.com", "password1").await.unwrap();
        assert!(!login.second_factor_required);

        let pending_user = state.store.get_user(user.id).await.unwrap().unwrap();
        let code = auth::totp_code(&enrolment.secret, Utc::now().timestamp()).unwrap();
        session
            .confirm_second_factor(pending_user, &code)
            .await
            .unwrap();

        let login = session.login("otp@example.com", "password1").await.unwrap();
        assert!(login.second_factor_required);
        let claims = state.jwt_manager.validate_token(&login.token).unwrap();
        assert!(!claims.is_complete());

        let enrolled = state.store.get_user(user.id).await.unwrap().unwrap();
        assert!(matches!(
            session.verify_second_factor(enrolled.clone(), "12345").await,
            Err(ServerError::InvalidCredentials(_))
        ));

        let code = auth::totp_code(&enrolment.secret, Utc::now().timestamp()).unwrap();
        let full = session.verify_second_factor(enrolled, &code).await.unwrap();
        assert!(!full.second_factor_required);
        assert!(state.jwt_manager.validate_token(&full.token).unwrap().is_complete());
        assert!(full.user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_sign_in() {
        let state = state();
        let user = seed_user(&state, "gone@example.com", "password1").await;
        state
            .store
            .update_user(
                user.id,
                UserChanges {
                    status: Some(entities::UserStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = AuthSession::new(&state)
            .login("gone@example.com", "password1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_sign_in_bookkeeping_keeps_concurrent_admin_changes() {
        let state = state();
        let snapshot = seed_user(&state, "race@example.com", "password1").await;
        state
            .store
            .update_user(
                snapshot.id,
                UserChanges {
                    role: Some(Role::Editor),
                    status: Some(entities::UserStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let session = AuthSession::new(&state);
        let response = session.start_session(snapshot.clone()).await.unwrap();
        assert!(response.user.last_login_at.is_some());
        session.begin_second_factor(snapshot.clone()).await.unwrap();

        let stored = state.store.get_user(snapshot.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Editor);
        assert_eq!(stored.status, entities::UserStatus::Disabled);
        assert!(stored.last_login_at.is_some());
        assert!(stored.two_factor_secret.is_some());
    }
}
