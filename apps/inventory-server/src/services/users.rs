//! User administration and self-service profile changes.

use api_protocol::{UpdateProfileRequest, UpdateUserRequest};
use entities::{Role, User};
use inventory_store::{InventoryStore, StoreError, UserChanges};
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};
use crate::services::validation::{
    duplicate_email, optional_text, validate_email, validate_password,
};

/// User management on top of the store.
pub struct UserAdmin<'a, S> {
    store: &'a S,
}

impl<'a, S: InventoryStore> UserAdmin<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Creates a user directly, without a signup code.
    pub async fn create(
        &self,
        email: &str,
        password: &str,
        role: Role,
        name: Option<String>,
    ) -> ServerResult<User> {
        let email = validate_email(email)?;
        validate_password(password, None)?;

        let mut user = User::new(&email, auth::hash_password(password)?).with_role(role);
        user.name = optional_text(name);

        let user = self
            .store
            .create_user(user)
            .await
            .map_err(duplicate_email(&email))?;
        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Applies an administrator's changes to a user.
    pub async fn update(&self, request: UpdateUserRequest) -> ServerResult<User> {
        let mut changes = UserChanges {
            role: request.role,
            status: request.status,
            name: request.name.map(|name| optional_text(Some(name))),
            ..UserChanges::default()
        };
        if let Some(email) = request.email {
            changes.email = Some(validate_email(&email)?);
        }
        if let Some(password) = request.password {
            validate_password(&password, None)?;
            changes.password_hash = Some(auth::hash_password(&password)?);
        }

        let user = self.apply(request.user_id, changes).await?;
        tracing::info!(user_id = %user.id, role = %user.role, status = user.status.as_str(), "User updated");
        Ok(user)
    }

    /// Deletes a user. Nobody may delete their own account, and the last
    /// remaining user can never be deleted.
    pub async fn delete(&self, actor: &User, user_id: Uuid) -> ServerResult<()> {
        if actor.id == user_id {
            return Err(ServerError::InvalidOperation(
                "You cannot delete your own account".to_string(),
            ));
        }

        self.store.delete_user(user_id).await.inspect_err(|e| {
            tracing::info!(user_id = %user_id, error = %e, "User deletion refused");
        })?;
        tracing::info!(user_id = %user_id, deleted_by = %actor.id, "User deleted");
        Ok(())
    }

    /// Applies a user's changes to their own profile. Only the email, name
    /// and password columns are written.
    pub async fn update_profile(
        &self,
        user: &User,
        request: UpdateProfileRequest,
    ) -> ServerResult<User> {
        let mut changes = UserChanges {
            name: request.name.map(|name| optional_text(Some(name))),
            ..UserChanges::default()
        };
        if let Some(email) = request.email {
            changes.email = Some(validate_email(&email)?);
        }
        if let Some(password) = request.password {
            let confirmation = request.confirm_password.unwrap_or_default();
            validate_password(&password, Some(&confirmation))?;
            changes.password_hash = Some(auth::hash_password(&password)?);
        }

        let user = self.apply(user.id, changes).await?;
        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    async fn apply(&self, user_id: Uuid, changes: UserChanges) -> ServerResult<User> {
        let email = changes.email.clone().unwrap_or_default();
        self.store
            .update_user(user_id, changes)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => ServerError::NotFound("User not found".to_string()),
                other => duplicate_email(&email)(other),
            })
    }

    /// Seeds an Admin when the user store is empty. Returns the new user, or
    /// `None` if users already exist.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> ServerResult<Option<User>> {
        if self.store.count_users().await? > 0 {
            return Ok(None);
        }
        let user = self.create(email, password, Role::Admin, None).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use entities::UserStatus;
    use inventory_store::MemoryInventoryStore;

    use super::*;

    #[tokio::test]
    async fn test_last_user_cannot_delete_self() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        let only = admin
            .create("root@example.com", "password", Role::Admin, None)
            .await
            .unwrap();

        let err = admin.delete(&only, only.id).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidOperation(_)));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_user_guard_holds_for_other_actors() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        let only = admin
            .create("root@example.com", "password", Role::Admin, None)
            .await
            .unwrap();
        let outsider = User::new("ghost@example.com", "hash").with_role(Role::Admin);

        let err = admin.delete(&outsider, only.id).await.unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_other_user() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        let root = admin
            .create("root@example.com", "password", Role::Admin, None)
            .await
            .unwrap();
        let clerk = admin
            .create("clerk@example.com", "password", Role::User, Some("Clerk".to_string()))
            .await
            .unwrap();

        admin.delete(&root, clerk.id).await.unwrap();
        assert!(store.get_user(clerk.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_on_create_and_update() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        admin
            .create("a@example.com", "password", Role::User, None)
            .await
            .unwrap();
        let b = admin
            .create("b@example.com", "password", Role::User, None)
            .await
            .unwrap();

        assert!(matches!(
            admin.create("A@example.com", "password", Role::User, None).await,
            Err(ServerError::DuplicateEmail(_))
        ));

        let err = admin
            .update(UpdateUserRequest {
                user_id: b.id,
                email: Some("a@example.com".to_string()),
                role: None,
                status: None,
                name: None,
                password: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_update_user_fields() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        let user = admin
            .create("c@example.com", "password", Role::User, None)
            .await
            .unwrap();

        let updated = admin
            .update(UpdateUserRequest {
                user_id: user.id,
                email: None,
                role: Some(Role::Editor),
                status: Some(UserStatus::Disabled),
                name: Some("Casey".to_string()),
                password: Some("new-password".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Editor);
        assert_eq!(updated.status, UserStatus::Disabled);
        assert_eq!(updated.name.as_deref(), Some("Casey"));
        assert!(auth::verify_password("new-password", &updated.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_profile_password_change_needs_confirmation() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        let user = admin
            .create("d@example.com", "password", Role::User, None)
            .await
            .unwrap();

        let err = admin
            .update_profile(
                &user,
                UpdateProfileRequest {
                    password: Some("another1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));

        let updated = admin
            .update_profile(
                &user,
                UpdateProfileRequest {
                    password: Some("another1".to_string()),
                    confirm_password: Some("another1".to_string()),
                    name: Some("Dana".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(auth::verify_password("another1", &updated.password_hash).unwrap());
        assert_eq!(updated.name.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn test_profile_update_from_stale_snapshot_keeps_admin_changes() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);
        admin
            .create("root@example.com", "password", Role::Admin, None)
            .await
            .unwrap();
        let snapshot = admin
            .create("e@example.com", "password", Role::Admin, None)
            .await
            .unwrap();

        admin
            .update(UpdateUserRequest {
                user_id: snapshot.id,
                email: None,
                role: Some(Role::User),
                status: Some(UserStatus::Disabled),
                name: None,
                password: None,
            })
            .await
            .unwrap();

        let updated = admin
            .update_profile(
                &snapshot,
                UpdateProfileRequest {
                    name: Some("Eli".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Eli"));
        assert_eq!(updated.role, Role::User);
        assert_eq!(updated.status, UserStatus::Disabled);

        let stored = store.get_user(snapshot.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::User);
        assert_eq!(stored.status, UserStatus::Disabled);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_on_empty_store() {
        let store = MemoryInventoryStore::new();
        let admin = UserAdmin::new(&store);

        let seeded = admin
            .bootstrap_admin("root@example.com", "password")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seeded.role, Role::Admin);

        assert!(admin
            .bootstrap_admin("other@example.com", "password")
            .await
            .unwrap()
            .is_none());
    }
}
