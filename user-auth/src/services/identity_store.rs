use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Mutex;

use super::error::AuthError;
use crate::models::{Identity, IdentityRow, IdentityUpdate, NewIdentity};

/// Read/update access to user accounts.
///
/// Lookups take the case-folded email. Auth flows only flip `status` and
/// write password hashes through `update_fields`.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AuthError>;

    /// Apply a partial update. Returns whether a row was changed.
    async fn update_fields(&self, id: i64, update: IdentityUpdate) -> Result<bool, AuthError>;

    /// Create an account with its permission record.
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, AuthError>;

    /// Remove an account and its permission record. Returns whether it existed.
    async fn delete_identity(&self, id: i64) -> Result<bool, AuthError>;
}

const SELECT_IDENTITY: &str = "SELECT u.id, u.name, u.email, u.status, p.role, u.hashed_password \
     FROM users u LEFT JOIN permissions p ON p.id = u.permission_id";

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn to_identity(row: IdentityRow) -> Result<Identity, AuthError> {
        Identity::try_from(row)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Corrupt identity row: {}", e)))
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!("{} WHERE u.email = $1", SELECT_IDENTITY))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::to_identity).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!("{} WHERE u.id = $1", SELECT_IDENTITY))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::to_identity).transpose()
    }

    async fn update_fields(&self, id: i64, update: IdentityUpdate) -> Result<bool, AuthError> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = update.name {
            fields.push("name = ").push_bind_unseparated(name);
        }
        if let Some(hash) = update.hashed_password {
            fields
                .push("hashed_password = ")
                .push_bind_unseparated(hash);
        }
        if let Some(status) = update.status {
            fields
                .push("status = ")
                .push_bind_unseparated(status.as_str());
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, AuthError> {
        let mut tx = self.pool.begin().await?;

        let permission_id: i64 = sqlx::query_scalar(
            "INSERT INTO permissions (role) VALUES ($1) RETURNING id",
        )
        .bind(new.role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (name, email, status, hashed_password, permission_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.status.as_str())
        .bind(&new.hashed_password)
        .bind(permission_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::UserAlreadyExists,
            _ => AuthError::Database(e),
        })?;

        tx.commit().await?;

        tracing::info!(user_id = id, role = %new.role, "Identity created");

        Ok(Identity {
            id,
            name: new.name,
            email: new.email,
            status: new.status,
            role: Some(new.role),
            hashed_password: new.hashed_password,
        })
    }

    async fn delete_identity(&self, id: i64) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        let permission_id: Option<Option<i64>> =
            sqlx::query_scalar("DELETE FROM users WHERE id = $1 RETURNING permission_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(permission_id) = permission_id else {
            return Ok(false);
        };

        if let Some(permission_id) = permission_id {
            sqlx::query("DELETE FROM permissions WHERE id = $1")
                .bind(permission_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id = id, "Identity deleted");
        Ok(true)
    }
}

/// In-process identity store for tests and local runs.
pub struct InMemoryIdentityStore {
    identities: Mutex<Vec<Identity>>,
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            identities: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Identity>>, AuthError> {
        self.identities.lock().map_err(|e| {
            AuthError::Internal(anyhow::anyhow!("Identity store mutex poisoned: {}", e))
        })
    }

    /// Seed an identity as-is, including states the create path never produces.
    pub fn insert(&self, identity: Identity) -> Result<(), AuthError> {
        self.lock()?.push(identity);
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.lock()?.iter().find(|i| i.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AuthError> {
        Ok(self.lock()?.iter().find(|i| i.id == id).cloned())
    }

    async fn update_fields(&self, id: i64, update: IdentityUpdate) -> Result<bool, AuthError> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut identities = self.lock()?;
        let Some(identity) = identities.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };

        if let Some(name) = update.name {
            identity.name = name;
        }
        if let Some(hash) = update.hashed_password {
            identity.hashed_password = hash;
        }
        if let Some(status) = update.status {
            identity.status = status;
        }
        Ok(true)
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, AuthError> {
        let mut identities = self.lock()?;
        if identities.iter().any(|i| i.email == new.email) {
            return Err(AuthError::UserAlreadyExists);
        }

        let identity = Identity {
            id: identities.iter().map(|i| i.id).max().unwrap_or(0) + 1,
            name: new.name,
            email: new.email,
            status: new.status,
            role: Some(new.role),
            hashed_password: new.hashed_password,
        };
        identities.push(identity.clone());
        Ok(identity)
    }

    async fn delete_identity(&self, id: i64) -> Result<bool, AuthError> {
        let mut identities = self.lock()?;
        let before = identities.len();
        identities.retain(|i| i.id != id);
        Ok(identities.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, UserStatus};

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity {
            name: "Ada".into(),
            email: email.into(),
            hashed_password: "hash".into(),
            status: UserStatus::Incomplete,
            role: Role::Developer,
        }
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let store = InMemoryIdentityStore::new();
        let created = store.create_identity(new_identity("ada@example.com")).await.unwrap();

        let found = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, Some(Role::Developer));
        assert!(store.find_by_id(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryIdentityStore::new();
        store.create_identity(new_identity("ada@example.com")).await.unwrap();
        let err = store
            .create_identity(new_identity("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_update_fields() {
        let store = InMemoryIdentityStore::new();
        let created = store.create_identity(new_identity("ada@example.com")).await.unwrap();

        assert!(store
            .update_fields(created.id, IdentityUpdate::status(UserStatus::Enabled))
            .await
            .unwrap());
        assert!(!store
            .update_fields(created.id + 100, IdentityUpdate::status(UserStatus::Enabled))
            .await
            .unwrap());
        assert!(!store
            .update_fields(created.id, IdentityUpdate::default())
            .await
            .unwrap());

        let found = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, UserStatus::Enabled);
    }

    #[tokio::test]
    async fn test_delete_frees_email() {
        let store = InMemoryIdentityStore::new();
        let created = store.create_identity(new_identity("ada@example.com")).await.unwrap();

        assert!(store.delete_identity(created.id).await.unwrap());
        assert!(!store.delete_identity(created.id).await.unwrap());
        assert!(store.find_by_email("ada@example.com").await.unwrap().is_none());

        store.create_identity(new_identity("ada@example.com")).await.unwrap();
    }
}
