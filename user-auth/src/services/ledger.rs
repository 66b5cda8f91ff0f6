use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::error::AuthError;
use crate::models::RevocationRecord;

/// Store of live revocable tokens.
///
/// Every call commits on its own. `delete` and `delete_if_token` report
/// whether a row was removed and arbitrate when two requests race for the
/// same record.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Record a token. A supplied `id` is reused, otherwise one is assigned.
    async fn insert(&self, token: &str, id: Option<i64>) -> Result<RevocationRecord, AuthError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<RevocationRecord>, AuthError>;

    /// First record holding exactly this token.
    async fn get_by_token(&self, token: &str) -> Result<Option<RevocationRecord>, AuthError>;

    async fn delete(&self, id: i64) -> Result<bool, AuthError>;

    /// Remove record `id` only while it still holds `token`.
    async fn delete_if_token(&self, id: i64, token: &str) -> Result<bool, AuthError>;

    async fn health_check(&self) -> Result<(), AuthError>;
}

/// Ledger backed by the `revocation_records` table.
#[derive(Clone)]
pub struct PgRevocationLedger {
    pool: PgPool,
}

impl PgRevocationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationLedger for PgRevocationLedger {
    async fn insert(&self, token: &str, id: Option<i64>) -> Result<RevocationRecord, AuthError> {
        let record = match id {
            Some(id) => {
                sqlx::query_as::<_, RevocationRecord>(
                    "INSERT INTO revocation_records (id, token) VALUES ($1, $2) RETURNING id, token",
                )
                .bind(id)
                .bind(token)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RevocationRecord>(
                    "INSERT INTO revocation_records (token) VALUES ($1) RETURNING id, token",
                )
                .bind(token)
                .fetch_one(&self.pool)
                .await?
            }
        };

        tracing::debug!(record_id = record.id, "Revocation record inserted");
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<RevocationRecord>, AuthError> {
        let record = sqlx::query_as::<_, RevocationRecord>(
            "SELECT id, token FROM revocation_records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<RevocationRecord>, AuthError> {
        let record = sqlx::query_as::<_, RevocationRecord>(
            "SELECT id, token FROM revocation_records WHERE token = $1 ORDER BY id LIMIT 1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM revocation_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_token(&self, id: i64, token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM revocation_records WHERE id = $1 AND token = $2")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), AuthError> {
        crate::db::health_check(&self.pool).await?;
        Ok(())
    }
}

/// In-process ledger for tests and local runs without a database.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    next_id: i64,
    records: BTreeMap<i64, String>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                next_id: 1,
                records: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, AuthError> {
        self.state
            .lock()
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Ledger mutex poisoned: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RevocationLedger for InMemoryLedger {
    async fn insert(&self, token: &str, id: Option<i64>) -> Result<RevocationRecord, AuthError> {
        let mut state = self.lock()?;
        let id = match id {
            Some(id) => {
                if state.records.contains_key(&id) {
                    return Err(AuthError::Internal(anyhow::anyhow!(
                        "Revocation record {} already exists",
                        id
                    )));
                }
                state.next_id = state.next_id.max(id + 1);
                id
            }
            None => {
                let id = state.next_id;
                state.next_id += 1;
                id
            }
        };
        state.records.insert(id, token.to_string());

        Ok(RevocationRecord {
            id,
            token: token.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<RevocationRecord>, AuthError> {
        let state = self.lock()?;
        Ok(state.records.get(&id).map(|token| RevocationRecord {
            id,
            token: token.clone(),
        }))
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<RevocationRecord>, AuthError> {
        let state = self.lock()?;
        Ok(state
            .records
            .iter()
            .find(|(_, t)| t.as_str() == token)
            .map(|(id, t)| RevocationRecord {
                id: *id,
                token: t.clone(),
            }))
    }

    async fn delete(&self, id: i64) -> Result<bool, AuthError> {
        let mut state = self.lock()?;
        Ok(state.records.remove(&id).is_some())
    }

    async fn delete_if_token(&self, id: i64, token: &str) -> Result<bool, AuthError> {
        let mut state = self.lock()?;
        if state.records.get(&id).map(String::as_str) != Some(token) {
            return Ok(false);
        }
        Ok(state.records.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<(), AuthError> {
        self.lock().map(|_| ())
    }
}
