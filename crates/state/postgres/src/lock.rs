use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::time::Instant;

use pockity_state::error::StateError;
use pockity_state::lock::{DistributedLock, LockGuard};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

fn backend(e: sqlx::Error) -> StateError {
    StateError::Backend(e.to_string())
}

/// Row-based [`DistributedLock`] in the `{prefix}locks` table.
///
/// A stale row is taken over in the same statement that acquires, so an
/// expired holder never blocks a new one.
pub struct PostgresDistributedLock {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresDistributedLock {
    pub async fn new(config: PostgresConfig) -> Result<Self, StateError> {
        let pool = pool::connect(&config).await?;
        Self::from_pool(pool, config).await
    }

    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StateError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl DistributedLock for PostgresDistributedLock {
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StateError> {
        let table = self.config.locks_table();
        let owner = uuid::Uuid::new_v4().to_string();
        let query = format!(
            "INSERT INTO {table} (name, owner, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO UPDATE \
             SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at \
             WHERE {table}.expires_at <= NOW()"
        );
        let result = sqlx::query(&query)
            .bind(name)
            .bind(&owner)
            .bind(chrono::Utc::now() + ttl)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(PostgresLockGuard {
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
            name: name.to_owned(),
            owner,
        })))
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StateError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_acquire(name, ttl).await? {
                return Ok(guard);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StateError::Timeout(timeout));
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Guard returned by [`PostgresDistributedLock`].
pub struct PostgresLockGuard {
    pool: PgPool,
    config: Arc<PostgresConfig>,
    name: String,
    owner: String,
}

#[async_trait]
impl LockGuard for PostgresLockGuard {
    async fn extend(&self, duration: Duration) -> Result<(), StateError> {
        let table = self.config.locks_table();
        let query = format!(
            "UPDATE {table} SET expires_at = $1 \
             WHERE name = $2 AND owner = $3 AND expires_at > NOW()"
        );
        let result = sqlx::query(&query)
            .bind(chrono::Utc::now() + duration)
            .bind(&self.name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StateError::LockExpired(self.name.clone()));
        }
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StateError> {
        let table = self.config.locks_table();
        let query = format!("DELETE FROM {table} WHERE name = $1 AND owner = $2");
        sqlx::query(&query)
            .bind(&self.name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, StateError> {
        let table = self.config.locks_table();
        let query = format!(
            "SELECT 1 FROM {table} WHERE name = $1 AND owner = $2 AND expires_at > NOW()"
        );
        let row: Option<(i32,)> = sqlx::query_as(&query)
            .bind(&self.name)
            .bind(&self.owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.is_some())
    }
}
