use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pockity_state::error::StateError;
use pockity_state::key::{KeyKind, StateKey};
use pockity_state::store::{CasResult, StateStore};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;

fn backend(e: sqlx::Error) -> StateError {
    StateError::Backend(e.to_string())
}

fn expires_at_from_ttl(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.map(|d| Utc::now() + d)
}

/// Escape `LIKE` metacharacters so a literal prefix can be matched.
fn escape_like(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// PostgreSQL-backed [`StateStore`].
///
/// Every operation is a single statement against one row, so atomicity comes
/// from the row lock taken by `INSERT ... ON CONFLICT DO UPDATE`. TTLs are an
/// `expires_at` column filtered on read.
pub struct PostgresStateStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresStateStore {
    /// Connect, run migrations, and return the store.
    pub async fn new(config: PostgresConfig) -> Result<Self, StateError> {
        let pool = pool::connect(&config).await?;
        Self::from_pool(pool, config).await
    }

    /// Build on an existing pool. Runs migrations.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StateError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    async fn purge_expired(&self, canonical: &str) -> Result<(), StateError> {
        let table = self.config.state_table();
        let query = format!(
            "DELETE FROM {table} WHERE key = $1 AND expires_at IS NOT NULL AND expires_at <= NOW()"
        );
        sqlx::query(&query)
            .bind(canonical)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn scan_like(&self, pattern: &str) -> Result<Vec<(String, String)>, StateError> {
        let table = self.config.state_table();
        let query = format!(
            "SELECT key, value FROM {table} \
             WHERE key LIKE $1 ESCAPE '\\' AND (expires_at IS NULL OR expires_at > NOW())"
        );
        sqlx::query_as(&query)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    fn parse_counter(key: &StateKey, value: String) -> Result<i64, StateError> {
        value.parse().map_err(|_| StateError::NotACounter {
            key: key.canonical(),
            value,
        })
    }
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let canonical = key.canonical();
        self.purge_expired(&canonical).await?;

        let table = self.config.state_table();
        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (key) DO NOTHING"
        );
        let result = sqlx::query(&query)
            .bind(&canonical)
            .bind(value)
            .bind(expires_at_from_ttl(ttl))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        let table = self.config.state_table();
        let query = format!(
            "SELECT value FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );
        let row: Option<(String,)> = sqlx::query_as(&query)
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let table = self.config.state_table();
        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, \
                 version = {table}.version + 1, \
                 expires_at = EXCLUDED.expires_at"
        );
        sqlx::query(&query)
            .bind(key.canonical())
            .bind(value)
            .bind(expires_at_from_ttl(ttl))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        let table = self.config.state_table();
        let query = format!(
            "DELETE FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );
        let result = sqlx::query(&query)
            .bind(key.canonical())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let canonical = key.canonical();
        self.purge_expired(&canonical).await?;

        let table = self.config.state_table();
        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2::bigint::text, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = ({table}.value::bigint + $2::bigint)::text, \
                 version = {table}.version + 1, \
                 expires_at = COALESCE(EXCLUDED.expires_at, {table}.expires_at) \
             RETURNING value"
        );
        let (value,): (String,) = sqlx::query_as(&query)
            .bind(&canonical)
            .bind(delta)
            .bind(expires_at_from_ttl(ttl))
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Self::parse_counter(key, value)
    }

    async fn increment_clamped(
        &self,
        key: &StateKey,
        delta: i64,
        floor: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let canonical = key.canonical();
        self.purge_expired(&canonical).await?;

        let table = self.config.state_table();
        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, GREATEST($2::bigint, $4::bigint)::text, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = GREATEST({table}.value::bigint + $2::bigint, $4::bigint)::text, \
                 version = {table}.version + 1, \
                 expires_at = COALESCE(EXCLUDED.expires_at, {table}.expires_at) \
             RETURNING value"
        );
        let (value,): (String,) = sqlx::query_as(&query)
            .bind(&canonical)
            .bind(delta)
            .bind(expires_at_from_ttl(ttl))
            .bind(floor)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Self::parse_counter(key, value)
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let table = self.config.state_table();
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);

        // The UPDATE is the decision; the SELECT only fills in the conflict.
        let update = format!(
            "UPDATE {table} \
             SET value = $1, version = version + 1, expires_at = COALESCE($2, expires_at) \
             WHERE key = $3 AND version = $4 \
               AND (expires_at IS NULL OR expires_at > NOW())"
        );
        let result = sqlx::query(&update)
            .bind(new_value)
            .bind(expires_at_from_ttl(ttl))
            .bind(key.canonical())
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() > 0 {
            return Ok(CasResult::Ok);
        }

        let select = format!(
            "SELECT value, version FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );
        let current: Option<(String, i64)> = sqlx::query_as(&select)
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(match current {
            Some((value, version)) => CasResult::Conflict {
                current_value: Some(value),
                current_version: u64::try_from(version).unwrap_or(0),
            },
            None => CasResult::Conflict {
                current_value: None,
                current_version: 0,
            },
        })
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        scope: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError> {
        let literal = format!("{namespace}:{scope}:{kind}:{}", prefix.unwrap_or(""));
        self.scan_like(&format!("{}%", escape_like(&literal))).await
    }

    async fn scan_keys_by_kind(
        &self,
        namespace: &str,
        kind: KeyKind,
    ) -> Result<Vec<(String, String)>, StateError> {
        let kind_segment = kind.to_string();
        let rows = self
            .scan_like(&format!("{}%", escape_like(&format!("{namespace}:"))))
            .await?;
        Ok(rows
            .into_iter()
            .filter(|(k, _)| {
                StateKey::split_canonical(k).is_some_and(|(_, _, kind, _)| kind == kind_segment)
            })
            .collect())
    }
}
