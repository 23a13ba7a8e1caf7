use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgArguments;
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::Postgres;

use pockity_audit::error::AuditError;
use pockity_audit::record::{AuditPage, AuditQuery, AuditRecord};
use pockity_audit::store::AuditStore;

use crate::config::PostgresAuditConfig;
use crate::migrations;

fn storage(e: sqlx::Error) -> AuditError {
    AuditError::Storage(e.to_string())
}

/// Postgres-backed audit store using `sqlx`.
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Connect and run migrations.
    pub async fn new(config: &PostgresAuditConfig) -> Result<Self, AuditError> {
        let pool = PgPool::connect(&config.url).await.map_err(storage)?;
        Self::from_pool(pool, &config.prefix).await
    }

    pub async fn from_pool(pool: PgPool, prefix: &str) -> Result<Self, AuditError> {
        migrations::run_migrations(&pool, prefix)
            .await
            .map_err(storage)?;
        Ok(Self {
            pool,
            table: format!("{prefix}audit"),
        })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        let sql = format!(
            "INSERT INTO {} (
                id, namespace, tenant, event, file_name, bytes, actor, details,
                recorded_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            self.table
        );

        let bytes = entry.bytes.map(|b| i64::try_from(b).unwrap_or(i64::MAX));
        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&entry.namespace)
            .bind(&entry.tenant)
            .bind(entry.event.as_str())
            .bind(&entry.file_name)
            .bind(bytes)
            .bind(&entry.actor)
            .bind(&entry.details)
            .bind(entry.recorded_at)
            .bind(entry.expires_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AuditRecord>, AuditError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.table);
        let row = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(AuditRecord::try_from).transpose()
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let filter = Filter::from_query(query);

        let count_sql = format!("SELECT COUNT(*) FROM {} {}", self.table, filter.clause);
        let total = filter
            .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let next = filter.binds.len() + 1;
        let data_sql = format!(
            "SELECT * FROM {} {} ORDER BY recorded_at DESC, id DESC LIMIT ${next} OFFSET ${}",
            self.table,
            filter.clause,
            next + 1
        );
        let rows: Vec<AuditRow> = filter
            .bind_rows(sqlx::query_as::<_, AuditRow>(&data_sql))
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let records = rows
            .into_iter()
            .map(AuditRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AuditPage {
            records,
            total: u64::try_from(total).unwrap_or(0),
            limit,
            offset,
        })
    }

    async fn cleanup_expired(&self) -> Result<u64, AuditError> {
        let sql = format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
            self.table
        );
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Text(String),
    Time(DateTime<Utc>),
}

/// A `WHERE` clause with positional binds starting at `$1`.
#[derive(Debug, Default)]
struct Filter {
    clause: String,
    binds: Vec<BindValue>,
}

impl Filter {
    fn from_query(query: &AuditQuery) -> Self {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        let mut push = |condition: &str, value: BindValue| {
            binds.push(value);
            conditions.push(format!("{condition} ${}", binds.len()));
        };

        let text_fields = [
            ("namespace =", query.namespace.clone()),
            ("tenant =", query.tenant.clone()),
            ("event =", query.event.map(|e| e.as_str().to_owned())),
            ("file_name =", query.file_name.clone()),
            ("actor =", query.actor.clone()),
        ];
        for (condition, value) in text_fields {
            if let Some(v) = value {
                push(condition, BindValue::Text(v));
            }
        }
        if let Some(from) = query.from {
            push("recorded_at >=", BindValue::Time(from));
        }
        if let Some(to) = query.to {
            push("recorded_at <=", BindValue::Time(to));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        Self { clause, binds }
    }

    fn bind_scalar<'q>(
        &'q self,
        mut q: QueryScalar<'q, Postgres, i64, PgArguments>,
    ) -> QueryScalar<'q, Postgres, i64, PgArguments> {
        for value in &self.binds {
            q = match value {
                BindValue::Text(s) => q.bind(s),
                BindValue::Time(t) => q.bind(t),
            };
        }
        q
    }

    fn bind_rows<'q>(
        &'q self,
        mut q: QueryAs<'q, Postgres, AuditRow, PgArguments>,
    ) -> QueryAs<'q, Postgres, AuditRow, PgArguments> {
        for value in &self.binds {
            q = match value {
                BindValue::Text(s) => q.bind(s),
                BindValue::Time(t) => q.bind(t),
            };
        }
        q
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    namespace: String,
    tenant: String,
    event: String,
    file_name: Option<String>,
    bytes: Option<i64>,
    actor: Option<String>,
    details: serde_json::Value,
    recorded_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            namespace: row.namespace,
            tenant: row.tenant,
            event: row.event.parse()?,
            file_name: row.file_name,
            bytes: row.bytes.and_then(|b| u64::try_from(b).ok()),
            actor: row.actor,
            details: row.details,
            recorded_at: row.recorded_at,
            expires_at: row.expires_at,
        })
    }
}
