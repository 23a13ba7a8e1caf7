use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Create the state and lock tables if they do not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let state_table = config.state_table();
    let locks_table = config.locks_table();
    let prefix = &config.table_prefix;

    // Counters live in `value` as decimal text next to JSON documents.
    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {state_table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                version BIGINT NOT NULL DEFAULT 1,
                expires_at TIMESTAMPTZ
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}state_key_prefix_idx \
             ON {state_table} (key text_pattern_ops)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {locks_table} (
                name TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )"
        ),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!(%state_table, %locks_table, "state migrations applied");
    Ok(())
}
