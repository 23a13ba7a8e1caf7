use sqlx::PgPool;

/// Create the audit table and its indexes if they do not already exist.
pub async fn run_migrations(pool: &PgPool, prefix: &str) -> Result<(), sqlx::Error> {
    let table = format!("{prefix}audit");

    let statements = [
        format!(
            "
            CREATE TABLE IF NOT EXISTS {table} (
                id          TEXT PRIMARY KEY,
                namespace   TEXT NOT NULL,
                tenant      TEXT NOT NULL,
                event       TEXT NOT NULL,
                file_name   TEXT,
                bytes       BIGINT,
                actor       TEXT,
                details     JSONB NOT NULL DEFAULT 'null'::jsonb,
                recorded_at TIMESTAMPTZ NOT NULL,
                expires_at  TIMESTAMPTZ
            )
            "
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_ns_tenant_time ON {table} (namespace, tenant, recorded_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_event ON {table} (event, recorded_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_expires ON {table} (expires_at) WHERE expires_at IS NOT NULL"
        ),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
