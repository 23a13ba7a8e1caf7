use std::sync::Arc;

use pockity_state::{DistributedLock, StateStore};
use pockity_state_memory::{MemoryDistributedLock, MemoryStateStore};
#[cfg(feature = "postgres")]
use pockity_state_postgres::{PostgresConfig, PostgresDistributedLock, PostgresStateStore};

use crate::config::StateConfig;
use crate::error::ServerError;

/// A state store and distributed lock pair.
pub type StatePair = (Arc<dyn StateStore>, Arc<dyn DistributedLock>);

/// Construct the state store and lock named by `[state] backend`.
///
/// The `postgres` backend creates its tables on connect, which is what the
/// `migrate` subcommand relies on.
pub async fn create_state(config: &StateConfig) -> Result<StatePair, ServerError> {
    match config.backend.as_str() {
        "memory" => Ok(create_memory()),
        #[cfg(feature = "postgres")]
        "postgres" => create_postgres(config).await,
        other => Err(ServerError::Config(format!(
            "unsupported state backend: {other} (is the feature enabled?)"
        ))),
    }
}

fn create_memory() -> StatePair {
    let store = Arc::new(MemoryStateStore::new());
    let lock = Arc::new(MemoryDistributedLock::new());
    (store, lock)
}

#[cfg(feature = "postgres")]
async fn create_postgres(config: &StateConfig) -> Result<StatePair, ServerError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| ServerError::Config("postgres backend requires 'url' in [state]".into()))?;
    let pg_config = PostgresConfig {
        url: url.to_owned(),
        table_prefix: config
            .prefix
            .clone()
            .unwrap_or_else(|| "pockity_".to_owned()),
        ssl_mode: config.ssl_mode.clone(),
        ..PostgresConfig::default()
    };

    let pool = pockity_state_postgres::connect(&pg_config)
        .await
        .map_err(|e| ServerError::Config(format!("postgres state: {e}")))?;
    let store = PostgresStateStore::from_pool(pool.clone(), pg_config.clone())
        .await
        .map_err(|e| ServerError::Config(format!("postgres store: {e}")))?;
    let lock = PostgresDistributedLock::from_pool(pool, pg_config)
        .await
        .map_err(|e| ServerError::Config(format!("postgres lock: {e}")))?;
    Ok((Arc::new(store), Arc::new(lock)))
}
