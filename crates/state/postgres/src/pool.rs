use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use pockity_state::error::StateError;

use crate::config::PostgresConfig;

fn parse_ssl_mode(mode: &str) -> Result<PgSslMode, StateError> {
    Ok(match mode {
        "disable" => PgSslMode::Disable,
        "prefer" => PgSslMode::Prefer,
        "require" => PgSslMode::Require,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        other => {
            return Err(StateError::Connection(format!("unknown ssl_mode: {other}")));
        }
    })
}

pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<PgConnectOptions, StateError> {
    let mut options: PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StateError::Connection(e.to_string()))?;

    if let Some(mode) = &config.ssl_mode {
        options = options.ssl_mode(parse_ssl_mode(mode)?);
    }
    if let Some(path) = &config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }
    Ok(options)
}

/// Open a pool for `config`. The store and lock can share the result.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StateError> {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect_with(build_connect_options(config)?)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))
}
