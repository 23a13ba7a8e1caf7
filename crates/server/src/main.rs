use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use pockity_core::{Role, validate_identifier};
use pockity_gateway::{BackgroundProcessorBuilder, GatewayBuilder};
use pockity_server::api::AppState;
use pockity_server::auth::{AuthProvider, JwtManager};
use pockity_server::config::PockityConfig;

/// Pockity storage server.
#[derive(Parser, Debug)]
#[command(name = "pockity-server", about = "Multi-tenant object storage with quotas")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pockity.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the PostgreSQL tables for the configured state and audit backends, then exit.
    Migrate,
    /// Print a signed development token.
    Token {
        /// User id placed in the `sub` claim.
        #[arg(long)]
        subject: String,
        /// Issue an admin token.
        #[arg(long)]
        admin: bool,
        /// Lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl_seconds: u64,
    },
}

fn init_plain_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_exists = Path::new(&cli.config).exists();
    let config = PockityConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Migrate) => {
            init_plain_tracing();
            return run_migrate(&config).await;
        }
        Some(Commands::Token {
            subject,
            admin,
            ttl_seconds,
        }) => return run_token(&config, &subject, admin, ttl_seconds),
        None => {}
    }

    let telemetry_guard = pockity_server::telemetry::init(&config.telemetry);
    if !config_exists {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    let jwt_secret = config
        .jwt_secret()
        .ok_or("[auth] jwt_secret or POCKITY_JWT_SECRET is required")?;

    let (store, lock) = pockity_server::state_factory::create_state(&config.state).await?;
    info!(backend = %config.state.backend, "state store initialized");

    let objects =
        pockity_server::object_store_factory::create_object_store(&config.object_store).await?;
    info!(backend = %config.object_store.backend, "object store initialized");

    let audit_store = if config.audit.enabled {
        let store = pockity_server::audit_factory::create_audit_store(&config.audit).await?;
        info!(backend = %config.audit.backend, "audit store initialized");
        Some(store)
    } else {
        None
    };

    let mut builder = GatewayBuilder::new()
        .config(config.gateway_config())
        .state(store)
        .lock(lock)
        .object_store(Arc::clone(&objects.store))
        .url_ttl(Duration::from_secs(config.object_store.url_ttl_seconds));
    if let Some(ref audit) = audit_store {
        builder = builder.audit(Arc::clone(audit));
    }
    let gateway = Arc::new(builder.build()?);

    let cleanup_handle = match (&audit_store, config.audit.backend.as_str()) {
        #[cfg(feature = "postgres")]
        (Some(audit), "postgres") => Some(pockity_audit_postgres::spawn_cleanup_task(
            Arc::clone(audit),
            Duration::from_secs(config.audit.cleanup_interval_seconds),
        )),
        _ => None,
    };

    let background_shutdown = if config.background.enable_reconciliation {
        let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
            .config(config.background_config())
            .reconciler(Arc::clone(gateway.reconciler()))
            .build()?;
        tokio::spawn(async move { processor.run().await });
        Some(shutdown_tx)
    } else {
        None
    };

    let auth = Arc::new(AuthProvider::new(
        &jwt_secret,
        config.auth.admin_subjects.clone(),
        Arc::clone(gateway.credentials()),
    ));

    let state = AppState {
        gateway: Arc::clone(&gateway),
        audit: audit_store,
        auth,
        files: objects.files,
    };
    let app = pockity_server::api::router(state);

    let host = cli.host.unwrap_or(config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "pockity-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(tx) = background_shutdown {
        let _ = tx.send(()).await;
    }
    if let Some(handle) = cleanup_handle {
        handle.abort();
    }

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    info!(
        timeout_secs = config.server.shutdown_timeout_seconds,
        "waiting for pending audit tasks..."
    );
    if tokio::time::timeout(shutdown_timeout, gateway.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, some audit records may be lost"
        );
    }

    telemetry_guard.shutdown();
    info!("pockity-server shut down");
    Ok(())
}

/// Connect to each configured PostgreSQL backend; connecting creates the tables.
async fn run_migrate(config: &PockityConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(backend = %config.state.backend, "running state backend migrations...");
    let _state = pockity_server::state_factory::create_state(&config.state).await?;
    info!(backend = %config.state.backend, "state backend migrations complete");

    if config.audit.enabled {
        info!(backend = %config.audit.backend, "running audit backend migrations...");
        let _audit = pockity_server::audit_factory::create_audit_store(&config.audit).await?;
        info!(backend = %config.audit.backend, "audit backend migrations complete");
    } else {
        info!("audit disabled, skipping audit migrations");
    }

    info!("all migrations complete");
    Ok(())
}

fn run_token(
    config: &PockityConfig,
    subject: &str,
    admin: bool,
    ttl_seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_identifier(subject)?;
    let secret = config
        .jwt_secret()
        .ok_or("[auth] jwt_secret or POCKITY_JWT_SECRET is required")?;
    let role = if admin { Role::Admin } else { Role::User };
    let token = JwtManager::new(&secret).issue(subject, role, ttl_seconds)?;
    println!("{token}");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
