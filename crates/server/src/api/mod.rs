pub mod admin;
pub mod files;
pub mod health;
pub mod objects;
pub mod openapi;
pub mod requests;
pub mod schemas;
pub mod usage;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pockity_audit::AuditStore;
use pockity_blob::MemoryObjectStore;
use pockity_gateway::Gateway;

use crate::auth::{AuthLayer, AuthProvider};

use self::openapi::ApiDoc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Audit store for `/v1/admin/audit` (None when audit is disabled).
    pub audit: Option<Arc<dyn AuditStore>>,
    pub auth: Arc<AuthProvider>,
    /// Set when objects live in process memory and downloads are served here.
    pub files: Option<Arc<MemoryObjectStore>>,
}

/// Build the router with all API routes, middleware and Swagger UI.
pub fn router(state: AppState) -> Router {
    let body_limit =
        usize::try_from(state.gateway.config().max_upload_bytes).unwrap_or(usize::MAX);

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/files/{*key}", get(files::download));

    let protected = Router::new()
        // Objects
        .route("/v1/objects", get(objects::list))
        .route("/v1/objects/bulk-delete", post(objects::bulk_delete))
        .route(
            "/v1/objects/{*file_name}",
            get(objects::head)
                .put(objects::upload)
                .delete(objects::delete),
        )
        // Usage and keys
        .route("/v1/usage", get(usage::usage))
        .route("/v1/keys", get(usage::list_keys))
        // Requests
        .route("/v1/requests", post(requests::submit))
        .route("/v1/requests/{id}", get(requests::get))
        // Admin
        .route("/v1/admin/requests", get(admin::list_requests))
        .route("/v1/admin/requests/{id}/approve", post(admin::approve))
        .route("/v1/admin/requests/{id}/reject", post(admin::reject))
        .route("/v1/admin/tenants/{tenant}/usage", get(admin::tenant_usage))
        .route(
            "/v1/admin/tenants/{tenant}/reconcile",
            post(admin::reconcile),
        )
        .route("/v1/admin/audit", get(admin::query_audit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(AuthLayer::new(Arc::clone(&state.auth)));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
