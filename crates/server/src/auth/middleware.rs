use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use super::AuthProvider;

/// Tower layer that authenticates every request it wraps.
#[derive(Clone)]
pub struct AuthLayer {
    provider: Arc<AuthProvider>,
}

impl AuthLayer {
    pub fn new(provider: Arc<AuthProvider>) -> Self {
        Self { provider }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            provider: Arc::clone(&self.provider),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    provider: Arc<AuthProvider>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let provider = Arc::clone(&self.provider);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(header) = req.headers().get("authorization")
                && let Ok(value) = header.to_str()
                && let Some(token) = value.strip_prefix("Bearer ")
            {
                return match provider.validate_jwt(token) {
                    Ok(caller) => {
                        req.extensions_mut().insert(caller);
                        inner.call(req).await
                    }
                    Err(e) => Ok(unauthorized(&e)),
                };
            }

            if let Some(header) = req.headers().get("x-api-key")
                && let Ok(secret) = header.to_str()
            {
                return match provider.authenticate_api_key(secret).await {
                    Ok(Some(caller)) => {
                        req.extensions_mut().insert(caller);
                        inner.call(req).await
                    }
                    Ok(None) => Ok(unauthorized("invalid API key")),
                    Err(e) => {
                        tracing::error!(error = %e, "API key lookup failed");
                        Ok((
                            StatusCode::INTERNAL_SERVER_ERROR,
                            axum::Json(serde_json::json!({ "error": "credential lookup failed" })),
                        )
                            .into_response())
                    }
                };
            }

            Ok(unauthorized("missing authentication credentials"))
        })
    }
}

fn unauthorized(message: &str) -> Response {
    let body = serde_json::json!({ "error": message });
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}
