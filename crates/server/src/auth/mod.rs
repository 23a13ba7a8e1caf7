//! Caller authentication.
//!
//! Bearer tokens identify users; `x-api-key` secrets identify the API keys
//! issued to them. Either way the request carries a [`Caller`] extension
//! once [`AuthLayer`] has run.

pub mod jwt;
pub mod middleware;

use std::collections::HashSet;
use std::sync::Arc;

use pockity_core::{Caller, Role, TenantRef, validate_identifier};
use pockity_gateway::CredentialRegistry;

use crate::error::ServerError;

pub use jwt::{Claims, JwtManager};
pub use middleware::AuthLayer;

/// Resolves request credentials to callers.
pub struct AuthProvider {
    jwt: JwtManager,
    admin_subjects: HashSet<String>,
    credentials: Arc<CredentialRegistry>,
}

impl AuthProvider {
    pub fn new(
        jwt_secret: &str,
        admin_subjects: impl IntoIterator<Item = String>,
        credentials: Arc<CredentialRegistry>,
    ) -> Self {
        Self {
            jwt: JwtManager::new(jwt_secret),
            admin_subjects: admin_subjects.into_iter().collect(),
            credentials,
        }
    }

    /// Validate a bearer token and resolve its subject to a user tenant.
    pub fn validate_jwt(&self, token: &str) -> Result<Caller, String> {
        let claims = self.jwt.validate(token)?;
        validate_identifier(&claims.sub).map_err(|e| format!("invalid subject: {e}"))?;
        let role = if self.admin_subjects.contains(&claims.sub) {
            Role::Admin
        } else {
            claims.role()
        };
        Ok(Caller::new(TenantRef::user(claims.sub), role, "jwt"))
    }

    /// Look up an API key by its secret.
    pub async fn authenticate_api_key(&self, secret: &str) -> Result<Option<Caller>, String> {
        let record = self
            .credentials
            .authenticate(secret)
            .await
            .map_err(|e| e.to_string())?;
        Ok(record.map(|r| Caller::new(r.tenant(), Role::User, "api_key")))
    }
}

/// Reject callers without the admin role.
pub fn require_admin(caller: &Caller) -> Result<(), ServerError> {
    if caller.role.is_admin() {
        Ok(())
    } else {
        Err(ServerError::Forbidden("admin role required".into()))
    }
}
