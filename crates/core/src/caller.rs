use serde::{Deserialize, Serialize};

use crate::tenant::TenantRef;

/// Privilege level of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Authenticated caller identity, threaded into audit records and decisions.
///
/// Shared across crates so the gateway can record who did what without
/// depending on the server's auth module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub tenant: TenantRef,
    pub role: Role,
    /// `"jwt"` or `"api_key"`.
    pub auth_method: String,
}

impl Caller {
    #[must_use]
    pub fn new(tenant: TenantRef, role: Role, auth_method: impl Into<String>) -> Self {
        Self {
            tenant,
            role,
            auth_method: auth_method.into(),
        }
    }

    /// Identifier used in audit trails and review records.
    #[must_use]
    pub fn actor(&self) -> String {
        self.tenant.to_string()
    }
}
