use serde::{Deserialize, Serialize};

use pockity_core::{Namespace, TenantRef};

/// Scope for records that are not owned by a single tenant.
pub const GLOBAL_SCOPE: &str = "_global";

/// The kind of state being stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Usage ledger counters (`bytes`, `objects`, `updated_at`).
    Usage,
    /// Explicit per-tenant quota limits.
    Limits,
    /// Approval request records, plus their decision claims.
    Approval,
    /// Marker holding a tenant's single pending request id.
    PendingApproval,
    /// Issued API key records.
    ApiKey,
    /// Index from secret hash to API key id.
    ApiKeyHash,
    /// Index from approval request id to the API key it produced.
    ApiKeyRequest,
}

impl KeyKind {
    /// Return a string representation of the key kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Usage => "usage",
            Self::Limits => "limits",
            Self::Approval => "approval",
            Self::PendingApproval => "pending_approval",
            Self::ApiKey => "api_key",
            Self::ApiKeyHash => "api_key_hash",
            Self::ApiKeyRequest => "api_key_request",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to address state entries in the store.
///
/// `scope` is a tenant's canonical form for tenant-owned records, or
/// [`GLOBAL_SCOPE`] for shared indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub namespace: Namespace,
    pub scope: String,
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    /// Create a new state key.
    #[must_use]
    pub fn new(
        namespace: impl Into<Namespace>,
        scope: impl Into<String>,
        kind: KeyKind,
        id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            scope: scope.into(),
            kind,
            id: id.into(),
        }
    }

    /// A key owned by `tenant`.
    #[must_use]
    pub fn for_tenant(
        namespace: impl Into<Namespace>,
        tenant: &TenantRef,
        kind: KeyKind,
        id: impl Into<String>,
    ) -> Self {
        Self::new(namespace, tenant.to_string(), kind, id)
    }

    /// A key in the shared scope.
    #[must_use]
    pub fn global(namespace: impl Into<Namespace>, kind: KeyKind, id: impl Into<String>) -> Self {
        Self::new(namespace, GLOBAL_SCOPE, kind, id)
    }

    /// Return a canonical string representation: `namespace:scope:kind:id`
    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.namespace, self.scope, self.kind, self.id
        )
    }

    /// Split a canonical key back into `(namespace, scope, kind, id)`.
    ///
    /// The id may itself contain `:`; the first three segments never do.
    #[must_use]
    pub fn split_canonical(canonical: &str) -> Option<(&str, &str, &str, &str)> {
        let mut parts = canonical.splitn(4, ':');
        Some((parts.next()?, parts.next()?, parts.next()?, parts.next()?))
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}
