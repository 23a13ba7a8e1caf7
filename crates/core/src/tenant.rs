//! The storage tenant: either a user account or an API key issued to one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ApiKeyId, UserId};

const USER_TAG: &str = "user-";
const KEY_TAG: &str = "key-";

/// Maximum identifier length accepted inside a tenant reference.
pub const MAX_TENANT_ID_LEN: usize = 128;

/// The isolation unit for stored objects, usage and quota.
///
/// Resolved once at the request boundary; everything below takes this type.
/// The canonical string form (`user-{id}` / `key-{id}`) is used as the
/// object-store prefix segment and as the persistence scope, so user and key
/// identifiers can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TenantRef {
    User(UserId),
    ApiKey(ApiKeyId),
}

// OpenAPI: represented by its canonical string form (`user-{id}` / `key-{id}`).
#[cfg(feature = "openapi")]
impl utoipa::PartialSchema for TenantRef {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::schema::ObjectBuilder::new()
            .schema_type(utoipa::openapi::schema::Type::String)
            .examples(["user-alice"])
            .into()
    }
}

#[cfg(feature = "openapi")]
impl utoipa::ToSchema for TenantRef {}

impl TenantRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(UserId::new(id))
    }

    pub fn api_key(id: impl Into<String>) -> Self {
        Self::ApiKey(ApiKeyId::new(id))
    }

    /// The storage prefix for this tenant, including the trailing `/`.
    #[must_use]
    pub fn storage_prefix(&self) -> String {
        format!("{self}/")
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::ApiKey(_) => "api_key",
        }
    }

    #[must_use]
    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::ApiKey(_) => None,
        }
    }

    #[must_use]
    pub fn as_api_key(&self) -> Option<&ApiKeyId> {
        match self {
            Self::ApiKey(id) => Some(id),
            Self::User(_) => None,
        }
    }
}

/// Validate an identifier used inside a tenant reference.
pub fn validate_identifier(id: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(CoreError::InvalidIdentifier("identifier is empty".into()));
    }
    if id.len() > MAX_TENANT_ID_LEN {
        return Err(CoreError::InvalidIdentifier(format!(
            "identifier exceeds {MAX_TENANT_ID_LEN} characters"
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(CoreError::InvalidIdentifier(format!(
            "identifier contains invalid character {c:?}"
        )));
    }
    Ok(())
}

impl fmt::Display for TenantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{USER_TAG}{id}"),
            Self::ApiKey(id) => write!(f, "{KEY_TAG}{id}"),
        }
    }
}

impl FromStr for TenantRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tenant = if let Some(id) = s.strip_prefix(USER_TAG) {
            Self::user(id)
        } else if let Some(id) = s.strip_prefix(KEY_TAG) {
            Self::api_key(id)
        } else {
            return Err(CoreError::InvalidTenant(format!(
                "expected `{USER_TAG}<id>` or `{KEY_TAG}<id>`, got {s:?}"
            )));
        };
        let id = match &tenant {
            Self::User(id) => id.as_str(),
            Self::ApiKey(id) => id.as_str(),
        };
        validate_identifier(id).map_err(|e| CoreError::InvalidTenant(e.to_string()))?;
        Ok(tenant)
    }
}

impl TryFrom<String> for TenantRef {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TenantRef> for String {
    fn from(tenant: TenantRef) -> Self {
        tenant.to_string()
    }
}
