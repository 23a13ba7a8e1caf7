use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use pockity_core::Role;

/// Claims carried by bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// `"admin"` or `"user"`. Absent means `"user"`.
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry (seconds since epoch).
    pub exp: usize,
}

impl Claims {
    /// Role named by the claim. Unknown names fall back to [`Role::User`].
    pub fn role(&self) -> Role {
        match self.role.as_deref() {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

/// HS256 token issuance and validation.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint a token for `sub` valid for `ttl_seconds`.
    pub fn issue(&self, sub: &str, role: Role, ttl_seconds: u64) -> Result<String, String> {
        #[allow(clippy::cast_possible_truncation)]
        let exp = (jsonwebtoken::get_current_timestamp() + ttl_seconds) as usize;
        let claims = Claims {
            sub: sub.to_owned(),
            role: Some(if role.is_admin() { "admin" } else { "user" }.to_owned()),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| format!("token encoding failed: {e}"))
    }

    /// Check signature and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, String> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| format!("invalid token: {e}"))
    }
}
