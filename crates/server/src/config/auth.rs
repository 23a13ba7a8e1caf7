use serde::Deserialize;

/// Bearer-token and API-key authentication settings.
#[derive(Deserialize, Default)]
pub struct AuthConfig {
    /// HS256 secret used to validate bearer tokens. `POCKITY_JWT_SECRET`
    /// overrides it.
    pub jwt_secret: Option<String>,
    /// Token subjects granted the admin role regardless of their claims.
    #[serde(default)]
    pub admin_subjects: Vec<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("admin_subjects", &self.admin_subjects)
            .finish()
    }
}
