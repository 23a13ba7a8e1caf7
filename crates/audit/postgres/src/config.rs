/// Configuration for the Postgres audit store.
#[derive(Debug, Clone)]
pub struct PostgresAuditConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Table name prefix (e.g. "pockity_").
    pub prefix: String,
    /// Background cleanup interval in seconds.
    pub cleanup_interval_seconds: u64,
}

impl PostgresAuditConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: "pockity_".to_owned(),
            cleanup_interval_seconds: 3600,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_cleanup_interval(mut self, seconds: u64) -> Self {
        self.cleanup_interval_seconds = seconds;
        self
    }

    pub(crate) fn table(&self) -> String {
        format!("{}audit", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_table_name() {
        let cfg = PostgresAuditConfig::new("postgres://db/pockity")
            .with_prefix("tenant_")
            .with_cleanup_interval(60);
        assert_eq!(cfg.table(), "tenant_audit");
        assert_eq!(cfg.cleanup_interval_seconds, 60);
        assert_eq!(PostgresAuditConfig::new("x").table(), "pockity_audit");
    }
}
