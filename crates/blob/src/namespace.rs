//! Tenant prefix namespacing and input validation for object keys.

use pockity_core::TenantRef;

use crate::error::BlobError;

/// Longest accepted file name, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 1024;

/// Build the object key `{tenant}/{file_name}` after validating the name.
pub fn object_key(tenant: &TenantRef, file_name: &str) -> Result<String, BlobError> {
    validate_file_name(file_name)?;
    Ok(format!("{}{file_name}", tenant.storage_prefix()))
}

/// Reject keys that do not live under the tenant's prefix.
pub fn ensure_owned(tenant: &TenantRef, key: &str) -> Result<(), BlobError> {
    let prefix = tenant.storage_prefix();
    match key.strip_prefix(&prefix) {
        Some(rest) if !rest.is_empty() => Ok(()),
        _ => Err(BlobError::NotOwned {
            key: key.to_owned(),
            tenant: tenant.to_string(),
        }),
    }
}

/// The tenant-relative file name of a key, or the key itself when it is
/// not under the tenant prefix.
pub fn file_name_of<'a>(tenant: &TenantRef, key: &'a str) -> &'a str {
    let prefix = tenant.storage_prefix();
    key.strip_prefix(prefix.as_str()).unwrap_or(key)
}

fn validate_file_name(name: &str) -> Result<(), BlobError> {
    let invalid = |reason: &str| Err(BlobError::InvalidKey(format!("{name:?}: {reason}")));

    if name.is_empty() {
        return invalid("file name is empty");
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return invalid("file name is too long");
    }
    if name.starts_with('/') {
        return invalid("file name must not start with '/'");
    }
    if name.chars().any(char::is_control) {
        return invalid("file name contains control characters");
    }
    if name.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return invalid("file name contains an empty or '..' path segment");
    }
    Ok(())
}

/// Validate a MIME type of the form `type/subtype` (parameters allowed).
pub fn validate_content_type(content_type: &str) -> Result<(), BlobError> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let valid = essence.split_once('/').is_some_and(|(ty, sub)| {
        let token = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
        };
        token(ty) && token(sub)
    });
    if valid {
        Ok(())
    } else {
        Err(BlobError::InvalidContentType(content_type.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_by_tenant() {
        let tenant = TenantRef::user("alice");
        assert_eq!(
            object_key(&tenant, "docs/report.pdf").unwrap(),
            "user-alice/docs/report.pdf"
        );
        let key = TenantRef::api_key("k1");
        assert_eq!(object_key(&key, "a.txt").unwrap(), "key-k1/a.txt");
    }

    #[test]
    fn rejects_bad_file_names() {
        let tenant = TenantRef::user("alice");
        for name in ["", "/etc/passwd", "a/../b", "..", "a//b", "a/", "bad\nname"] {
            assert!(
                matches!(object_key(&tenant, name), Err(BlobError::InvalidKey(_))),
                "{name:?} should be rejected"
            );
        }
        let long = "x".repeat(MAX_FILE_NAME_LEN + 1);
        assert!(object_key(&tenant, &long).is_err());
        assert!(object_key(&tenant, &"x".repeat(MAX_FILE_NAME_LEN)).is_ok());
    }

    #[test]
    fn ownership_is_by_prefix() {
        let alice = TenantRef::user("alice");
        assert!(ensure_owned(&alice, "user-alice/a.txt").is_ok());
        assert!(ensure_owned(&alice, "user-alice/").is_err());
        assert!(ensure_owned(&alice, "user-alicea/a.txt").is_err());
        assert!(ensure_owned(&alice, "user-bob/a.txt").is_err());
        assert!(ensure_owned(&alice, "key-alice/a.txt").is_err());
    }

    #[test]
    fn file_name_strips_prefix() {
        let alice = TenantRef::user("alice");
        assert_eq!(file_name_of(&alice, "user-alice/x/y.txt"), "x/y.txt");
        assert_eq!(file_name_of(&alice, "other"), "other");
    }

    #[test]
    fn content_type_shape() {
        for ok in ["text/plain", "application/json; charset=utf-8", "image/svg+xml"] {
            assert!(validate_content_type(ok).is_ok(), "{ok}");
        }
        for bad in ["", "text", "/plain", "text/", "te xt/plain"] {
            assert!(validate_content_type(bad).is_err(), "{bad}");
        }
    }
}
