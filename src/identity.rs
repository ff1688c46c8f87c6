//! Resolution of the user who owns an upload.
//!
//! Authentication happens upstream; this module only reads the identity the platform forwards.

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the authenticated user identifier.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Source of the user identity attached to each upload.
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user id for a request from its headers.
    fn resolve(&self, headers: &HeaderMap) -> String;
}

/// Reads the user id from a forwarded header, falling back to a configured default.
pub struct HeaderIdentity {
    header: HeaderName,
    default_user_id: String,
}

impl HeaderIdentity {
    /// Read [`USER_ID_HEADER`] and fall back to `default_user_id`.
    pub fn new(default_user_id: impl Into<String>) -> Self {
        Self {
            header: HeaderName::from_static(USER_ID_HEADER),
            default_user_id: default_user_id.into(),
        }
    }
}

impl IdentityProvider for HeaderIdentity {
    fn resolve(&self, headers: &HeaderMap) -> String {
        let Some(raw) = headers.get(&self.header) else {
            return self.default_user_id.clone();
        };

        match raw.to_str().map(str::trim) {
            Ok(user_id) if is_valid_user_id(user_id) => user_id.to_string(),
            _ => {
                tracing::warn!(header = %self.header, "Ignoring malformed user id header");
                self.default_user_id.clone()
            }
        }
    }
}

/// User ids become the first object key segment, so only a conservative alphabet is accepted.
fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 128
        && user_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '@'))
        && user_id != "."
        && user_id != ".."
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn falls_back_to_default_without_header() {
        let identity = HeaderIdentity::new("u123");
        assert_eq!(identity.resolve(&HeaderMap::new()), "u123");
    }

    #[test]
    fn uses_trimmed_header_value() {
        let identity = HeaderIdentity::new("u123");
        assert_eq!(identity.resolve(&headers_with("  alice@example.org ")), "alice@example.org");
    }

    #[test]
    fn rejects_path_like_identifiers() {
        let identity = HeaderIdentity::new("u123");
        assert_eq!(identity.resolve(&headers_with("../etc")), "u123");
        assert_eq!(identity.resolve(&headers_with("a/b")), "u123");
        assert_eq!(identity.resolve(&headers_with("..")), "u123");
        assert_eq!(identity.resolve(&headers_with("   ")), "u123");
    }
}
