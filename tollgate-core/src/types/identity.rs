//! Caller identities: the principal for cache scoping, the client for admission.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::ANONYMOUS_PRINCIPAL;

/// Identity of the requesting principal, as resolved upstream.
///
/// Cache keys always embed the principal so one caller's cached data can never
/// be served to another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
    /// No identity was resolved.
    #[default]
    Anonymous,
    /// An authenticated principal with a stable identifier.
    User(String),
}

impl Principal {
    /// Builds a principal from an optional identifier; blank ids are anonymous.
    pub fn from_optional(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            Some(id) if !id.is_empty() => Principal::User(id.to_string()),
            _ => Principal::Anonymous,
        }
    }

    /// Returns true if no identity was resolved.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    /// Returns the principal id, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => f.write_str(ANONYMOUS_PRINCIPAL),
            Principal::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Network origin of a request, used to count admissions.
///
/// The authenticated principal is deliberately absent: a single origin trying
/// many accounts is still one client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId {
    /// Origin address (usually an IP)
    pub address: String,
    /// Request path, consulted only by tiers keyed per path
    pub path: Option<String>,
}

impl ClientId {
    /// Creates a client id from an origin address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            path: None,
        }
    }

    /// Attaches the request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_from_optional() {
        assert_eq!(Principal::from_optional(None), Principal::Anonymous);
        assert_eq!(Principal::from_optional(Some("   ")), Principal::Anonymous);
        assert_eq!(
            Principal::from_optional(Some(" alice ")),
            Principal::User("alice".into())
        );
    }

    #[test]
    fn test_principal_display() {
        assert_eq!(Principal::Anonymous.to_string(), "anonymous");
        assert_eq!(Principal::User("42".into()).to_string(), "user:42");
    }

    #[test]
    fn test_client_with_path() {
        let client = ClientId::new("10.0.0.1").with_path("/api/v1/auth/login");
        assert_eq!(client.address, "10.0.0.1");
        assert_eq!(client.path.as_deref(), Some("/api/v1/auth/login"));
    }
}
