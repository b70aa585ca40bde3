//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The domain is not in normalized form.
    #[error("domain is not normalized: {value}")]
    UnnormalizedDomain { value: String },

    /// The installation identifier is not a UUID.
    #[error("invalid installation id: {value}")]
    InvalidIdentity { value: String },

    /// An event kind string was not recognized.
    #[error("invalid event kind: {value}")]
    InvalidEventKind { value: String },

    /// A capacity or size limit was zero.
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    /// The eviction fraction was outside (0.0, 1.0].
    #[error("eviction fraction must be in (0.0, 1.0], got {value}")]
    EvictionFractionOutOfRange { value: f64 },
}

/// A normalized web domain.
///
/// Domains are lower-case, never start with a `www.` label, and always
/// contain at least one dot. Construct them with
/// [`extract_domain`](crate::extract_domain) from a URL, or with
/// [`Domain::new`] for an already-normalized value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Creates a domain after validating that it is normalized.
    pub fn new(domain: impl Into<String>) -> Result<Self, ValidationError> {
        let domain = domain.into();
        if domain.is_empty() {
            return Err(ValidationError::Empty { field: "domain" });
        }
        let normalized = domain.to_lowercase() == domain
            && !domain.starts_with("www.")
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        if !normalized {
            return Err(ValidationError::UnnormalizedDomain { value: domain });
        }
        Ok(Self(domain))
    }

    /// Returns the domain as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Domain {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The anonymous per-installation token sent with every batch.
///
/// Always a UUID; freshly generated tokens are version 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity(Uuid);

impl Identity {
    /// Generates a new random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a stored identity token.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidIdentity {
                value: value.to_string(),
            })
    }

    /// Returns the hyphenated lower-case form used on the wire.
    pub fn token(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for Identity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_rejects_empty() {
        assert_eq!(
            Domain::new(""),
            Err(ValidationError::Empty { field: "domain" })
        );
    }

    #[test]
    fn test_domain_rejects_unnormalized_values() {
        assert!(Domain::new("Example.com").is_err());
        assert!(Domain::new("www.example.com").is_err());
        assert!(Domain::new("localhost").is_err());
        assert!(Domain::new(".example.com").is_err());
        assert!(Domain::new("example.com").is_ok());
    }

    #[test]
    fn test_domain_serde_roundtrip() {
        let domain = Domain::new("docs.rs").unwrap();
        let json = serde_json::to_string(&domain).unwrap();
        assert_eq!(json, "\"docs.rs\"");
        let parsed: Domain = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, domain);
    }

    #[test]
    fn test_domain_serde_rejects_www() {
        let result: Result<Domain, _> = serde_json::from_str("\"www.example.com\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_generate_is_v4() {
        let identity = Identity::generate();
        let parsed = Uuid::parse_str(&identity.token()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_identity_parse_roundtrip() {
        let identity = Identity::generate();
        let parsed: Identity = identity.token().parse().unwrap();
        assert_eq!(parsed, identity);
    }

    #[test]
    fn test_identity_parse_rejects_garbage() {
        assert!(matches!(
            Identity::parse("not-a-uuid"),
            Err(ValidationError::InvalidIdentity { .. })
        ));
    }
}
