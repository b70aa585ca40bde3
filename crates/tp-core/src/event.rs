//! Attention events emitted by the tracker.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Domain, ValidationError};

/// Whether attention moved onto or away from a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The domain gained the user's attention.
    Active,
    /// The domain lost the user's attention.
    Inactive,
}

impl EventKind {
    /// String representation used on the wire and in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ValidationError::InvalidEventKind {
                value: s.to_string(),
            }),
        }
    }
}

/// A single attention transition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub domain: Domain,
    /// Wall-clock time captured when the tracker emitted the event.
    #[serde(rename = "timestamp")]
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub const fn active(domain: Domain, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Active,
            domain,
            occurred_at,
        }
    }

    pub const fn inactive(domain: Domain, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Inactive,
            domain,
            occurred_at,
        }
    }
}
