//! Identity types for Agora
//!
//! All identity types are strongly typed wrappers to prevent accidental
//! mixing of different ID types. Auction, agent, and task IDs wrap UUIDs;
//! dispute case IDs wrap externally supplied strings and are normalized
//! case-insensitively so that `CASE-1` and `case-1` name the same case.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate UUID-backed ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(AuctionId, "auction", "Unique identifier for a task auction");
define_id_type!(AgentId, "agent", "Unique identifier for a worker agent");
define_id_type!(TaskId, "task", "Unique identifier for a posted task");

/// Stable identifier for a dispute case, normalized case-insensitively.
///
/// Case IDs originate in the external ledger's event log and may arrive in
/// mixed casing depending on the provider. Two spellings that differ only in
/// ASCII case are the same case, so normalization happens at construction
/// and every comparison, hash, and storage key sees the lowercased form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Create a case ID, lowercasing the input
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// The normalized form, suitable as a storage key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auction_id_creation() {
        let id = AuctionId::new();
        let s = id.to_string();
        assert!(s.starts_with("auction_"));
    }

    #[test]
    fn test_id_parsing() {
        let id = AgentId::new();
        let s = id.to_string();
        let parsed = AgentId::parse(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_equality() {
        let uuid = Uuid::new_v4();
        let id1 = AgentId::from_uuid(uuid);
        let id2 = AgentId::from_uuid(uuid);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_case_id_is_case_insensitive() {
        let a = CaseId::new("CASE-0xAB12");
        let b = CaseId::new("case-0xab12");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "case-0xab12");
    }

    #[test]
    fn test_case_id_trims_whitespace() {
        let a = CaseId::new("  case-7 ");
        assert_eq!(a.as_str(), "case-7");
    }
}
