//! Strongly-typed identifiers for clockwork

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a user in the HR source database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a recorded export artifact.
///
/// Minted as a UUID but treated as opaque text everywhere else, so any
/// string a client sends is a valid (possibly unknown) id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportId(String);

impl ExportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ExportId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ExportId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl FromStr for ExportId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_id_uniqueness() {
        let a = ExportId::new();
        let b = ExportId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn export_id_parses_its_display_form() {
        let id = ExportId::new();
        let parsed: ExportId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn export_id_accepts_any_text() {
        let id: ExportId = serde_json::from_str("\"nonexistent-id\"").unwrap();
        assert_eq!(id.as_str(), "nonexistent-id");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"nonexistent-id\"");
    }

    #[test]
    fn user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId::new(42)).unwrap();
        assert_eq!(json, "42");
        let parsed: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed.get(), 7);
    }
}
