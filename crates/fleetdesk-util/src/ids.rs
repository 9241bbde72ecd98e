//! Strongly-typed identifiers for the auth store

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a user, as assigned by the identity backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a queued offline operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_equality() {
        let id1 = UserId::new("user-1");
        let id2 = UserId::new("user-1");
        let id3 = UserId::new("user-2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn operation_id_uniqueness() {
        let o1 = OperationId::new();
        let o2 = OperationId::new();
        assert_ne!(o1, o2);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let user_id = UserId::new("user-42");
        let json = serde_json::to_string(&user_id).unwrap();
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(user_id, parsed);

        let op_id = OperationId::new();
        let json = serde_json::to_string(&op_id).unwrap();
        let parsed: OperationId = serde_json::from_str(&json).unwrap();
        assert_eq!(op_id, parsed);
    }
}
