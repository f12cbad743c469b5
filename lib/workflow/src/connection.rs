//! Connections between workflow modules.
//!
//! A connection is a directed dependency: its target may only run after its
//! source has completed, and the target's input amount includes what the
//! source produced.

use crate::module::ModuleId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a connection, assigned by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A directed edge from `source_id` to `target_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub source_id: ModuleId,
    pub target_id: ModuleId,
}

impl Connection {
    /// Creates a connection between two modules.
    #[must_use]
    pub fn new(
        id: impl Into<ConnectionId>,
        source_id: impl Into<ModuleId>,
        target_id: impl Into<ModuleId>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
        }
    }

    /// Returns true if the connection starts and ends on the same module.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source_id == self.target_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_camel_case_on_the_wire() {
        let conn = Connection::new("c1", "A", "B");
        let json = serde_json::to_value(&conn).expect("serialize");
        assert_eq!(json["sourceId"], "A");
        assert_eq!(json["targetId"], "B");

        let back: Connection = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, conn);
    }

    #[test]
    fn self_loop() {
        assert!(Connection::new("c", "A", "A").is_self_loop());
        assert!(!Connection::new("c", "A", "B").is_self_loop());
    }
}
