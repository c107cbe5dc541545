/*
[INPUT]:  Task rows and realtime change payloads from the remote store
[OUTPUT]: Typed Rust models with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the task table schema changes
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::enums::{ChangeKind, Stage};

/// Opaque task identifier.
///
/// The remote store may hand out integer or UUID primary keys; both are kept
/// as their text form so the rest of the crate never depends on the column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
            Uint(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => TaskId(text),
            RawId::Int(n) => TaskId(n.to_string()),
            RawId::Uint(n) => TaskId(n.to_string()),
        })
    }
}

/// A single board task as stored remotely and in local snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: Stage,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Realtime notification that something in a table changed.
///
/// The row payload is deliberately not carried: consumers reload instead of merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_accepts_int_and_text() {
        let from_int: TaskId = serde_json::from_str("42").unwrap();
        let from_text: TaskId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_int, from_text);
        assert_eq!(from_int.as_str(), "42");
    }

    #[test]
    fn test_task_decodes_remote_row() {
        let row = r#"{
            "id": 7,
            "title": "Build kanban board",
            "status": "In Progress",
            "created_at": "2026-01-02T03:04:05.123456+00:00"
        }"#;
        let task: Task = serde_json::from_str(row).unwrap();
        assert_eq!(task.id, TaskId::from(7));
        assert_eq!(task.status, Stage::InProgress);
    }

    #[test]
    fn test_task_accepts_camel_case_created_at() {
        let row = r#"{"id":"a","title":"t","status":"Done","createdAt":"2026-01-02T03:04:05Z"}"#;
        let task: Task = serde_json::from_str(row).unwrap();
        assert_eq!(task.status, Stage::Done);
    }
}
