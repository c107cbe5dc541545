/*
[INPUT]:  Board stage names and realtime event kinds as they appear on the wire
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the stage set or realtime event kinds change
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered board stage. Declaration order is the board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::ToDo, Stage::InProgress, Stage::Done];

    /// Stage every new task starts in
    pub const FIRST: Stage = Stage::ToDo;

    pub fn index(self) -> usize {
        match self {
            Stage::ToDo => 0,
            Stage::InProgress => 1,
            Stage::Done => 2,
        }
    }

    /// Move one position in `direction`, clamped at both ends.
    pub fn shift(self, direction: Direction) -> Stage {
        let last = Self::ALL.len() - 1;
        let next = match direction {
            Direction::Forward => (self.index() + 1).min(last),
            Direction::Backward => self.index().saturating_sub(1),
        };
        Self::ALL[next]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ToDo => "To Do",
            Stage::InProgress => "In Progress",
            Stage::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "to do" | "todo" => Ok(Stage::ToDo),
            "in progress" | "doing" => Ok(Stage::InProgress),
            "done" => Ok(Stage::Done),
            _ => Err(format!("unknown stage: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "next" | "right" => Ok(Direction::Forward),
            "backward" | "back" | "left" => Ok(Direction::Backward),
            _ => Err(format!("unknown direction: {s}")),
        }
    }
}

/// Row-level change kind reported by the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Other,
}

impl ChangeKind {
    /// Unknown kinds (TRUNCATE, future additions) map to `Other`
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Other,
        }
    }
}
