/*
[INPUT]:  Error bodies returned by the REST gateway
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the gateway error format changes
*/

use serde::{Deserialize, Serialize};

/// PostgREST error body. Every field is optional because proxies in front of
/// the gateway may answer with their own shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable message, falling back to the raw body
    pub fn describe(&self, raw: &str) -> String {
        match (&self.message, &self.details) {
            (Some(message), Some(details)) => format!("{message} ({details})"),
            (Some(message), None) => message.clone(),
            _ => raw.trim().to_string(),
        }
    }
}
