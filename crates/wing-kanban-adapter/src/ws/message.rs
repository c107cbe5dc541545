/*
[INPUT]:  Raw Phoenix channel frames from the realtime endpoint
[OUTPUT]: Parsed RealtimeMessage values and outbound frame builders
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or changing format
*/

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{ChangeEvent, ChangeKind};

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_SYSTEM: &str = "system";
pub const PHOENIX_TOPIC: &str = "phoenix";

/// Phoenix v1 JSON frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixFrame {
    /// Join frame subscribing to every change event on one table
    pub fn join_table(schema: &str, table: &str, reference: &str) -> Self {
        Self {
            topic: table_topic(schema, table),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": schema, "table": table }
                    ]
                }
            }),
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn leave_table(schema: &str, table: &str, reference: &str) -> Self {
        Self {
            topic: table_topic(schema, table),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }
}

pub fn table_topic(schema: &str, table: &str) -> String {
    format!("realtime:{schema}:{table}")
}

/// Realtime message delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    /// A row in a subscribed table changed
    Change(ChangeEvent),
    /// Server reply to a frame we sent
    Reply {
        topic: String,
        reference: String,
        ok: bool,
        reason: Option<String>,
    },
    /// Channel-level failure reported by the server (`phx_error` or a system error)
    ChannelError { topic: String, reason: String },
    /// Server closed the channel
    ChannelClosed { topic: String },
    Other,
}

impl RealtimeMessage {
    pub fn from_frame(frame: PhoenixFrame) -> Self {
        match frame.event.as_str() {
            EVENT_POSTGRES_CHANGES => parse_change(&frame.payload).unwrap_or(RealtimeMessage::Other),
            EVENT_REPLY => {
                let status = frame.payload.get("status").and_then(Value::as_str);
                let reason = frame
                    .payload
                    .get("response")
                    .and_then(|response| response.get("reason"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                RealtimeMessage::Reply {
                    topic: frame.topic,
                    reference: frame.reference.unwrap_or_default(),
                    ok: status == Some("ok"),
                    reason,
                }
            }
            EVENT_ERROR => RealtimeMessage::ChannelError {
                topic: frame.topic,
                reason: "channel error".to_string(),
            },
            EVENT_CLOSE => RealtimeMessage::ChannelClosed { topic: frame.topic },
            EVENT_SYSTEM => {
                let status = frame.payload.get("status").and_then(Value::as_str);
                if status == Some("error") {
                    let reason = frame
                        .payload
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("system error")
                        .to_string();
                    RealtimeMessage::ChannelError {
                        topic: frame.topic,
                        reason,
                    }
                } else {
                    RealtimeMessage::Other
                }
            }
            _ => RealtimeMessage::Other,
        }
    }
}

fn parse_change(payload: &Value) -> Option<RealtimeMessage> {
    let data = payload.get("data")?;
    let kind = data
        .get("type")
        .and_then(Value::as_str)
        .map(ChangeKind::from_wire)
        .unwrap_or(ChangeKind::Other);
    let schema = data.get("schema").and_then(Value::as_str).unwrap_or_default();
    let table = data.get("table").and_then(Value::as_str).unwrap_or_default();
    Some(RealtimeMessage::Change(ChangeEvent {
        kind,
        schema: schema.to_string(),
        table: table.to_string(),
    }))
}
