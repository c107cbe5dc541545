/*
[INPUT]:  Realtime endpoint configuration and table subscriptions
[OUTPUT]: Row change notifications for subscribed tables
[POS]:    WebSocket layer - realtime change streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{RealtimeConfig, RealtimeSocket};
pub use message::{PhoenixFrame, RealtimeMessage};
