/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public task-board adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod remote;
pub mod types;
pub mod ws;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    KanbanClient,
    KanbanError,
    Result,
};

pub use remote::TaskRemote;

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    PhoenixFrame,
    RealtimeConfig,
    RealtimeMessage,
    RealtimeSocket,
};
