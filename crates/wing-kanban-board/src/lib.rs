/*
[INPUT]:  Public API exports for the wing-kanban board crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod app;
pub mod board;
pub mod change_feed;
pub mod config;
pub mod local_remote;
pub mod realtime_source;
pub mod reminders;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use app::BoardApp;
pub use board::{Board, Column};
pub use change_feed::{ChangeFeed, ChangeFeedOptions, ChangeSource, FeedState};
pub use config::{Backend, BoardConfig};
pub use local_remote::LocalTaskRemote;
pub use realtime_source::RealtimeChangeSource;
pub use reminders::{Reminder, ReminderList};
pub use snapshot::{SnapshotError, SnapshotStore};
pub use store::{BoardState, LoadOutcome, StoreError, SyncOutcome, TaskStore};
