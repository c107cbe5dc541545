/*
[INPUT]:  Reminder edits from the CLI
[OUTPUT]: Local reminder list persisted in the snapshot directory
[POS]:    Local feature layer - reminders (never synced remotely)
[UPDATE]: When the reminder record shape changes
*/

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::snapshot::{REMINDERS_KEY, SnapshotError, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub label: String,
    /// Display text only (e.g. a cron expression); nothing runs it
    pub schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Insertion-ordered reminders, written back on every change
#[derive(Debug)]
pub struct ReminderList {
    storage: SnapshotStore,
    items: Vec<Reminder>,
}

impl ReminderList {
    /// Read the persisted list; a missing file is an empty list
    pub async fn load(storage: SnapshotStore) -> Result<Self, SnapshotError> {
        let items = storage
            .read::<Vec<Reminder>>(REMINDERS_KEY)
            .await?
            .unwrap_or_default();
        debug!(count = items.len(), "reminders loaded");
        Ok(Self { storage, items })
    }

    pub fn list(&self) -> &[Reminder] {
        &self.items
    }

    /// Blank labels are ignored
    pub async fn add(&mut self, label: &str, schedule: &str) -> Result<Option<Reminder>, SnapshotError> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(None);
        }

        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            schedule: schedule.trim().to_string(),
            enabled: true,
        };
        self.items.push(reminder.clone());
        self.persist().await?;
        info!(reminder_id = %reminder.id, "reminder added");
        Ok(Some(reminder))
    }

    /// Flip `enabled`; returns the new value, or `None` for an unknown id
    pub async fn toggle(&mut self, id: &str) -> Result<Option<bool>, SnapshotError> {
        let Some(reminder) = self.items.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        reminder.enabled = !reminder.enabled;
        let enabled = reminder.enabled;
        self.persist().await?;
        Ok(Some(enabled))
    }

    /// Returns whether a reminder was removed
    pub async fn remove(&mut self, id: &str) -> Result<bool, SnapshotError> {
        let before = self.items.len();
        self.items.retain(|r| r.id != id);
        if self.items.len() == before {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    async fn persist(&self) -> Result<(), SnapshotError> {
        self.storage.write(REMINDERS_KEY, &self.items).await
    }
}
