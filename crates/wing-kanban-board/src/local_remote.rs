/*
[INPUT]:  Task collection operations from the store
[OUTPUT]: A TaskRemote persisted in the local snapshot directory
[POS]:    Backend layer - offline/local-only task storage
[UPDATE]: When the local backend's id or ordering rules change
*/

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use wing_kanban_adapter::{KanbanError, NewTask, Result, Stage, Task, TaskId, TaskRemote};

use crate::snapshot::{LOCAL_TASKS_KEY, SnapshotStore};

/// Board contents on first run, before anything was saved
pub const STARTER_TASKS: [(&str, Stage); 4] = [
    ("Set up GitHub auth", Stage::Done),
    ("Set up Gmail/Calendar (gog CLI)", Stage::ToDo),
    ("Port mahjong app to GitHub", Stage::ToDo),
    ("Build kanban board", Stage::InProgress),
];

fn starter_tasks() -> Vec<Task> {
    let now = Utc::now();
    STARTER_TASKS
        .iter()
        .zip(0i64..)
        .map(|(&(title, status), offset)| Task {
            id: TaskId::new(Uuid::new_v4().to_string()),
            title: title.to_string(),
            status,
            created_at: now + TimeDelta::milliseconds(offset),
        })
        .collect()
}

/// Local-only backend: the whole collection lives in one snapshot key and
/// ids are generated client-side. An absent key is seeded with `STARTER_TASKS`.
#[derive(Debug)]
pub struct LocalTaskRemote {
    storage: SnapshotStore,
    // Serializes read-modify-write cycles on the backing file
    lock: Mutex<()>,
}

impl LocalTaskRemote {
    pub fn new(storage: SnapshotStore) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<Task>> {
        let saved = self
            .storage
            .read::<Vec<Task>>(LOCAL_TASKS_KEY)
            .await
            .map_err(|err| KanbanError::Storage(err.to_string()))?;
        if let Some(tasks) = saved {
            return Ok(tasks);
        }

        let seeded = starter_tasks();
        self.write_all(&seeded).await?;
        info!(count = seeded.len(), "local board seeded with starter tasks");
        Ok(seeded)
    }

    async fn write_all(&self, tasks: &[Task]) -> Result<()> {
        self.storage
            .write(LOCAL_TASKS_KEY, tasks)
            .await
            .map_err(|err| KanbanError::Storage(err.to_string()))
    }
}

#[async_trait]
impl TaskRemote for LocalTaskRemote {
    async fn select_all(&self) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.read_all().await?;
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn insert(&self, task: NewTask) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.read_all().await?;
        let created = Task {
            id: TaskId::new(Uuid::new_v4().to_string()),
            title: task.title,
            status: task.status,
            created_at: Utc::now(),
        };
        tasks.push(created.clone());
        self.write_all(&tasks).await?;
        Ok(created)
    }

    async fn update_status(&self, id: &TaskId, status: Stage) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.read_all().await?;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| KanbanError::NotFound(id.to_string()))?;
        task.status = status;
        self.write_all(&tasks).await
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.read_all().await?;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Ok(());
        }
        self.write_all(&tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_remote_assigns_unique_ids() {
        let tmp_dir = TempDir::new().unwrap();
        let remote = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));

        let a = remote.insert(NewTask::new("a")).await.unwrap();
        let b = remote.insert(NewTask::new("b")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, Stage::ToDo);
        let all = remote.select_all().await.unwrap();
        let titles: Vec<&str> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles[STARTER_TASKS.len()..], ["a", "b"]);
    }

    #[tokio::test]
    async fn local_remote_seeds_starter_tasks_once() {
        let tmp_dir = TempDir::new().unwrap();
        let remote = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));

        let first = remote.select_all().await.unwrap();
        let seeded: Vec<(&str, Stage)> =
            first.iter().map(|t| (t.title.as_str(), t.status)).collect();
        assert_eq!(seeded, STARTER_TASKS);

        let again = remote.select_all().await.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn local_remote_does_not_reseed_emptied_board() {
        let tmp_dir = TempDir::new().unwrap();
        let remote = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));
        for task in remote.select_all().await.unwrap() {
            remote.delete(&task.id).await.unwrap();
        }

        let reopened = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));
        assert!(reopened.select_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_remote_update_unknown_is_not_found() {
        let tmp_dir = TempDir::new().unwrap();
        let remote = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));
        let err = remote
            .update_status(&TaskId::from("missing"), Stage::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, KanbanError::NotFound(_)));
    }

    #[tokio::test]
    async fn local_remote_delete_is_idempotent() {
        let tmp_dir = TempDir::new().unwrap();
        let remote = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));
        let task = remote.insert(NewTask::new("a")).await.unwrap();

        remote.delete(&task.id).await.unwrap();
        remote.delete(&task.id).await.unwrap();
        let all = remote.select_all().await.unwrap();
        assert_eq!(all.len(), STARTER_TASKS.len());
        assert!(all.iter().all(|t| t.id != task.id));
    }

    #[tokio::test]
    async fn local_remote_survives_reopen() {
        let tmp_dir = TempDir::new().unwrap();
        let task = {
            let remote = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));
            let task = remote.insert(NewTask::new("persisted")).await.unwrap();
            remote.update_status(&task.id, Stage::InProgress).await.unwrap();
            task
        };

        let reopened = LocalTaskRemote::new(SnapshotStore::new(tmp_dir.path()));
        let all = reopened.select_all().await.unwrap();
        assert_eq!(all.len(), STARTER_TASKS.len() + 1);
        let found = all.iter().find(|t| t.id == task.id).unwrap();
        assert_eq!(found.status, Stage::InProgress);
    }
}
