/*
[INPUT]:  Task collection operations needed by the board core
[OUTPUT]: `TaskRemote` trait implemented by every task backend
[POS]:    Seam between the synchronization core and transports
[UPDATE]: When the board needs a new collection operation
*/

use async_trait::async_trait;

use crate::http::{KanbanClient, Result};
use crate::types::{NewTask, Stage, Task, TaskId};

/// The remote task collection as seen by the board.
#[async_trait]
pub trait TaskRemote: Send + Sync {
    /// All tasks ordered by `created_at` ascending
    async fn select_all(&self) -> Result<Vec<Task>>;

    /// Insert a task and return the stored record
    async fn insert(&self, task: NewTask) -> Result<Task>;

    async fn update_status(&self, id: &TaskId, status: Stage) -> Result<()>;

    async fn delete(&self, id: &TaskId) -> Result<()>;
}

#[async_trait]
impl TaskRemote for KanbanClient {
    async fn select_all(&self) -> Result<Vec<Task>> {
        self.list_tasks().await
    }

    async fn insert(&self, task: NewTask) -> Result<Task> {
        self.insert_task(&task).await
    }

    async fn update_status(&self, id: &TaskId, status: Stage) -> Result<()> {
        self.update_task_status(id, status).await
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        self.delete_task(id).await
    }
}
