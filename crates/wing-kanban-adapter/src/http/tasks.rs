/*
[INPUT]:  Task ids, insert bodies, and stage patches
[OUTPUT]: Task rows from the REST gateway
[POS]:    HTTP layer - task table endpoints
[UPDATE]: When the task table endpoints or ordering change
[UPDATE]: 2026-10-16 Added select/insert/update/delete with wiremock tests
*/

use reqwest::Method;

use crate::http::{KanbanClient, KanbanError, Result};
use crate::types::{NewTask, Stage, StatusPatch, Task, TaskId};

impl KanbanClient {
    /// Fetch every task, oldest first
    ///
    /// GET /rest/v1/{table}?select=*&order=created_at.asc
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let builder = self
            .table_request(Method::GET)?
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        self.send_json(builder).await
    }

    /// Insert a task and return the stored row
    ///
    /// POST /rest/v1/{table} with `Prefer: return=representation`
    pub async fn insert_task(&self, task: &NewTask) -> Result<Task> {
        let builder = self
            .table_request(Method::POST)?
            .header("Prefer", "return=representation")
            .json(task);
        let mut rows: Vec<Task> = self.send_json(builder).await?;
        if rows.len() != 1 {
            return Err(KanbanError::InvalidResponse(format!(
                "insert returned {} rows, expected 1",
                rows.len()
            )));
        }
        Ok(rows.remove(0))
    }

    /// Change a task's stage
    ///
    /// PATCH /rest/v1/{table}?id=eq.{id}
    pub async fn update_task_status(&self, id: &TaskId, status: Stage) -> Result<()> {
        let filter = format!("eq.{}", id);
        let builder = self
            .table_request(Method::PATCH)?
            .query(&[("id", filter.as_str())])
            .json(&StatusPatch { status });
        self.send_empty(builder).await
    }

    /// Delete a task
    ///
    /// DELETE /rest/v1/{table}?id=eq.{id}
    pub async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let filter = format!("eq.{}", id);
        let builder = self
            .table_request(Method::DELETE)?
            .query(&[("id", filter.as_str())]);
        self.send_empty(builder).await
    }
}
