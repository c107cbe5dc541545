/*
[INPUT]:  The store's ordered task collection
[OUTPUT]: Per-stage columns for presentation layers
[POS]:    View layer - pure grouping of tasks by stage
[UPDATE]: When the board layout contract changes
*/

use wing_kanban_adapter::{Stage, Task};

/// Tasks in `stage`, in collection order
pub fn tasks_in_stage(tasks: &[Task], stage: Stage) -> Vec<Task> {
    tasks.iter().filter(|t| t.status == stage).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub stage: Stage,
    pub tasks: Vec<Task>,
}

/// One column per stage, in stage order. Every task lands in exactly one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub columns: Vec<Column>,
}

impl Board {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let columns = Stage::ALL
            .iter()
            .map(|&stage| Column {
                stage,
                tasks: tasks_in_stage(tasks, stage),
            })
            .collect();
        Self { columns }
    }

    pub fn column(&self, stage: Stage) -> &Column {
        // `from_tasks` builds columns in `Stage::ALL` order
        &self.columns[stage.index()]
    }

    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wing_kanban_adapter::TaskId;

    fn task(id: i64, status: Stage) -> Task {
        Task {
            id: TaskId::from(id),
            title: format!("task {id}"),
            status,
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        }
    }

    #[test]
    fn board_partitions_every_task_once() {
        let tasks = vec![
            task(1, Stage::Done),
            task(2, Stage::ToDo),
            task(3, Stage::ToDo),
            task(4, Stage::InProgress),
        ];
        let board = Board::from_tasks(&tasks);

        assert_eq!(board.total(), tasks.len());
        let mut seen: Vec<TaskId> = board
            .columns
            .iter()
            .flat_map(|c| c.tasks.iter().map(|t| t.id.clone()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), tasks.len());
    }

    #[test]
    fn column_keeps_collection_order() {
        let tasks = vec![task(5, Stage::ToDo), task(2, Stage::Done), task(3, Stage::ToDo)];
        let todo = tasks_in_stage(&tasks, Stage::ToDo);
        let ids: Vec<&str> = todo.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["5", "3"]);
    }

    #[test]
    fn column_lookup_matches_stage() {
        let board = Board::from_tasks(&[task(1, Stage::InProgress)]);
        assert_eq!(board.column(Stage::InProgress).tasks.len(), 1);
        assert!(board.column(Stage::Done).tasks.is_empty());
    }
}
