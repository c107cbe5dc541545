/*
[INPUT]:  User task actions, change-feed reload requests, a TaskRemote backend
[OUTPUT]: The client-visible task collection via `watch`, plus loading/syncing flags
[POS]:    Core layer - optimistic task synchronization with reload-on-failure
[UPDATE]: When changing mutation semantics, reconciliation, or load coalescing
*/

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use wing_kanban_adapter::{Direction, KanbanError, NewTask, Stage, Task, TaskId, TaskRemote};

use crate::board::{Board, tasks_in_stage};
use crate::snapshot::{SnapshotStore, TASKS_SNAPSHOT_KEY};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("remote task store: {0}")]
    Remote(#[from] KanbanError),
}

/// Everything a presentation layer needs to render the board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    pub tasks: Vec<Task>,
    /// True until the first load attempt completes
    pub loading: bool,
    /// True while at least one remote write is in flight
    pub syncing: bool,
}

/// Where the collection came from after `load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Remote,
    Snapshot,
    /// Remote failed and no snapshot exists; collection reset to the last
    /// confirmed state plus edits still in flight
    Unchanged,
    /// A fetch that started after this request already refreshed the collection
    Coalesced,
}

/// Result of a move or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to do (unknown id or already at the boundary stage)
    Unchanged,
    /// Applied locally and confirmed remotely
    Applied,
    /// Remote write failed; the collection was reloaded
    Reconciled,
}

#[derive(Debug, Clone)]
enum PendingEdit {
    Move { id: TaskId, stage: Stage },
    Delete { id: TaskId },
}

impl PendingEdit {
    fn apply(&self, tasks: &mut Vec<Task>) {
        match self {
            Self::Move { id, stage } => {
                if let Some(task) = tasks.iter_mut().find(|t| &t.id == id) {
                    task.status = *stage;
                }
            }
            Self::Delete { id } => tasks.retain(|t| &t.id != id),
        }
    }
}

/// Last confirmed collection plus the optimistic edits still awaiting the remote
#[derive(Debug, Default)]
struct Ledger {
    confirmed: Vec<Task>,
    pending: Vec<(u64, PendingEdit)>,
    next_ticket: u64,
}

impl Ledger {
    fn begin(&mut self, edit: PendingEdit) -> u64 {
        self.next_ticket += 1;
        self.pending.push((self.next_ticket, edit));
        self.next_ticket
    }

    /// Drop the pending edit; fold it into the confirmed collection on success
    fn settle(&mut self, ticket: u64, confirmed: bool) {
        let Some(index) = self.pending.iter().position(|(t, _)| *t == ticket) else {
            return;
        };
        let (_, edit) = self.pending.remove(index);
        if confirmed {
            edit.apply(&mut self.confirmed);
        }
    }

    fn view(&self) -> Vec<Task> {
        let mut tasks = self.confirmed.clone();
        for (_, edit) in &self.pending {
            edit.apply(&mut tasks);
        }
        tasks
    }
}

/// Canonical client-side view of the task collection.
///
/// All writes go through the `watch` sender, so subscribers observe
/// optimistic changes immediately and reloads as a single replacement.
pub struct TaskStore {
    remote: Arc<dyn TaskRemote>,
    snapshot: Option<SnapshotStore>,
    state: watch::Sender<BoardState>,
    ledger: SyncMutex<Ledger>,
    load_gate: Mutex<()>,
    load_requests: AtomicU64,
    load_covered: AtomicU64,
    writes_in_flight: AtomicUsize,
}

impl TaskStore {
    pub fn new(remote: Arc<dyn TaskRemote>) -> Self {
        let (state, _rx) = watch::channel(BoardState {
            tasks: Vec::new(),
            loading: true,
            syncing: false,
        });
        Self {
            remote,
            snapshot: None,
            state,
            ledger: SyncMutex::new(Ledger::default()),
            load_gate: Mutex::new(()),
            load_requests: AtomicU64::new(0),
            load_covered: AtomicU64::new(0),
            writes_in_flight: AtomicUsize::new(0),
        }
    }

    /// Persist confirmed state under the tasks snapshot key and fall back to it
    pub fn with_snapshot(mut self, snapshot: SnapshotStore) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Subscribe to every state change (optimistic edits included)
    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    pub fn find(&self, id: &TaskId) -> Option<Task> {
        self.state.borrow().tasks.iter().find(|t| &t.id == id).cloned()
    }

    pub fn tasks_by_status(&self, stage: Stage) -> Vec<Task> {
        tasks_in_stage(&self.state.borrow().tasks, stage)
    }

    pub fn board(&self) -> Board {
        Board::from_tasks(&self.state.borrow().tasks)
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_syncing(&self) -> bool {
        self.state.borrow().syncing
    }

    /// Replace the collection with the remote one, or the snapshot if the
    /// remote is unreachable. Never fails.
    pub async fn load(&self) -> LoadOutcome {
        let ticket = self.load_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let _gate = self.load_gate.lock().await;

        if self.load_covered.load(Ordering::SeqCst) >= ticket {
            debug!(ticket, "task load satisfied by a newer fetch");
            return LoadOutcome::Coalesced;
        }

        // Every request issued so far is answered by the fetch starting now
        let covers = self.load_requests.load(Ordering::SeqCst);

        match self.remote.select_all().await {
            Ok(mut tasks) => {
                // Stable, so equal timestamps keep the remote's order
                tasks.sort_by_key(|t| t.created_at);
                let count = tasks.len();
                self.ledger().confirmed = tasks.clone();
                self.state.send_modify(|state| {
                    state.tasks = tasks;
                    state.loading = false;
                });
                self.load_covered.fetch_max(covers, Ordering::SeqCst);
                self.persist_snapshot().await;
                debug!(count, "tasks loaded from remote");
                LoadOutcome::Remote
            }
            Err(err) => {
                warn!(error = %err, "task load failed; falling back to local snapshot");
                match self.read_snapshot().await {
                    Some(tasks) => {
                        let count = tasks.len();
                        let tasks = {
                            let mut ledger = self.ledger();
                            ledger.confirmed = tasks;
                            ledger.view()
                        };
                        self.state.send_modify(|state| {
                            state.tasks = tasks;
                            state.loading = false;
                        });
                        info!(count, "tasks restored from local snapshot");
                        LoadOutcome::Snapshot
                    }
                    None => {
                        // Back to the confirmed collection; failed edits are gone from the ledger
                        let tasks = self.ledger().view();
                        self.state.send_if_modified(|state| {
                            let changed = state.loading || state.tasks != tasks;
                            state.tasks = tasks;
                            state.loading = false;
                            changed
                        });
                        LoadOutcome::Unchanged
                    }
                }
            }
        }
    }

    /// Create a task at the first stage.
    ///
    /// A blank title is ignored (`Ok(None)`) without contacting the remote.
    /// On failure nothing was applied locally, so the error must reach the user.
    pub async fn add_task(&self, title: &str) -> Result<Option<Task>, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            debug!("ignoring blank task title");
            return Ok(None);
        }

        let _write = self.begin_write();
        let task = match self.remote.insert(NewTask::new(title)).await {
            Ok(task) => task,
            Err(err) => {
                warn!(error = %err, "task insert failed");
                return Err(err.into());
            }
        };

        {
            let mut ledger = self.ledger();
            if !ledger.confirmed.iter().any(|t| t.id == task.id) {
                ledger.confirmed.push(task.clone());
            }
        }
        self.state.send_if_modified(|state| {
            // A change-feed reload may already have picked the row up
            if state.tasks.iter().any(|t| t.id == task.id) {
                return false;
            }
            state.tasks.push(task.clone());
            true
        });
        self.persist_snapshot().await;
        info!(task_id = %task.id, "task added");
        Ok(Some(task))
    }

    /// Shift a task one stage, optimistically. A remote failure triggers a full reload.
    pub async fn move_task(&self, id: &TaskId, direction: Direction) -> SyncOutcome {
        let mut target: Option<Stage> = None;
        self.state.send_if_modified(|state| {
            let Some(task) = state.tasks.iter_mut().find(|t| &t.id == id) else {
                return false;
            };
            let next = task.status.shift(direction);
            if next == task.status {
                return false;
            }
            task.status = next;
            target = Some(next);
            true
        });

        let Some(stage) = target else {
            debug!(task_id = %id, ?direction, "move is a no-op");
            return SyncOutcome::Unchanged;
        };

        let ticket = self.ledger().begin(PendingEdit::Move {
            id: id.clone(),
            stage,
        });
        let _write = self.begin_write();
        let result = self.remote.update_status(id, stage).await;
        self.ledger().settle(ticket, result.is_ok());
        match result {
            Ok(()) => {
                self.persist_snapshot().await;
                debug!(task_id = %id, %stage, "task moved");
                SyncOutcome::Applied
            }
            Err(err) => {
                warn!(task_id = %id, %stage, error = %err, "task move failed; reloading");
                self.load().await;
                SyncOutcome::Reconciled
            }
        }
    }

    /// Remove a task, optimistically. A remote failure triggers a full reload.
    pub async fn delete_task(&self, id: &TaskId) -> SyncOutcome {
        let mut removed = false;
        self.state.send_if_modified(|state| {
            let before = state.tasks.len();
            state.tasks.retain(|t| &t.id != id);
            removed = state.tasks.len() != before;
            removed
        });

        if !removed {
            debug!(task_id = %id, "delete of unknown task ignored");
            return SyncOutcome::Unchanged;
        }

        let ticket = self.ledger().begin(PendingEdit::Delete { id: id.clone() });
        let _write = self.begin_write();
        let result = self.remote.delete(id).await;
        self.ledger().settle(ticket, result.is_ok());
        match result {
            Ok(()) => {
                self.persist_snapshot().await;
                debug!(task_id = %id, "task deleted");
                SyncOutcome::Applied
            }
            Err(err) => {
                warn!(task_id = %id, error = %err, "task delete failed; reloading");
                self.load().await;
                SyncOutcome::Reconciled
            }
        }
    }

    fn begin_write(&self) -> WriteGuard<'_> {
        self.writes_in_flight.fetch_add(1, Ordering::SeqCst);
        self.state.send_if_modified(|state| {
            let changed = !state.syncing;
            state.syncing = true;
            changed
        });
        WriteGuard { store: self }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Only confirmed state is persisted, never another write's optimistic edit
    async fn persist_snapshot(&self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let tasks = self.ledger().confirmed.clone();
        if let Err(err) = snapshot.write(TASKS_SNAPSHOT_KEY, &tasks).await {
            warn!(error = %err, "failed to write task snapshot");
        }
    }

    async fn read_snapshot(&self) -> Option<Vec<Task>> {
        let snapshot = self.snapshot.as_ref()?;
        match snapshot.read::<Vec<Task>>(TASKS_SNAPSHOT_KEY).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "failed to read task snapshot");
                None
            }
        }
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskStore")
            .field("tasks", &state.tasks.len())
            .field("loading", &state.loading)
            .field("syncing", &state.syncing)
            .field("snapshot", &self.snapshot.as_ref().map(|s| s.dir().to_path_buf()))
            .finish()
    }
}

struct WriteGuard<'a> {
    store: &'a TaskStore,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.store.writes_in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.store.state.send_if_modified(|state| {
                let changed = state.syncing;
                state.syncing = false;
                changed
            });
        }
    }
}
