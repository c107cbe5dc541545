/*
[INPUT]:  Test scenarios needing a task backend or a change transport
[OUTPUT]: In-memory TaskRemote/ChangeSource fakes, a fake realtime server, wait helpers
[POS]:    Test infrastructure - shared across board integration tests
[UPDATE]: When the TaskRemote or ChangeSource seams change
*/

#![allow(dead_code)]

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use wing_kanban_adapter::{
    ChangeEvent, ChangeKind, KanbanError, NewTask, Result, Stage, Task, TaskId, TaskRemote,
};
use wing_kanban_board::ChangeSource;

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + offset_secs, 0).unwrap()
}

pub fn task(id: i64, title: &str, status: Stage, offset_secs: i64) -> Task {
    Task {
        id: TaskId::from(id),
        title: title.to_string(),
        status,
        created_at: at(offset_secs),
    }
}

fn unavailable() -> KanbanError {
    KanbanError::Api {
        code: 503,
        message: "service unavailable".to_string(),
    }
}

/// In-memory remote table with switchable failures, delays and call counters
#[derive(Default)]
pub struct FakeRemote {
    rows: Mutex<Vec<Task>>,
    next_id: AtomicI64,
    pub fail_select: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    pub select_delay_ms: AtomicU64,
    pub update_delay_ms: AtomicU64,
    pub select_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn with_rows(rows: Vec<Task>) -> Self {
        let next = rows
            .iter()
            .filter_map(|t| t.id.as_str().parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        let remote = Self::default();
        remote.next_id.store(next, Ordering::SeqCst);
        *remote.rows.lock().unwrap() = rows;
        remote
    }

    /// Write straight to the table, as another client would
    pub fn push_row(&self, task: Task) {
        self.rows.lock().unwrap().push(task);
    }

    pub fn rows(&self) -> Vec<Task> {
        self.rows.lock().unwrap().clone()
    }

    pub fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRemote for FakeRemote {
    async fn select_all(&self) -> Result<Vec<Task>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.select_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.rows())
    }

    async fn insert(&self, task: NewTask) -> Result<Task> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = Task {
            id: TaskId::from(id),
            title: task.title,
            status: task.status,
            created_at: at(10_000 + id),
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_status(&self, id: &TaskId, status: Stage) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.update_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| KanbanError::NotFound(id.to_string()))?;
        row.status = status;
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.rows.lock().unwrap().retain(|t| &t.id != id);
        Ok(())
    }
}

/// Scripted change transport: tests emit events and drop streams at will
#[derive(Default)]
pub struct FakeChangeSource {
    current: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
    /// Reject the join outright (not retried)
    pub refuse: AtomicBool,
    /// Fail as a transport error (retried)
    pub unreachable: AtomicBool,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
}

impl FakeChangeSource {
    /// Returns false when no subscription is open
    pub fn emit(&self, kind: ChangeKind) -> bool {
        let sender = self.current.lock().unwrap().clone();
        match sender {
            Some(sender) => sender
                .try_send(ChangeEvent {
                    kind,
                    schema: "public".to_string(),
                    table: "tasks".to_string(),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Simulate the server dropping the subscription
    pub fn drop_stream(&self) {
        self.current.lock().unwrap().take();
    }
}

#[async_trait]
impl ChangeSource for FakeChangeSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(KanbanError::WebSocket("connection refused".to_string()));
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(KanbanError::SubscriptionRejected {
                topic: "realtime:public:tasks".to_string(),
                reason: "refused".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(64);
        *self.current.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().take();
    }
}

/// Poll `check` until it holds or `limit` elapses
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// How the fake realtime server answers `phx_join`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    Accept,
    Refuse,
    /// Never answer, leaving the client waiting on its join
    Silent,
}

/// Minimal realtime server for one connection. Joins are answered per
/// `JoinReply`, received frames are forwarded to the test, pushed frames go
/// to the client.
pub struct FakeRealtimeServer {
    pub url: Url,
    pub received: mpsc::UnboundedReceiver<serde_json::Value>,
    pub push: mpsc::UnboundedSender<serde_json::Value>,
}

pub async fn start_realtime_server(join_reply: JoinReply) -> FakeRealtimeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<serde_json::Value>();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                pushed = push_rx.recv() => {
                    let Some(frame) = pushed else { break };
                    if write.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            let parsed = serde_json::from_str::<serde_json::Value>(text.as_str());
                            let Ok(frame) = parsed else { continue };
                            let answer = (frame["event"] == "phx_join")
                                .then(|| join_payload(join_reply))
                                .flatten();
                            if let Some(payload) = answer {
                                let reply = serde_json::json!({
                                    "topic": frame["topic"],
                                    "event": "phx_reply",
                                    "payload": payload,
                                    "ref": frame["ref"],
                                });
                                let _ = write.send(WsMessage::Text(reply.to_string().into())).await;
                            }
                            let _ = received_tx.send(frame);
                        }
                        Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => {
                            let _ = received_tx.send(serde_json::json!({"event": "__closed"}));
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    });

    FakeRealtimeServer {
        url: Url::parse(&format!("ws://{addr}/realtime/v1/websocket")).expect("url"),
        received: received_rx,
        push: push_tx,
    }
}

fn join_payload(join_reply: JoinReply) -> Option<serde_json::Value> {
    match join_reply {
        JoinReply::Accept => Some(serde_json::json!({
            "status": "ok",
            "response": {"postgres_changes": []}
        })),
        JoinReply::Refuse => Some(serde_json::json!({
            "status": "error",
            "response": {"reason": "table not in publication"}
        })),
        JoinReply::Silent => None,
    }
}

pub fn change_frame(kind: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": "realtime:public:tasks",
        "event": "postgres_changes",
        "payload": {
            "data": {"schema": "public", "table": "tasks", "type": kind, "record": {"id": 1}}
        },
        "ref": null
    })
}
