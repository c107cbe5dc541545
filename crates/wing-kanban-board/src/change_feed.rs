/*
[INPUT]:  A ChangeSource (realtime transport) and the shared TaskStore
[OUTPUT]: Store reloads on every remote change + subscription state via `watch`
[POS]:    Sync layer - realtime freshness for the store (never a hard dependency)
[UPDATE]: When changing resubscribe backoff, burst coalescing, or teardown semantics
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wing_kanban_adapter::{ChangeEvent, Result};

use crate::store::TaskStore;

const DEFAULT_MAX_RETRIES: u32 = 10;

/// Transport that delivers "something changed" notifications for the task table.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Open a standing subscription covering insert, update and delete.
    /// The stream ends when the subscription drops.
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>>;

    /// Release the subscription. Must be safe to call when not subscribed.
    async fn unsubscribe(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    Unsubscribed,
    Connecting,
    Subscribed,
    /// Realtime unavailable; the store still works on manual loads
    Degraded { retry_count: u32 },
}

#[derive(Debug, Clone)]
pub struct ChangeFeedOptions {
    /// Consecutive failed subscribe attempts before giving up. A non-retryable
    /// error (e.g. a rejected join) gives up at once.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ChangeFeedOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Keeps a TaskStore fresh by reloading it whenever the remote table changes.
///
/// Dropping the feed cancels the worker; `unsubscribe` additionally waits for
/// the remote subscription to be released.
#[derive(Debug)]
pub struct ChangeFeed {
    state: Arc<watch::Sender<FeedState>>,
    shutdown: CancellationToken,
    worker_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ChangeFeed {
    /// Start the subscription worker. Must be called inside a Tokio runtime.
    pub fn subscribe(
        source: Arc<dyn ChangeSource>,
        store: Arc<TaskStore>,
        options: ChangeFeedOptions,
    ) -> Self {
        let (state, _rx) = watch::channel(FeedState::Unsubscribed);
        let state = Arc::new(state);
        let shutdown = CancellationToken::new();

        let worker = ChangeFeedWorker {
            source,
            store,
            state: state.clone(),
            shutdown: shutdown.clone(),
            options,
        };
        let worker_handle = tokio::spawn(worker.run());

        Self {
            state,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Subscribe to subscription state changes
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Tear down: stop the worker and release the remote subscription
    pub async fn unsubscribe(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.worker_handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "change feed worker ended abnormally");
            }
        }
        self.state.send_replace(FeedState::Unsubscribed);
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct ChangeFeedWorker {
    source: Arc<dyn ChangeSource>,
    store: Arc<TaskStore>,
    state: Arc<watch::Sender<FeedState>>,
    shutdown: CancellationToken,
    options: ChangeFeedOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamExit {
    Dropped,
    Shutdown,
}

impl ChangeFeedWorker {
    async fn run(self) {
        let mut retry_count: u32 = 0;

        'run: loop {
            if self.shutdown.is_cancelled() {
                break 'run;
            }

            self.state.send_replace(FeedState::Connecting);

            let subscribed = tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                result = self.source.subscribe() => result,
            };

            match subscribed {
                Ok(mut events) => {
                    retry_count = 0;
                    self.state.send_replace(FeedState::Subscribed);
                    info!("change feed subscribed");

                    // Changes made while we were not listening
                    self.store.load().await;

                    match self.stream_loop(&mut events).await {
                        StreamExit::Shutdown => break 'run,
                        StreamExit::Dropped => {
                            warn!("change feed subscription dropped; resubscribing");
                            self.source.unsubscribe().await;
                            retry_count = 1;
                            self.state.send_replace(FeedState::Degraded { retry_count });
                        }
                    }
                }
                Err(err) => {
                    retry_count = retry_count.saturating_add(1);
                    self.state.send_replace(FeedState::Degraded { retry_count });

                    if !err.is_retryable() || retry_count >= self.options.max_retries {
                        warn!(
                            retry_count,
                            max_retries = self.options.max_retries,
                            retryable = err.is_retryable(),
                            error = %err,
                            "change feed gave up subscribing; manual loads only"
                        );
                        self.source.unsubscribe().await;
                        return;
                    }

                    warn!(retry_count, error = %err, "change feed subscribe failed");
                }
            }

            let backoff = self.backoff_duration(retry_count);
            debug!(retry_count, ?backoff, "change feed waiting before resubscribe");
            tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        self.source.unsubscribe().await;
        self.state.send_replace(FeedState::Unsubscribed);
        info!("change feed unsubscribed");
    }

    async fn stream_loop(&self, events: &mut mpsc::Receiver<ChangeEvent>) -> StreamExit {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return StreamExit::Shutdown,
                event = events.recv() => {
                    let Some(event) = event else {
                        return StreamExit::Dropped;
                    };

                    // Anything queued behind this event is covered by the same reload
                    let mut coalesced = 0usize;
                    while events.try_recv().is_ok() {
                        coalesced += 1;
                    }
                    debug!(kind = ?event.kind, table = %event.table, coalesced, "remote change; reloading");
                    self.store.load().await;
                }
            }
        }
    }

    fn backoff_duration(&self, retry_count: u32) -> Duration {
        backoff_duration(retry_count, self.options.base_backoff, self.options.max_backoff)
    }
}

fn backoff_duration(retry_count: u32, base: Duration, max: Duration) -> Duration {
    let exp = retry_count.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exp).min(max)
}
