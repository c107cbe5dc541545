/*
[INPUT]:  Project URL + API key of the hosted task table, realtime settings
[OUTPUT]: ChangeSource backed by the realtime WebSocket channel
[POS]:    Sync layer - production transport for the change feed
[UPDATE]: When changing join handshake, event filtering, or teardown order
*/

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use wing_kanban_adapter::{
    ChangeEvent, KanbanClient, KanbanError, RealtimeConfig, RealtimeMessage, RealtimeSocket,
    Result,
};

use crate::change_feed::ChangeSource;

struct ActiveChannel {
    socket: RealtimeSocket,
    forwarder: JoinHandle<()>,
}

/// One socket per subscription; a dropped socket is replaced on resubscribe.
pub struct RealtimeChangeSource {
    endpoint: Url,
    schema: String,
    table: String,
    socket_config: RealtimeConfig,
    join_timeout: Duration,
    active: Mutex<Option<ActiveChannel>>,
}

impl RealtimeChangeSource {
    pub fn new(
        endpoint: Url,
        schema: impl Into<String>,
        table: impl Into<String>,
        socket_config: RealtimeConfig,
        join_timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            schema: schema.into(),
            table: table.into(),
            socket_config,
            join_timeout,
            active: Mutex::new(None),
        }
    }

    /// Watch the same table the REST client writes to
    pub fn for_client(
        client: &KanbanClient,
        socket_config: RealtimeConfig,
        join_timeout: Duration,
    ) -> Result<Self> {
        let endpoint = RealtimeSocket::endpoint_url(client.project_url(), client.api_key())?;
        Ok(Self::new(
            endpoint,
            client.schema(),
            client.table(),
            socket_config,
            join_timeout,
        ))
    }

    async fn await_join(
        &self,
        messages: &mut mpsc::Receiver<RealtimeMessage>,
        join_ref: &str,
    ) -> Result<()> {
        let handshake = async {
            while let Some(message) = messages.recv().await {
                match message {
                    RealtimeMessage::Reply {
                        topic,
                        reference,
                        ok,
                        reason,
                    } if reference == join_ref => {
                        if ok {
                            return Ok(());
                        }
                        return Err(KanbanError::SubscriptionRejected {
                            topic,
                            reason: reason.unwrap_or_else(|| "join refused".to_string()),
                        });
                    }
                    RealtimeMessage::ChannelError { topic, reason } => {
                        return Err(KanbanError::SubscriptionRejected { topic, reason });
                    }
                    other => debug!(?other, "ignoring frame before join reply"),
                }
            }
            Err(KanbanError::WebSocket(
                "realtime socket closed before join reply".to_string(),
            ))
        };

        tokio::time::timeout(self.join_timeout, handshake)
            .await
            .map_err(|_| KanbanError::Timeout {
                duration: self.join_timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl ChangeSource for RealtimeChangeSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>> {
        self.unsubscribe().await;

        let mut socket = RealtimeSocket::with_config(self.socket_config.clone());
        let mut messages = socket
            .take_receiver()
            .ok_or_else(|| KanbanError::WebSocket("realtime receiver unavailable".to_string()))?;

        socket.connect(&self.endpoint).await?;
        let join_ref = match socket.join_table(&self.schema, &self.table).await {
            Ok(reference) => reference,
            Err(err) => {
                socket.close().await;
                return Err(err);
            }
        };
        if let Err(err) = self.await_join(&mut messages, &join_ref).await {
            socket.close().await;
            return Err(err);
        }
        info!(schema = %self.schema, table = %self.table, "realtime channel joined");

        let (event_tx, event_rx) = mpsc::channel(self.socket_config.channel_capacity);
        let table = self.table.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = event_tx.closed() => break,
                    message = messages.recv() => match message {
                        Some(RealtimeMessage::Change(event)) => {
                            if !event.table.is_empty() && event.table != table {
                                continue;
                            }
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Some(RealtimeMessage::ChannelError { topic, reason }) => {
                            warn!(%topic, %reason, "realtime channel error");
                            break;
                        }
                        Some(RealtimeMessage::ChannelClosed { topic }) => {
                            warn!(%topic, "realtime channel closed by server");
                            break;
                        }
                        Some(_) => {}
                        None => {
                            debug!("realtime socket stream ended");
                            break;
                        }
                    },
                }
            }
        });

        *self.active.lock().await = Some(ActiveChannel { socket, forwarder });
        Ok(event_rx)
    }

    async fn unsubscribe(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };

        if active.socket.is_connected().await {
            if let Err(err) = active.socket.leave_table(&self.schema, &self.table).await {
                debug!(error = %err, "realtime leave not sent");
            }
        }
        active.socket.close().await;
        active.forwarder.abort();
        info!(table = %self.table, "realtime channel released");
    }
}

impl std::fmt::Debug for RealtimeChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChangeSource")
            .field("host", &self.endpoint.host_str())
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("join_timeout", &self.join_timeout)
            .finish()
    }
}
