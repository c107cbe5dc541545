/*
[INPUT]:  Realtime endpoint URL, API key, and table subscriptions
[OUTPUT]: Change notifications and server replies via channels
[POS]:    WebSocket layer - realtime stream handling
[UPDATE]: When adding new channels or changing connection logic
*/

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::{Instant, interval_at};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{KanbanError, Result};
use crate::ws::message::{PhoenixFrame, RealtimeMessage};

const REALTIME_PATH: &str = "realtime/v1/websocket";
const PROTOCOL_VERSION: &str = "1.0.0";
const MESSAGE_SAMPLE_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static MESSAGE_SAMPLE_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Realtime socket configuration
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub heartbeat_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            channel_capacity: 100,
        }
    }
}

/// WebSocket client for the realtime change channel
#[derive(Debug)]
pub struct RealtimeSocket {
    config: RealtimeConfig,
    // Moved into the socket loop on connect so the receiver closes when the loop ends
    message_tx: Mutex<Option<mpsc::Sender<RealtimeMessage>>>,
    message_rx: Option<mpsc::Receiver<RealtimeMessage>>,
    outbound_tx: Arc<Mutex<Option<mpsc::Sender<WsMessage>>>>,
    // Dropped with the socket; the loop flushes queued frames, then closes
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    next_ref: Arc<AtomicU64>,
}

impl RealtimeSocket {
    /// Create a new realtime client
    pub fn new() -> Self {
        Self::with_config(RealtimeConfig::default())
    }

    pub fn with_config(config: RealtimeConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        Self {
            config,
            message_tx: Mutex::new(Some(tx)),
            message_rx: Some(rx),
            outbound_tx: Arc::new(Mutex::new(None)),
            shutdown_tx: Mutex::new(None),
            next_ref: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Derive `ws(s)://<project>/realtime/v1/websocket?apikey=..&vsn=1.0.0`
    pub fn endpoint_url(project_url: &Url, api_key: &str) -> Result<Url> {
        let mut url = project_url.join(REALTIME_PATH)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(KanbanError::Config(format!(
                    "unsupported realtime scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| KanbanError::Config(format!("cannot use scheme {scheme}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", api_key)
            .append_pair("vsn", PROTOCOL_VERSION);
        Ok(url)
    }

    /// Get the message receiver
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<RealtimeMessage>> {
        self.message_rx.take()
    }

    pub async fn is_connected(&self) -> bool {
        self.outbound_tx.lock().await.is_some()
    }

    /// Open the socket and start the read/write/heartbeat loop
    pub async fn connect(&self, url: &Url) -> Result<()> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|err| KanbanError::WebSocket(err.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) =
            mpsc::channel::<WsMessage>(self.config.channel_capacity);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let outbound_state = self.outbound_tx.clone();

        let message_tx = {
            let mut guard = outbound_state.lock().await;
            if guard.is_some() {
                return Err(KanbanError::WebSocket(
                    "realtime socket already connected".to_string(),
                ));
            }
            let message_tx = self.message_tx.lock().await.take().ok_or_else(|| {
                KanbanError::WebSocket("realtime socket cannot be reconnected".to_string())
            })?;
            *guard = Some(outbound_tx);
            *self.shutdown_tx.lock().await = Some(shutdown_tx);
            message_tx
        };

        info!(host = url.host_str().unwrap_or_default(), "realtime socket connected");

        let outbound_state_for_task = outbound_state.clone();
        let next_ref = self.next_ref.clone();
        let period = self.config.heartbeat_interval;

        tokio::spawn(async move {
            let mut heartbeat = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    biased;

                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(message) => {
                                if write.send(message).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("realtime socket dropped; closing");
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let reference = next_ref.fetch_add(1, Ordering::Relaxed).to_string();
                        let frame = PhoenixFrame::heartbeat(&reference);
                        let Ok(text) = serde_json::to_string(&frame) else {
                            continue;
                        };
                        if write.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Close(_))) => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                            Some(Ok(message)) => {
                                if let Some(parsed) = Self::parse_message(message) {
                                    if message_tx.send(parsed).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "realtime socket read failed");
                                break;
                            }
                            None => {
                                break;
                            }
                        }
                    }
                }
            }

            debug!("realtime socket loop exited");
            let mut guard = outbound_state_for_task.lock().await;
            *guard = None;
        });

        Ok(())
    }

    /// Join the change channel for one table; returns the join reference
    pub async fn join_table(&self, schema: &str, table: &str) -> Result<String> {
        let reference = self.next_reference();
        let frame = PhoenixFrame::join_table(schema, table, &reference);
        self.send_frame(&frame).await?;
        info!(schema, table, reference = %reference, "realtime join sent");
        Ok(reference)
    }

    /// Leave the change channel for one table
    pub async fn leave_table(&self, schema: &str, table: &str) -> Result<()> {
        let reference = self.next_reference();
        let frame = PhoenixFrame::leave_table(schema, table, &reference);
        self.send_frame(&frame).await?;
        info!(schema, table, "realtime leave sent");
        Ok(())
    }

    /// Close the socket once queued frames are flushed. The loop sends a
    /// close frame and exits. Dropping the socket has the same effect.
    pub async fn close(&self) {
        let mut guard = self.outbound_tx.lock().await;
        guard.take();
    }

    fn next_reference(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn send_frame(&self, frame: &PhoenixFrame) -> Result<()> {
        let sender = {
            let guard = self.outbound_tx.lock().await;
            guard
                .clone()
                .ok_or_else(|| KanbanError::WebSocket("realtime socket not connected".to_string()))?
        };

        let text = serde_json::to_string(frame)?;
        sender
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|_| KanbanError::WebSocket("realtime send channel closed".to_string()))
    }

    fn parse_message(message: WsMessage) -> Option<RealtimeMessage> {
        let text: String = match message {
            WsMessage::Text(text) => text.as_str().to_string(),
            WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok()?,
            _ => return None,
        };

        match serde_json::from_str::<PhoenixFrame>(&text) {
            Ok(frame) => {
                let parsed = RealtimeMessage::from_frame(frame);
                log_message_sample_once(&parsed);
                Some(parsed)
            }
            Err(err) => {
                log_parse_fail_once(&err, &text);
                None
            }
        }
    }
}

impl Default for RealtimeSocket {
    fn default() -> Self {
        Self::new()
    }
}

fn log_message_sample_once(message: &RealtimeMessage) {
    let count = MESSAGE_SAMPLE_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= MESSAGE_SAMPLE_LIMIT {
        return;
    }

    let kind = match message {
        RealtimeMessage::Change(_) => "change",
        RealtimeMessage::Reply { .. } => "reply",
        RealtimeMessage::ChannelError { .. } => "channel_error",
        RealtimeMessage::ChannelClosed { .. } => "channel_closed",
        RealtimeMessage::Other => "other",
    };
    info!(
        sample_index = count + 1,
        sample_limit = MESSAGE_SAMPLE_LIMIT,
        kind,
        "realtime message sample"
    );
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "realtime message parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            message = %preview,
            "realtime message parse failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
