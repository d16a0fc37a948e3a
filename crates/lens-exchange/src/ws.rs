//! Bybit WebSocket client with authentication, auto-reconnect, and
//! keep-alive.
//!
//! Each [`WsClient`] runs as a tokio task that:
//! 1. Connects to the stream endpoint (TLS).
//! 2. Authenticates when credentials are configured (private stream),
//!    blocking on the auth ack before proceeding.
//! 3. Sends the subscription message for the configured channels.
//! 4. Reads frames and forwards them to a callback.
//! 5. Sends `{"op":"ping"}` on a fixed interval; a failed ping write tears
//!    the connection down.
//! 6. Reconnects on any failure with exponential backoff (30 s ceiling),
//!    retrying until the shutdown signal fires.
//!
//! The socket halves are owned exclusively by the connection task; every
//! write (auth, subscribe, ping, outbound) serializes through its single
//! select loop, so no two writers ever race on the socket.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::auth;
use crate::messages::{self, StreamMessage};

/// Callback invoked for each received text frame.
pub type OnFrameCallback = Arc<dyn Fn(&str) + Send + Sync>;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Initial reconnect delay; doubles per failure up to [`MAX_BACKOFF`].
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Reconnect delay ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How long to wait for the auth ack before declaring the attempt failed.
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for one stream connection.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Full WebSocket URL (e.g. `wss://stream.bybit.com/v5/public/spot`).
    pub url: String,
    /// Label used in log lines (e.g. `"public"`, `"private:alice"`).
    pub label: String,
    /// `(api_key, api_secret)` — present only for the private stream.
    pub credentials: Option<(String, String)>,
    /// Clock-skew window used for the auth expiry timestamp.
    pub recv_window_ms: u64,
    /// Channels subscribed immediately after connecting.
    pub channels: Vec<String>,
    /// Heartbeat ping interval.
    pub ping_interval: Duration,
}

/// A single stream connection managed by a background tokio task.
pub struct WsClient {
    config: WsConfig,
    outbound_tx: Option<mpsc::Sender<String>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsClient {
    /// Create a new (not yet started) client.
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            outbound_tx: None,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Start the connection task, forwarding each received frame to
    /// `on_frame`.
    ///
    /// Idempotent: returns `false` without opening a second socket when the
    /// client is already running.
    pub fn start(&mut self, on_frame: OnFrameCallback) -> bool {
        if self.task.is_some() {
            debug!("[ws-{}] start ignored, already running", self.config.label);
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, on_frame, outbound_rx, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.outbound_tx = Some(outbound_tx);
        self.task = Some(task);
        true
    }

    /// True while the connection task is running.
    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Queue a subscribe op for additional channels on the live connection.
    pub async fn subscribe(&self, channels: &[String]) -> anyhow::Result<()> {
        self.send(messages::build_subscribe(channels)).await
    }

    /// Queue a raw text message for the connection task to write.
    pub async fn send(&self, msg: String) -> anyhow::Result<()> {
        if let Some(tx) = &self.outbound_tx {
            tx.send(msg).await?;
        }
        Ok(())
    }

    /// Stop the connection and wait for the task to finish. No further
    /// reconnect attempts are made.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.outbound_tx = None;
    }
}

/// Next reconnect delay: doubled, capped at [`MAX_BACKOFF`].
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Main connection loop — connects, authenticates, subscribes, reads,
/// pings, reconnects.
async fn connection_loop(
    config: WsConfig,
    on_frame: OnFrameCallback,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;
    let label = config.label.clone();

    loop {
        if *shutdown_rx.borrow() {
            info!("[ws-{label}] shutdown requested");
            return;
        }

        info!("[ws-{label}] connecting to {}", config.url);

        let ws_stream = match tokio_tungstenite::connect_async(&config.url).await {
            Ok((stream, _response)) => {
                info!("[ws-{label}] connected");
                stream
            }
            Err(e) => {
                error!("[ws-{label}] connection failed: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = next_backoff(backoff);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // Private streams must authenticate before anything else; a failed
        // handshake tears this attempt down and re-enters the backoff path.
        if let Some((api_key, api_secret)) = &config.credentials {
            match authenticate(
                &mut ws_write,
                &mut ws_read,
                api_key,
                api_secret,
                config.recv_window_ms,
            )
            .await
            {
                Ok(()) => info!("[ws-{label}] authenticated"),
                Err(e) => {
                    error!("[ws-{label}] authentication failed: {e}");
                    let _ = ws_write.close().await;
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {},
                        _ = shutdown_rx.changed() => return,
                    }
                    backoff = next_backoff(backoff);
                    continue;
                }
            }
        }

        // Fire-and-forget subscription; acks arrive as control frames and
        // the exchange may push data before acking.
        if !config.channels.is_empty() {
            let sub_msg = messages::build_subscribe(&config.channels);
            debug!("[ws-{label}] subscribing: {sub_msg}");
            if let Err(e) = ws_write.send(Message::Text(sub_msg.into())).await {
                error!("[ws-{label}] subscribe send failed: {e}");
                continue;
            }
        }

        backoff = INITIAL_BACKOFF; // healthy connection resets the backoff

        let mut ping = tokio::time::interval(config.ping_interval);
        ping.tick().await; // consume the immediate first tick

        // Main read/write loop.
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("[ws-{label}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            on_frame(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("[ws-{label}] received close frame");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[ws-{label}] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[ws-{label}] stream ended");
                            break;
                        }
                        _ => {} // Binary, Pong, Frame — ignore
                    }
                }

                Some(msg) = outbound_rx.recv() => {
                    if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                        error!("[ws-{label}] send error: {e}");
                        break;
                    }
                }

                _ = ping.tick() => {
                    let ping_msg = serde_json::json!({"op": "ping"}).to_string();
                    if let Err(e) = ws_write.send(Message::Text(ping_msg.into())).await {
                        error!("[ws-{label}] ping send error: {e}");
                        break;
                    }
                }
            }
        }

        // Disconnected — reconnect at the top of the outer loop.
        warn!("[ws-{label}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = next_backoff(backoff);
    }
}

/// Perform the private-stream auth handshake and block on its ack.
async fn authenticate(
    ws_write: &mut WsSink,
    ws_read: &mut WsSource,
    api_key: &str,
    api_secret: &str,
    recv_window_ms: u64,
) -> anyhow::Result<()> {
    let expires = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
        + recv_window_ms as i64;
    let signature = auth::sign_ws_auth(api_secret, expires);

    let auth_msg = serde_json::json!({
        "op": "auth",
        "args": [api_key, expires, signature],
    });
    ws_write
        .send(Message::Text(auth_msg.to_string().into()))
        .await?;

    // The ack must arrive before any subscription is attempted.
    tokio::time::timeout(AUTH_TIMEOUT, async {
        while let Some(frame) = ws_read.next().await {
            match frame? {
                Message::Text(text) => match messages::decode_frame(&text) {
                    Ok(StreamMessage::AuthAck { success: true, .. }) => return Ok(()),
                    Ok(StreamMessage::AuthAck { success: false, ret_msg }) => {
                        anyhow::bail!("exchange rejected auth: {ret_msg}");
                    }
                    _ => continue, // unrelated control frame
                },
                Message::Close(_) => anyhow::bail!("connection closed during auth"),
                _ => continue,
            }
        }
        anyhow::bail!("stream ended during auth")
    })
    .await
    .map_err(|_| anyhow::anyhow!("auth ack timed out"))?
}
