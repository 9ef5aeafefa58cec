//! Discord Gateway v10 — handshake, heartbeat, and event reader tasks.
//!
//! A session is: connect → HELLO → IDENTIFY → READY, then three tasks:
//! the writer (owns the sink), the heartbeat (zombie detection via ACKs)
//! and the reader (turns MESSAGE_CREATE into `InboundMessage`s).
//! There is no RESUME: any transport-level loss is reported once as
//! `SourceError::ConnectionLost` and the session ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use relaybot_core::error::SourceError;
use relaybot_core::types::{InboundMessage, SourceIdentity};

// ─────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────

/// GUILDS(1) + GUILD_MESSAGES(512) + MESSAGE_CONTENT(32768).
pub const GATEWAY_INTENTS: u64 = 1 + 512 + INTENT_MESSAGE_CONTENT;

/// Privileged intent; without it Discord withholds message bodies.
pub const INTENT_MESSAGE_CONTENT: u64 = 32768;

const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;
const CLOSE_DISALLOWED_INTENTS: u16 = 4014;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, WsMessage>;
type WsRead = SplitStream<WsStream>;

pub(crate) type EventResult = Result<InboundMessage, SourceError>;

// ─────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────

/// Why the handshake did not reach READY.
#[derive(Debug)]
pub(crate) enum HandshakeError {
    /// Close 4014: the bot may not request a privileged intent.
    DisallowedIntents,
    Source(SourceError),
}

impl From<SourceError> for HandshakeError {
    fn from(e: SourceError) -> Self {
        HandshakeError::Source(e)
    }
}

impl HandshakeError {
    pub(crate) fn into_source(self) -> SourceError {
        match self {
            HandshakeError::DisallowedIntents => {
                SourceError::Auth("gateway rejected the requested intents (close 4014)".into())
            }
            HandshakeError::Source(e) => e,
        }
    }
}

/// A live gateway session after READY.
pub(crate) struct GatewaySession {
    pub identity: SourceIdentity,
    pub events: mpsc::Receiver<EventResult>,
    pub shutdown: watch::Sender<bool>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Connect, identify, and wait for READY.
pub(crate) async fn open(
    url: &str,
    token: &str,
    intents: u64,
    handshake_timeout: Duration,
) -> Result<GatewaySession, HandshakeError> {
    debug!(url = %url, intents, "connecting to discord gateway");
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| SourceError::ConnectionLost(format!("gateway connect failed: {e}")))?;
    let (mut write, mut read) = ws.split();

    let interval = tokio::time::timeout(handshake_timeout, await_hello(&mut read))
        .await
        .map_err(|_| SourceError::Protocol("timed out waiting for HELLO".into()))??;
    debug!(interval_ms = interval, "discord HELLO received");

    write
        .send(WsMessage::text(identify_payload(token, intents).to_string()))
        .await
        .map_err(|e| SourceError::ConnectionLost(format!("failed to send IDENTIFY: {e}")))?;

    let (identity, seq) = tokio::time::timeout(handshake_timeout, await_ready(&mut read))
        .await
        .map_err(|_| SourceError::Protocol("timed out waiting for READY".into()))??;
    info!(user = %identity.username, id = identity.user_id, "discord bot READY");

    Ok(spawn_session(identity, seq, interval, write, read))
}

/// Next decoded JSON payload, mapping close frames to handshake errors.
async fn next_payload(read: &mut WsRead) -> Result<Value, HandshakeError> {
    loop {
        let frame = match read.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                return Err(SourceError::ConnectionLost(format!("gateway read error: {e}")).into())
            }
            None => return Err(SourceError::ConnectionLost("gateway closed during handshake".into()).into()),
        };
        match frame {
            WsMessage::Text(text) => match serde_json::from_str(text.as_str()) {
                Ok(v) => return Ok(v),
                Err(e) => warn!(error = %e, "discord ws invalid json"),
            },
            WsMessage::Close(frame) => return Err(handshake_close(frame.as_ref())),
            _ => {}
        }
    }
}

fn handshake_close(frame: Option<&CloseFrame>) -> HandshakeError {
    let (code, reason) = close_parts(frame);
    match code {
        Some(CLOSE_AUTHENTICATION_FAILED) => {
            SourceError::Auth(format!("authentication failed: {reason}")).into()
        }
        Some(CLOSE_DISALLOWED_INTENTS) => HandshakeError::DisallowedIntents,
        Some(c @ 4010..=4013) => SourceError::Protocol(format!("gateway close {c}: {reason}")).into(),
        _ => SourceError::ConnectionLost(describe_close(frame)).into(),
    }
}

async fn await_hello(read: &mut WsRead) -> Result<u64, HandshakeError> {
    loop {
        let payload = next_payload(read).await?;
        if payload["op"].as_u64() == Some(OP_HELLO) {
            return Ok(payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41250));
        }
    }
}

async fn await_ready(read: &mut WsRead) -> Result<(SourceIdentity, Option<u64>), HandshakeError> {
    loop {
        let payload = next_payload(read).await?;
        match payload["op"].as_u64() {
            Some(OP_DISPATCH) if payload["t"] == "READY" => {
                let user = &payload["d"]["user"];
                let user_id = user["id"]
                    .as_str()
                    .and_then(|id| id.parse().ok())
                    .ok_or_else(|| SourceError::Protocol("READY without a user id".into()))?;
                let identity = SourceIdentity {
                    user_id,
                    username: user["username"].as_str().unwrap_or("unknown").to_string(),
                };
                return Ok((identity, payload["s"].as_u64()));
            }
            Some(OP_INVALID_SESSION) => {
                return Err(SourceError::Auth("session invalidated during IDENTIFY".into()).into())
            }
            _ => {}
        }
    }
}

fn identify_payload(token: &str, intents: u64) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "relaybot",
                "device": "relaybot"
            }
        }
    })
}

fn heartbeat_payload(seq: Option<u64>) -> String {
    json!({ "op": OP_HEARTBEAT, "d": seq }).to_string()
}

fn close_parts(frame: Option<&CloseFrame>) -> (Option<u16>, String) {
    match frame {
        Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_string()),
        None => (None, String::new()),
    }
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    match close_parts(frame) {
        (Some(code), reason) if !reason.is_empty() => format!("gateway closed ({code}: {reason})"),
        (Some(code), _) => format!("gateway closed ({code})"),
        (None, _) => "gateway closed".to_string(),
    }
}

// ─────────────────────────────────────────────
// Session tasks
// ─────────────────────────────────────────────

fn spawn_session(
    identity: SourceIdentity,
    seq: Option<u64>,
    interval_ms: u64,
    write: WsWrite,
    read: WsRead,
) -> GatewaySession {
    let seq = Arc::new(Mutex::new(seq));
    let acked = Arc::new(AtomicBool::new(true));
    let (out_tx, out_rx) = mpsc::channel::<String>(16);
    let (event_tx, event_rx) = mpsc::channel::<EventResult>(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let writer = tokio::spawn(run_writer(write, out_rx, shutdown_rx.clone()));
    let heartbeat = tokio::spawn(run_heartbeat(
        Duration::from_millis(interval_ms),
        seq.clone(),
        acked.clone(),
        out_tx.clone(),
        event_tx.clone(),
        shutdown_rx.clone(),
    ));
    let reader = tokio::spawn(run_reader(read, seq, acked, out_tx, event_tx, shutdown_rx));

    GatewaySession {
        identity,
        events: event_rx,
        shutdown: shutdown_tx,
        tasks: vec![reader, heartbeat, writer],
    }
}

async fn run_writer(
    mut write: WsWrite,
    mut frames: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(WsMessage::Close(None)).await;
                break;
            }
            frame = frames.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(WsMessage::text(text)).await {
                        warn!(error = %e, "discord ws write error");
                        break;
                    }
                }
                None => break,
            }
        }
    }
    debug!("discord writer stopped");
}

async fn run_heartbeat(
    interval: Duration,
    seq: Arc<Mutex<Option<u64>>>,
    acked: Arc<AtomicBool>,
    frames: mpsc::Sender<String>,
    events: mpsc::Sender<EventResult>,
    mut shutdown: watch::Receiver<bool>,
) {
    let jitter = interval.mul_f64(rand_jitter());
    tokio::select! {
        _ = tokio::time::sleep(jitter) => {}
        _ = shutdown.changed() => return,
    }

    loop {
        if !acked.swap(false, Ordering::SeqCst) {
            warn!("discord heartbeat not ACKed, connection is a zombie");
            let _ = events
                .send(Err(SourceError::ConnectionLost(
                    "heartbeat not acknowledged".into(),
                )))
                .await;
            break;
        }

        let s = *seq.lock().await;
        if frames.send(heartbeat_payload(s)).await.is_err() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }
    }
}

async fn run_reader(
    mut read: WsRead,
    seq: Arc<Mutex<Option<u64>>>,
    acked: Arc<AtomicBool>,
    frames: mpsc::Sender<String>,
    events: mpsc::Sender<EventResult>,
    mut shutdown: watch::Receiver<bool>,
) {
    let lost = |reason: String| -> EventResult { Err(SourceError::ConnectionLost(reason)) };

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = read.next() => frame,
        };

        let text = match frame {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Close(frame))) => {
                info!("discord ws closed by server");
                let _ = events.send(lost(describe_close(frame.as_ref()))).await;
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                let _ = events.send(lost(format!("gateway read error: {e}"))).await;
                break;
            }
            None => {
                let _ = events.send(lost("gateway stream ended".into())).await;
                break;
            }
        };

        let payload: Value = match serde_json::from_str(text.as_str()) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "discord ws invalid json");
                continue;
            }
        };

        if let Some(s) = payload["s"].as_u64() {
            *seq.lock().await = Some(s);
        }

        match payload["op"].as_u64() {
            Some(OP_DISPATCH) => {
                let event = payload["t"].as_str().unwrap_or("");
                if event != "MESSAGE_CREATE" {
                    debug!(event = event, "discord event (unhandled)");
                    continue;
                }
                match parse_message_create(&payload["d"]) {
                    Some(msg) => {
                        if events.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    None => warn!("discord MESSAGE_CREATE missing ids, skipping"),
                }
            }
            Some(OP_HEARTBEAT_ACK) => acked.store(true, Ordering::SeqCst),
            Some(OP_HEARTBEAT) => {
                let s = *seq.lock().await;
                let _ = frames.send(heartbeat_payload(s)).await;
            }
            Some(OP_RECONNECT) => {
                info!("discord server requested reconnect");
                let _ = events.send(lost("server requested reconnect".into())).await;
                break;
            }
            Some(OP_INVALID_SESSION) => {
                warn!("discord invalid session");
                let _ = events.send(lost("session invalidated".into())).await;
                break;
            }
            _ => {}
        }
    }
    debug!("discord reader stopped");
}

/// A random fraction in `[0, 1)` for the first heartbeat.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos as f64) / 1_000_000_000.0
}

// ─────────────────────────────────────────────
// MESSAGE_CREATE
// ─────────────────────────────────────────────

/// Build an `InboundMessage` from a MESSAGE_CREATE payload.
///
/// `None` when the author or channel id is missing.
pub(crate) fn parse_message_create(data: &Value) -> Option<InboundMessage> {
    let author_id = data["author"]["id"].as_str()?.parse().ok()?;
    let channel_id = data["channel_id"].as_str()?.parse().ok()?;

    let mut msg = InboundMessage::new(author_id, display_name(data), channel_id, render_content(data));
    if let Some(guild_id) = data["guild_id"].as_str().and_then(|g| g.parse().ok()) {
        msg = msg.with_community(guild_id);
    }
    if let Some(ts) = data["timestamp"]
        .as_str()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
    {
        msg.received_at = ts.with_timezone(&Utc);
    }
    Some(msg)
}

/// Guild nickname → global display name → username.
fn display_name(data: &Value) -> String {
    [
        &data["member"]["nick"],
        &data["author"]["global_name"],
        &data["author"]["username"],
    ]
    .into_iter()
    .filter_map(Value::as_str)
    .find(|name| !name.trim().is_empty())
    .unwrap_or("unknown")
    .to_string()
}

/// Text plus attachment/embed markers; `None` when Discord withheld everything.
fn render_content(data: &Value) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(text) = data["content"].as_str().filter(|t| !t.is_empty()) {
        parts.push(text.to_string());
    }
    for att in data["attachments"].as_array().into_iter().flatten() {
        let filename = att["filename"].as_str().unwrap_or("file");
        parts.push(format!("[attachment: {filename}]"));
    }
    for embed in data["embeds"].as_array().into_iter().flatten() {
        match embed["title"].as_str() {
            Some(title) => parts.push(format!("[embed: {title}]")),
            None => parts.push("[embed]".to_string()),
        }
    }

    (!parts.is_empty()).then(|| parts.join("\n"))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
