//! In-crate fakes for the transport traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use relaybot_channels::{ChannelDirectory, DestinationSender, SourceConnection, SourceConnector};
use relaybot_core::error::{DestinationError, RewriteError, SourceError};
use relaybot_core::types::{
    AuthState, ChannelInfo, CommunityInfo, Customization, InboundMessage, LlmResponse, Message,
    OperatorIdentity, RelayConfig, RelaySessionState, Snowflake, SourceIdentity, StatusSnapshot,
};
use relaybot_providers::{LlmProvider, LlmRequestConfig, ProviderError, TextRewriter};

use crate::lifecycle::LifecycleManager;

pub(crate) const BOT_USER_ID: Snowflake = 999;
pub(crate) const TARGET: &str = "-100200";

// ─────────────────────────────────────────────
// Directory
// ─────────────────────────────────────────────

/// Communities 1 and 2; channels 10, 11 in community 1 and 20 in community 2.
#[derive(Clone, Default)]
pub(crate) struct FakeDirectory {
    pub communities: HashMap<Snowflake, String>,
    pub channels: HashMap<Snowflake, (Snowflake, String)>,
    pub fail_with: Option<SourceError>,
}

impl FakeDirectory {
    pub fn standard() -> Self {
        let communities = HashMap::from([(1, "Relay Guild".to_string()), (2, "Other Guild".to_string())]);
        let channels = HashMap::from([
            (10, (1, "general".to_string())),
            (11, (1, "news".to_string())),
            (20, (2, "random".to_string())),
        ]);
        Self {
            communities,
            channels,
            fail_with: None,
        }
    }
}

#[async_trait]
impl ChannelDirectory for FakeDirectory {
    async fn community(&self, id: Snowflake) -> Result<Option<CommunityInfo>, SourceError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        Ok(self.communities.get(&id).map(|name| CommunityInfo {
            id,
            name: name.clone(),
        }))
    }

    async fn channel(&self, id: Snowflake) -> Result<Option<ChannelInfo>, SourceError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        Ok(self.channels.get(&id).map(|(community, name)| ChannelInfo {
            id,
            community_id: Some(*community),
            name: name.clone(),
        }))
    }
}

// ─────────────────────────────────────────────
// Source
// ─────────────────────────────────────────────

type Feed = mpsc::UnboundedSender<Result<InboundMessage, SourceError>>;

#[derive(Default)]
struct SourceCounters {
    connects: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

/// Connector handing out scripted connections. Tests push events with `emit`.
#[derive(Default)]
pub(crate) struct FakeSource {
    directory: FakeDirectory,
    connect_error: Option<SourceError>,
    panic_on_connect: bool,
    feeds: Mutex<Vec<Feed>>,
    counters: Arc<SourceCounters>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            directory: FakeDirectory::standard(),
            ..Default::default()
        }
    }

    pub fn rejecting(error: SourceError) -> Self {
        Self {
            connect_error: Some(error),
            ..Self::new()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_on_connect: true,
            ..Self::new()
        }
    }

    /// Deliver an event to every open connection.
    pub fn emit(&self, message: InboundMessage) {
        self.push(Ok(message));
    }

    /// Make every open connection fail with `error`.
    pub fn break_connection(&self, error: SourceError) {
        self.push(Err(error));
    }

    fn push(&self, item: Result<InboundMessage, SourceError>) {
        self.feeds
            .lock()
            .unwrap()
            .retain(|feed| feed.send(item.clone()).is_ok());
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceConnector for FakeSource {
    async fn connect(&self, credential: &str) -> Result<Box<dyn SourceConnection>, SourceError> {
        assert!(!credential.is_empty());
        if self.panic_on_connect {
            panic!("fake source exploded");
        }
        if let Some(e) = &self.connect_error {
            return Err(e.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().push(tx);

        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(FakeConnection {
            identity: SourceIdentity {
                user_id: BOT_USER_ID,
                username: "relay-bot".into(),
            },
            directory: self.directory.clone(),
            events: Some(rx),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeConnection {
    identity: SourceIdentity,
    directory: FakeDirectory,
    events: Option<mpsc::UnboundedReceiver<Result<InboundMessage, SourceError>>>,
    counters: Arc<SourceCounters>,
}

impl FakeConnection {
    fn release(&mut self) {
        if self.events.take().is_some() {
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl ChannelDirectory for FakeConnection {
    async fn community(&self, id: Snowflake) -> Result<Option<CommunityInfo>, SourceError> {
        self.directory.community(id).await
    }

    async fn channel(&self, id: Snowflake) -> Result<Option<ChannelInfo>, SourceError> {
        self.directory.channel(id).await
    }
}

#[async_trait]
impl SourceConnection for FakeConnection {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    async fn next_event(&mut self) -> Result<Option<InboundMessage>, SourceError> {
        let Some(events) = self.events.as_mut() else {
            return Ok(None);
        };
        match events.recv().await {
            Some(item) => item.map(Some),
            None => Err(SourceError::ConnectionLost("feed dropped".into())),
        }
    }

    async fn close(&mut self) {
        self.release();
    }
}

// ─────────────────────────────────────────────
// Destination
// ─────────────────────────────────────────────

/// Records sends. Can fail the first N attempts or reject every target.
#[derive(Default)]
pub(crate) struct FakeDestination {
    fail_first: u32,
    reject_target: bool,
    delay: Duration,
    attempts: AtomicU32,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn rejecting_target() -> Self {
        Self {
            reject_target: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl DestinationSender for FakeDestination {
    async fn send_text(
        &self,
        credential: &str,
        target: &str,
        text: &str,
    ) -> Result<(), DestinationError> {
        assert!(!credential.is_empty());
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_target {
            return Err(DestinationError::InvalidTarget(target.to_string()));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if attempt <= self.fail_first {
            return Err(DestinationError::Transport("HTTP 502 Bad Gateway".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Rewriters and providers
// ─────────────────────────────────────────────

pub(crate) struct FakeRewriter {
    reply: Result<String, RewriteError>,
    seen: Mutex<Vec<(String, String)>>,
}

impl FakeRewriter {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RewriteError) -> Self {
        Self {
            reply: Err(error),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextRewriter for FakeRewriter {
    async fn rewrite(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, RewriteError> {
        self.seen
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_content.to_string()));
        self.reply.clone()
    }
}

/// A provider that answers long after any sensible deadline.
pub(crate) struct SlowProvider;

#[async_trait]
impl LlmProvider for SlowProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        _model: &str,
        _config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(LlmResponse {
            content: Some("too late".into()),
            ..Default::default()
        })
    }

    fn default_model(&self) -> &str {
        "slow-model"
    }

    fn display_name(&self) -> &str {
        "Slow"
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

pub(crate) fn operator() -> AuthState {
    AuthState::Authenticated(OperatorIdentity {
        id: "42".into(),
        username: "operator".into(),
    })
}

pub(crate) fn relay_config(links: &[&str]) -> RelayConfig {
    RelayConfig {
        source_credential: "discord-token".into(),
        destination_credential: "123:telegram".into(),
        destination_target: TARGET.into(),
        channel_links: links.iter().map(|l| l.to_string()).collect(),
        customization: Customization::disabled(),
    }
}

pub(crate) fn message(author_id: Snowflake, author: &str, channel_id: Snowflake, text: &str) -> InboundMessage {
    InboundMessage::new(author_id, author, channel_id, Some(text.to_string())).with_community(1)
}

/// Poll `status()` until `pred` holds. Panics after five seconds.
pub(crate) async fn wait_for_state(
    manager: &LifecycleManager,
    pred: impl Fn(&RelaySessionState) -> bool,
) -> StatusSnapshot {
    let poll = async {
        loop {
            let snapshot = manager.status();
            if pred(&snapshot.state) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    match tokio::time::timeout(Duration::from_secs(5), poll).await {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("state never matched; last: {:?}", manager.status()),
    }
}

/// Poll until the destination has recorded `count` messages.
pub(crate) async fn wait_for_sent(destination: &FakeDestination, count: usize) {
    let poll = async {
        while destination.sent().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), poll).await.is_err() {
        panic!("expected {count} sends, got {:?}", destination.sent());
    }
}
