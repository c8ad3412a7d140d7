//! Shared fakes and helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing_subscriber::fmt::MakeWriter;

use tcp_router_configurer::configurer::haproxy::render_config;
use tcp_router_configurer::configurer::{ConfigureError, RouterConfigurer};
use tcp_router_configurer::routing::{
    BackendHostInfo, ChangeEvent, ExternalPort, MappingRequest, RoutingTableSnapshot,
};
use tcp_router_configurer::routing_api::{EventStream, RoutingApiClient, TransportError};
use tcp_router_configurer::token::{AuthError, Token, TokenFetcher};

pub const BASE_CONFIG: &str = "global\n  maxconn 4096\n";

pub fn backend(address: &str, port: u16) -> BackendHostInfo {
    BackendHostInfo::new(address, port)
}

pub fn mapping(port: ExternalPort, backends: &[(&str, u16)]) -> MappingRequest {
    MappingRequest::new(
        port,
        backends.iter().map(|(a, p)| backend(a, *p)).collect(),
    )
}

pub fn upsert(port: ExternalPort, backends: &[(&str, u16)]) -> ChangeEvent {
    ChangeEvent::upsert(mapping(port, backends))
}

pub fn delete(port: ExternalPort) -> ChangeEvent {
    ChangeEvent::delete(MappingRequest::new(port, Vec::new()))
}

/// Records every apply; optionally fails them.
#[derive(Default)]
pub struct FakeConfigurer {
    calls: AtomicUsize,
    snapshots: Mutex<Vec<RoutingTableSnapshot>>,
    failure: Mutex<Option<String>>,
}

impl FakeConfigurer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let configurer = Self::default();
        *configurer.failure.lock().unwrap() = Some(message.to_string());
        Arc::new(configurer)
    }

    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_snapshot(&self) -> Option<RoutingTableSnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn last_rendered(&self) -> Option<String> {
        self.last_snapshot()
            .map(|snapshot| render_config(BASE_CONFIG, &snapshot))
    }
}

impl RouterConfigurer for FakeConfigurer {
    fn configure(&self, snapshot: &RoutingTableSnapshot) -> Result<(), ConfigureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().unwrap().push(snapshot.clone());
        match self.failure.lock().unwrap().clone() {
            Some(output) => Err(ConfigureError::Reload { output }),
            None => Ok(()),
        }
    }
}

/// Holds `fetch_all` calls until released.
#[derive(Default)]
pub struct FetchGate {
    pub entered: Notify,
    pub release: Notify,
}

/// Routing API double: a settable full snapshot and queued subscriptions.
pub struct FakeRoutingApi {
    fetch_result: Mutex<Result<Vec<MappingRequest>, TransportError>>,
    fetch_gate: Mutex<Option<Arc<FetchGate>>>,
    fetch_calls: AtomicUsize,
    subscriptions: Mutex<VecDeque<Result<EventStream, TransportError>>>,
    subscribe_times: Mutex<Vec<Instant>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl Default for FakeRoutingApi {
    fn default() -> Self {
        Self {
            fetch_result: Mutex::new(Ok(Vec::new())),
            fetch_gate: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            subscriptions: Mutex::new(VecDeque::new()),
            subscribe_times: Mutex::new(Vec::new()),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRoutingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fetch_result(&self, result: Result<Vec<MappingRequest>, TransportError>) {
        *self.fetch_result.lock().unwrap() = result;
    }

    /// Make every later `fetch_all` signal `entered` and wait for `release`.
    pub fn hold_fetches(&self) -> Arc<FetchGate> {
        let gate = Arc::new(FetchGate::default());
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Queue a successful subscription; events sent on the returned channel
    /// come out of the stream, and dropping it ends the stream.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<Result<ChangeEvent, TransportError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();
        self.subscriptions.lock().unwrap().push_back(Ok(events));
        tx
    }

    pub fn push_subscribe_error(&self, error: TransportError) {
        self.subscriptions.lock().unwrap().push_back(Err(error));
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_times(&self) -> Vec<Instant> {
        self.subscribe_times.lock().unwrap().clone()
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoutingApiClient for FakeRoutingApi {
    async fn subscribe(&self, token: &Token) -> Result<EventStream, TransportError> {
        self.subscribe_times.lock().unwrap().push(Instant::now());
        self.tokens_seen.lock().unwrap().push(token.value.clone());
        self.subscriptions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no subscription queued".into())))
    }

    async fn fetch_all(&self, token: &Token) -> Result<Vec<MappingRequest>, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(token.value.clone());
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.fetch_result.lock().unwrap().clone()
    }
}

/// Hands out `token-<n>` and records each call's `force_refresh`.
#[derive(Default)]
pub struct FakeTokenFetcher {
    issued: AtomicUsize,
    force_flags: Mutex<Vec<bool>>,
    failure: Mutex<Option<AuthError>>,
}

impl FakeTokenFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failure(&self, failure: Option<AuthError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn force_flags(&self) -> Vec<bool> {
        self.force_flags.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenFetcher for FakeTokenFetcher {
    async fn fetch_token(&self, force_refresh: bool) -> Result<Token, AuthError> {
        self.force_flags.lock().unwrap().push(force_refresh);
        if let Some(e) = self.failure.lock().unwrap().clone() {
            return Err(e);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Token::new(format!("token-{n}"), None))
    }
}

/// In-memory log sink for asserting on emitted tags.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's tracing output here until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Poll `condition` until it holds, giving up after `attempts` 10ms sleeps.
pub async fn eventually<F>(attempts: usize, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..attempts {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
