//! Shell-side fakes wired around the real reqwest client.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use library_shared::capabilities::{
    AssetReference, Capabilities, HttpClient, HttpRequest, HttpResult, LoadingIndicator,
    MemoryKvStore, Navigator, ReqwestHttpClient,
};
use library_shared::screens::NavigationRequest;
use library_shared::ClientConfig;
use secrecy::SecretString;

pub const TOKEN: &str = "secret-token";

/// Forwards to reqwest and keeps a copy of every request.
pub struct RecordingClient {
    inner: ReqwestHttpClient,
    seen: Mutex<Vec<HttpRequest>>,
}

impl RecordingClient {
    fn new() -> Self {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            inner: ReqwestHttpClient::with_client(client),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HttpClient for RecordingClient {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        self.seen.lock().unwrap().push(request.clone());
        self.inner.execute(request).await
    }
}

#[derive(Default)]
pub struct CountingIndicator {
    pub shows: AtomicUsize,
    pub hides: AtomicUsize,
}

impl CountingIndicator {
    pub fn counts(&self) -> (usize, usize) {
        (
            self.shows.load(Ordering::SeqCst),
            self.hides.load(Ordering::SeqCst),
        )
    }
}

impl LoadingIndicator for CountingIndicator {
    fn show(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct StackNavigator {
    pub pushed: Mutex<Vec<NavigationRequest>>,
}

impl StackNavigator {
    pub fn pushed(&self) -> Vec<NavigationRequest> {
        self.pushed.lock().unwrap().clone()
    }
}

impl Navigator for StackNavigator {
    fn navigate(&self, request: NavigationRequest) {
        self.pushed.lock().unwrap().push(request);
    }
}

pub struct Harness {
    pub caps: Capabilities,
    pub config: ClientConfig,
    pub http: Arc<RecordingClient>,
    pub navigator: Arc<StackNavigator>,
    pub loading: Arc<CountingIndicator>,
}

pub async fn harness(base_url: &str, with_token: bool) -> Harness {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        timeout_ms: 5_000,
        ..ClientConfig::default()
    };
    config.validate().unwrap();

    let http = Arc::new(RecordingClient::new());
    let navigator = Arc::new(StackNavigator::default());
    let loading = Arc::new(CountingIndicator::default());
    let mut caps = Capabilities::from_config(
        &config,
        Arc::new(MemoryKvStore::new()),
        navigator.clone(),
        loading.clone(),
    )
    .unwrap();
    caps.http = http.clone();

    if with_token {
        caps.tokens
            .store(&SecretString::new(TOKEN.to_string()))
            .await
            .unwrap();
    }

    Harness {
        caps,
        config,
        http,
        navigator,
        loading,
    }
}

/// Writes a file the image sniffer accepts as PNG.
pub fn png_file(dir: &tempfile::TempDir) -> AssetReference {
    let path = dir.path().join("avatar.png");
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    std::fs::write(&path, bytes).unwrap();
    AssetReference::new(format!("file://{}", path.display()))
}
