pub mod asset;
pub mod http;
pub mod kv;

use std::sync::Arc;

pub use self::asset::{AssetError, AssetReference, AssetSource, FsAssetSource, LoadedAsset};
pub use self::http::{
    HostPolicy, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    HttpResult, ReqwestHttpClient, ValidatedUrl,
};
#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use self::kv::SqliteKvStore;
pub use self::kv::{KeyValueStore, KvError, KvKey, MemoryKvStore, TokenStore};

use crate::config::ClientConfig;
use crate::screens::NavigationRequest;

/// Screen navigation owned by the platform shell.
pub trait Navigator: Send + Sync {
    fn navigate(&self, request: NavigationRequest);
}

/// Blocking loading overlay owned by the platform shell.
pub trait LoadingIndicator: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Everything the core needs from the outside world.
#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpClient>,
    pub tokens: TokenStore,
    pub assets: Arc<dyn AssetSource>,
    pub navigator: Arc<dyn Navigator>,
    pub loading: Arc<dyn LoadingIndicator>,
}

impl Capabilities {
    /// Standard wiring: reqwest transport and local-file assets around the
    /// shell's store, navigator and loading overlay.
    pub fn from_config(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        loading: Arc<dyn LoadingIndicator>,
    ) -> Result<Self, KvError> {
        Ok(Self {
            http: Arc::new(ReqwestHttpClient::new()),
            tokens: TokenStore::with_key(store, &config.token_key)?,
            assets: Arc::new(FsAssetSource::new(config.max_asset_bytes)),
            navigator,
            loading,
        })
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use bytes::Bytes;

    use crate::capabilities::http::HttpHeaders;

    /// Replays queued results and records every request it receives.
    /// An empty queue answers `200 {}`.
    #[derive(Default)]
    pub struct ScriptedHttpClient {
        responses: Mutex<VecDeque<HttpResult>>,
        requests: Mutex<Vec<HttpRequest>>,
        gate: Option<Arc<tokio::sync::Semaphore>>,
    }

    impl ScriptedHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Each request waits for a permit on `gate` before answering.
        pub fn gated(gate: Arc<tokio::sync::Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        pub fn push(&self, result: HttpResult) -> &Self {
            if let Ok(mut queue) = self.responses.lock() {
                queue.push_back(result);
            }
            self
        }

        pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
            self.push(Ok(json_response(status, &body)))
        }

        pub fn push_unreachable(&self) -> &Self {
            self.push(Err(HttpError::ConnectionError {
                host: "10.0.2.2".into(),
                message: "Network Error".into(),
            }))
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or_default()
        }
    }

    pub fn json_response(status: u16, body: &serde_json::Value) -> HttpResponse {
        HttpResponse::new(
            status,
            HttpHeaders::from(vec![(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            body.to_string().into_bytes(),
            "scripted".into(),
            1,
        )
    }

    #[async_trait::async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn execute(&self, request: HttpRequest) -> HttpResult {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
            next.unwrap_or_else(|| Ok(json_response(200, &serde_json::json!({}))))
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingIndicator {
        shows: AtomicUsize,
        hides: AtomicUsize,
    }

    impl RecordingIndicator {
        pub fn shows(&self) -> usize {
            self.shows.load(Ordering::SeqCst)
        }

        pub fn hides(&self) -> usize {
            self.hides.load(Ordering::SeqCst)
        }
    }

    impl LoadingIndicator for RecordingIndicator {
        fn show(&self) {
            self.shows.fetch_add(1, Ordering::SeqCst);
        }

        fn hide(&self) {
            self.hides.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingNavigator {
        requests: Mutex<Vec<NavigationRequest>>,
    }

    impl RecordingNavigator {
        pub fn requests(&self) -> Vec<NavigationRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, request: NavigationRequest) {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
        }
    }

    /// Serves the same bytes for every URI.
    #[derive(Debug, Clone)]
    pub struct StaticAssetSource {
        pub bytes: Bytes,
        pub mime_type: String,
    }

    impl StaticAssetSource {
        pub fn png() -> Self {
            Self {
                bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
                mime_type: "image/png".into(),
            }
        }
    }

    #[async_trait::async_trait]
    impl AssetSource for StaticAssetSource {
        async fn load(&self, asset: &AssetReference) -> Result<LoadedAsset, AssetError> {
            Ok(LoadedAsset {
                bytes: self.bytes.clone(),
                mime_type: asset
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| self.mime_type.clone()),
            })
        }
    }

    pub struct TestCapabilities {
        pub caps: Capabilities,
        pub http: Arc<ScriptedHttpClient>,
        pub kv: Arc<MemoryKvStore>,
        pub navigator: Arc<RecordingNavigator>,
        pub loading: Arc<RecordingIndicator>,
    }

    /// Fakes wired together, with a stored access token unless
    /// `with_token` is false.
    pub async fn mock_capabilities(http: ScriptedHttpClient, with_token: bool) -> TestCapabilities {
        let http = Arc::new(http);
        let kv = Arc::new(MemoryKvStore::new());
        let tokens = TokenStore::new(kv.clone());
        if with_token {
            let _ = tokens
                .store(&secrecy::SecretString::new("test-token".to_string()))
                .await;
        }
        let navigator = Arc::new(RecordingNavigator::default());
        let loading = Arc::new(RecordingIndicator::default());

        TestCapabilities {
            caps: Capabilities {
                http: http.clone(),
                tokens,
                assets: Arc::new(StaticAssetSource::png()),
                navigator: navigator.clone(),
                loading: loading.clone(),
            },
            http,
            kv,
            navigator,
            loading,
        }
    }
}
