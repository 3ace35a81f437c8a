use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tradepost_core::SessionListener;
use tradepost_domain::{ClientConfig, RetrySettings, Session};
use tradepost_infra::{ApiClient, KeyValueTokenStore, MemoryBackend};

/// Unsigned JWT carrying `payload` as its claims
pub fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.sig")
}

/// Base URL nothing listens on; connecting to it is refused
pub fn unreachable_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Config pointed at `base` with millisecond backoff so retries stay fast
pub fn fast_config(base: &str) -> ClientConfig {
    ClientConfig {
        api_url: base.to_string(),
        request_timeout_ms: 2_000,
        retry: RetrySettings { max_attempts: 3, base_delay_ms: 1, max_delay_ms: 5 },
        ..Default::default()
    }
}

/// Records session notifications
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub expired: AtomicUsize,
    pub refreshed: AtomicUsize,
}

impl RecordingListener {
    pub fn expired(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn refreshed(&self) -> usize {
        self.refreshed.load(Ordering::SeqCst)
    }
}

impl SessionListener for RecordingListener {
    fn on_session_expired(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_refreshed(&self) {
        self.refreshed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Client plus the handles a test inspects afterwards
pub struct TestClient {
    pub client: Arc<ApiClient>,
    pub store: Arc<KeyValueTokenStore<MemoryBackend>>,
    pub listener: Arc<RecordingListener>,
}

impl TestClient {
    pub fn new(config: ClientConfig) -> Self {
        let store = Arc::new(KeyValueTokenStore::in_memory());
        let listener = Arc::new(RecordingListener::default());

        let client = ApiClient::builder()
            .config(config)
            .store(store.clone())
            .listener(listener.clone())
            .build()
            .expect("client should build");

        Self { client: Arc::new(client), store, listener }
    }

    pub fn with_session(self, access: &str, refresh: &str) -> Self {
        use tradepost_core::TokenStore;

        self.store
            .set_session(&Session::new(access).with_refresh_token(refresh))
            .expect("session should be stored");
        self
    }
}
