//! Shared fakes for coordinator tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tradepost_core::{RefreshCoordinator, RefreshError, SessionListener, TokenRefresher, TokenStore};
use tradepost_domain::{AuthResponse, Session, UserProfile};

/// In-memory store holding one session.
#[derive(Default)]
pub struct MemoryStore {
    session: Mutex<Option<Session>>,
    pub clears: AtomicUsize,
}

impl MemoryStore {
    pub fn with_session(access: &str, refresh: Option<&str>) -> Arc<Self> {
        let store = Arc::new(Self::default());
        let mut session = Session::new(access);
        session.refresh_token = refresh.map(str::to_string);
        *store.session.lock() = Some(session);
        store
    }
}

impl TokenStore for MemoryStore {
    fn access_token(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.access_token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.session.lock().as_ref().and_then(|s| s.refresh_token.clone())
    }

    fn user(&self) -> Option<UserProfile> {
        self.session.lock().as_ref().and_then(|s| s.user.clone())
    }

    fn set_session(&self, session: &Session) -> tradepost_domain::Result<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> tradepost_domain::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.session.lock() = None;
        Ok(())
    }
}

/// Refresher that blocks until the test opens the gate, then replays a
/// scripted sequence of outcomes (the last one repeats).
pub struct GatedRefresher {
    gate: Semaphore,
    script: Mutex<Vec<Result<AuthResponse, RefreshError>>>,
    pub calls: AtomicUsize,
    pub seen_tokens: Mutex<Vec<String>>,
}

impl GatedRefresher {
    pub fn new(script: Vec<Result<AuthResponse, RefreshError>>) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            seen_tokens: Mutex::new(Vec::new()),
        })
    }

    /// Refresher that never blocks.
    pub fn open(script: Vec<Result<AuthResponse, RefreshError>>) -> Arc<Self> {
        let refresher = Self::new(script);
        refresher.release(usize::MAX >> 4);
        refresher
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

#[async_trait]
impl TokenRefresher for GatedRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().push(refresh_token.to_string());

        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        let mut script = self.script.lock();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script.first().cloned().unwrap_or(Err(RefreshError::Aborted))
        }
    }
}

/// Counts session notifications.
#[derive(Default)]
pub struct CountingListener {
    pub expired: AtomicUsize,
    pub refreshed: AtomicUsize,
}

impl SessionListener for CountingListener {
    fn on_session_expired(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_refreshed(&self) {
        self.refreshed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn refreshed(token: &str, refresh_token: Option<&str>) -> Result<AuthResponse, RefreshError> {
    Ok(AuthResponse {
        token: token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        user: None,
    })
}

/// Yield until `predicate` holds; panics after many rounds so a broken
/// coordinator fails the test instead of hanging it.
pub async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if predicate() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub fn coordinator(
    store: Arc<MemoryStore>,
    refresher: Arc<GatedRefresher>,
    listener: Arc<CountingListener>,
) -> Arc<RefreshCoordinator> {
    Arc::new(RefreshCoordinator::new(store, refresher).with_listener(listener))
}
