//! Single-flight token refresh
//!
//! The first caller that needs a refresh moves the coordinator from `Idle` to
//! `Refreshing` and starts the refresh call. Every caller that arrives while
//! `Refreshing` is queued and receives the same outcome, in the order it
//! joined the queue. The refresh itself runs on a spawned task so a caller
//! that gives up (dropped future, timeout) cannot leave the coordinator stuck
//! in `Refreshing`.
//!
//! On success the new session is stored before the queue is released. On
//! failure the session is cleared, the [`SessionListener`] is told the session
//! expired, and every queued caller gets the same [`RefreshError`]. A refresh
//! never triggers another refresh.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};
use tradepost_common::{RetryDecision, RetryPolicy};

use super::error::RefreshError;
use super::ports::{SessionListener, TokenRefresher, TokenStore};

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

type RefreshOutcome = Result<String, RefreshError>;

struct Inner {
    state: RefreshState,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Ensures at most one outstanding refresh call at a time
pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    listener: Option<Arc<dyn SessionListener>>,
    retry: RetryPolicy,
    inner: Mutex<Inner>,
    refresh_calls: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("refresh_calls", &self.refresh_calls())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator that never retries the refresh call
    pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            listener: None,
            retry: RetryPolicy::no_retry(),
            inner: Mutex::new(Inner { state: RefreshState::Idle, waiters: VecDeque::new() }),
            refresh_calls: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Retry transport failures of the refresh call itself
    ///
    /// A rejected refresh (any HTTP status) is never retried.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock().state
    }

    /// Callers currently waiting on the in-flight refresh
    pub fn queued(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Refresh calls issued so far
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Obtain a fresh access token
    ///
    /// `stale` is the access token the caller saw rejected. If a refresh has
    /// already replaced it, the current token is returned without another
    /// refresh call. If the session has already been cleared, the call fails
    /// with [`RefreshError::NoRefreshToken`] without notifying the listener
    /// again.
    ///
    /// # Errors
    /// Returns the shared [`RefreshError`] when the refresh fails; the session
    /// has been cleared by then.
    #[instrument(skip_all, fields(queued = tracing::field::Empty))]
    pub async fn refresh(self: &Arc<Self>, stale: Option<&str>) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();

        let lead = {
            let mut inner = self.inner.lock();
            match inner.state {
                RefreshState::Idle => {
                    if let Some(stale) = stale {
                        match self.store.session() {
                            Some(current) if current.access_token != stale => {
                                debug!("access token already replaced, skipping refresh");
                                return Ok(current.access_token);
                            }
                            None if self.store.refresh_token().is_none() => {
                                debug!("session already cleared, skipping refresh");
                                return Err(RefreshError::NoRefreshToken);
                            }
                            _ => {}
                        }
                    }
                    inner.state = RefreshState::Refreshing;
                    inner.waiters.push_back(tx);
                    true
                }
                RefreshState::Refreshing => {
                    inner.waiters.push_back(tx);
                    tracing::Span::current().record("queued", inner.waiters.len());
                    false
                }
            }
        };

        if lead {
            info!("token_refresh_start");
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_refresh().await });
        } else {
            debug!("token refresh in flight, queued");
        }

        rx.await.unwrap_or(Err(RefreshError::Aborted))
    }

    async fn run_refresh(&self) {
        let guard = SettleGuard { coordinator: self, settled: false };
        let outcome = self.perform_refresh().await;

        match &outcome {
            Ok(_) => {
                info!("token_refresh_success");
                if let Some(listener) = &self.listener {
                    listener.on_session_refreshed();
                }
            }
            Err(err) => {
                warn!(error = %err, "token_refresh_failed");
                if let Some(listener) = &self.listener {
                    listener.on_session_expired();
                }
            }
        }

        guard.settle(&outcome);
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let previous = self.store.session();
        let refresh_token = match &previous {
            Some(session) => session.refresh_token.clone(),
            None => self.store.refresh_token(),
        };
        let Some(refresh_token) = refresh_token else {
            return Err(self.fail_closed(RefreshError::NoRefreshToken));
        };

        let mut attempt = 0;
        let response = loop {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match self.refresher.refresh(&refresh_token).await {
                Ok(response) => break response,
                Err(err) => match self.retry.decide(attempt, &err) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(attempt = attempt + 1, error = %err, "token refresh failed, retrying");
                        self.retry.wait(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::Stop => return Err(self.fail_closed(err)),
                },
            }
        };

        let session = response.into_session(previous.as_ref());
        if let Err(err) = self.store.set_session(&session) {
            return Err(self.fail_closed(RefreshError::Storage(err.to_string())));
        }

        Ok(session.access_token)
    }

    fn fail_closed(&self, err: RefreshError) -> RefreshError {
        if let Err(clear_err) = self.store.clear() {
            error!(error = %clear_err, "failed to clear session after refresh failure");
        }
        err
    }
}

/// Returns the coordinator to `Idle` and releases the queue, even if the
/// refresh task unwinds.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let waiters = self.take_waiters();
        for waiter in waiters {
            // The caller may have stopped waiting.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn take_waiters(&self) -> VecDeque<oneshot::Sender<RefreshOutcome>> {
        let mut inner = self.coordinator.inner.lock();
        inner.state = RefreshState::Idle;
        std::mem::take(&mut inner.waiters)
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            // Dropping the senders rejects the remaining callers with `Aborted`.
            drop(self.take_waiters());
        }
    }
}
