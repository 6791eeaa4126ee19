use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::refresh::RefreshSchedule;
use super::state::{Session, SessionState};
use crate::client::{ApiClient, ApiError, SessionExpiryHandler};
use crate::config::SessionConfig;
use crate::models::{AuthResponse, User};
use crate::storage::{StorageError, TokenStorage};
use crate::ui::{Navigator, Notice, Notifier};

pub const LOGGED_OUT: &str = "Logged out successfully";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Server-supplied explanation, for inline form feedback.
    pub fn detail(&self) -> Option<&str> {
        match self {
            SessionError::Api(e) => e.detail(),
            SessionError::Storage(_) => None,
        }
    }
}

/// What a refresh attempt ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token replaced the stored one.
    Refreshed,
    /// Nobody is signed in; no request was sent.
    Skipped,
    /// The session it was issued for ended while it was in flight; the
    /// response was dropped.
    Stale,
    /// The refresh failed and the session was ended.
    LoggedOut,
}

#[derive(Debug, Clone, Copy)]
enum Flow {
    Login,
    Signup,
}

impl Flow {
    fn name(self) -> &'static str {
        match self {
            Flow::Login => "login",
            Flow::Signup => "signup",
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            Flow::Login => "Login successful!",
            Flow::Signup => "Account created successfully!",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Flow::Login => "Login failed",
            Flow::Signup => "Signup failed",
        }
    }
}

/// Owns the session: identity, stored token, and the refresh timer.
///
/// Cheap to clone; every clone drives the same session. Construct one per
/// process and hand it to whatever needs it.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    client: Arc<ApiClient>,
    storage: Arc<dyn TokenStorage>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    landing_route: String,
    dashboard_route: String,
    schedule: RefreshSchedule,
    session: watch::Sender<Session>,
    /// Bumped whenever the signed-in identity changes. Work started under an
    /// older generation must not touch the session.
    generation: AtomicU64,
    /// Serialises every write to storage and session.
    transition: AsyncMutex<()>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    initial_check: OnceCell<()>,
}

impl SessionStore {
    /// Builds the store and registers it with `client` as the owner the 401
    /// hook reports to.
    pub fn new(
        client: Arc<ApiClient>,
        storage: Arc<dyn TokenStorage>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        config: &SessionConfig,
    ) -> Self {
        let (session, _) = watch::channel(Session::new());
        let inner = Arc::new(StoreInner {
            client,
            storage,
            notifier,
            navigator,
            landing_route: config.landing_route.clone(),
            dashboard_route: config.dashboard_route.clone(),
            schedule: config.refresh.clone(),
            session,
            generation: AtomicU64::new(0),
            transition: AsyncMutex::new(()),
            refresh_task: Mutex::new(None),
            initial_check: OnceCell::new(),
        });

        let handler: Weak<StoreInner> = Arc::downgrade(&inner);
        inner.client.set_expiry_handler(handler);

        Self { inner }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.inner.client
    }

    pub fn current_session(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    /// A receiver that wakes on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    /// Verifies the stored token, once. Later calls wait for the first one
    /// and return without doing anything.
    pub async fn initialize(&self) {
        let inner = &self.inner;
        inner
            .initial_check
            .get_or_init(|| async { inner.check_session().await })
            .await;
    }

    /// Signs in. On failure the error comes back for inline display and a
    /// notice has already been shown.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let auth = self.inner.client.auth();
        self.inner
            .establish(Flow::Login, auth.login(email, password))
            .await
    }

    /// Registers a new account and signs in with it.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<User, SessionError> {
        let auth = self.inner.client.auth();
        self.inner
            .establish(Flow::Signup, auth.signup(username, email, password, full_name))
            .await
    }

    /// Ends the session locally. Safe to call when nobody is signed in.
    pub async fn logout(&self) {
        self.inner.end_session(None).await;
        self.inner.announce_logout();
    }

    /// Swaps the stored token for a fresh one without resubmitting credentials.
    pub async fn refresh_token(&self) -> RefreshOutcome {
        self.inner.refresh_token().await
    }
}

impl StoreInner {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    fn set_loading(&self) {
        self.session.send_modify(|s| s.loading = true);
    }

    fn finish_loading(&self) {
        self.session.send_modify(|s| {
            if !matches!(s.state, SessionState::Checking) {
                s.loading = false;
            }
        });
    }

    async fn check_session(self: &Arc<Self>) {
        let generation = {
            let _guard = self.transition.lock().await;
            if self.is_authenticated() {
                debug!("Already signed in; skipping initial session check");
                return;
            }
            self.session.send_replace(Session::checking());
            self.generation()
        };

        let token = match self.storage.get().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read stored token; treating session as anonymous");
                None
            }
        };

        let Some(token) = token else {
            let _guard = self.transition.lock().await;
            if self.generation() != generation {
                debug!("Session changed during the initial check; dropping its result");
                self.finish_loading();
                return;
            }
            info!("No stored token; session is anonymous");
            self.session.send_replace(Session::anonymous());
            return;
        };

        let result = self.client.auth().me().await;

        let _guard = self.transition.lock().await;
        if self.generation() != generation {
            debug!("Session changed during the initial check; dropping its result");
            self.finish_loading();
            return;
        }

        match result {
            Ok(user) => {
                info!(user = %user.username, "Restored session from stored token");
                let generation = self.begin_generation();
                self.session.send_replace(Session::authenticated(user));
                self.arm_refresh(generation, self.schedule.delay_for(&token, None));
            }
            Err(e) => {
                warn!(error = %e, "Stored token was not accepted; clearing it");
                self.begin_generation();
                if let Err(e) = self.storage.clear().await {
                    error!(error = %e, "Failed to clear rejected token");
                }
                self.session.send_replace(Session::anonymous());
            }
        }
    }

    async fn establish<F>(self: &Arc<Self>, flow: Flow, request: F) -> Result<User, SessionError>
    where
        F: Future<Output = Result<AuthResponse, ApiError>>,
    {
        self.set_loading();

        let response = match request.await {
            Ok(response) => response,
            Err(e) => {
                warn!(flow = flow.name(), error = %e, "Authentication request failed");
                let message = e.detail().unwrap_or(flow.failure_message()).to_string();
                self.notifier.notify(Notice::error(message));
                self.finish_loading();
                return Err(e.into());
            }
        };

        {
            let _guard = self.transition.lock().await;
            if let Err(e) = self.storage.set(&response.access_token).await {
                error!(flow = flow.name(), error = %e, "Could not persist token");
                self.notifier.notify(Notice::error(flow.failure_message()));
                self.finish_loading();
                return Err(e.into());
            }
            let generation = self.begin_generation();
            self.session
                .send_replace(Session::authenticated(response.user.clone()));
            let delay = self
                .schedule
                .delay_for(&response.access_token, response.expires_in);
            self.arm_refresh(generation, delay);
        }

        info!(flow = flow.name(), user = %response.user.username, "Signed in");
        self.notifier.notify(Notice::success(flow.success_message()));
        self.navigator.navigate(&self.dashboard_route);
        Ok(response.user)
    }

    /// Clears token and identity and cancels the timer. With `expected`, only
    /// does so if the session is still that generation. Returns whether it did.
    async fn end_session(&self, expected: Option<u64>) -> bool {
        let _guard = self.transition.lock().await;
        if let Some(expected) = expected {
            if self.generation() != expected {
                return false;
            }
        }

        self.begin_generation();
        self.cancel_refresh();
        if let Err(e) = self.storage.clear().await {
            error!(error = %e, "Failed to clear stored token");
        }
        self.session.send_replace(Session::anonymous());
        true
    }

    fn announce_logout(&self) {
        info!("Signed out");
        self.notifier.notify(Notice::success(LOGGED_OUT));
        self.navigator.navigate(&self.landing_route);
    }

    async fn refresh_token(self: &Arc<Self>) -> RefreshOutcome {
        let generation = self.generation();
        if !self.is_authenticated() {
            debug!("Not signed in; skipping token refresh");
            return RefreshOutcome::Skipped;
        }

        match self.client.auth().refresh().await {
            Ok(response) => {
                let guard = self.transition.lock().await;
                if self.generation() != generation {
                    debug!("Session ended while refreshing; discarding new token");
                    return RefreshOutcome::Stale;
                }
                if let Err(e) = self.storage.set(&response.access_token).await {
                    error!(error = %e, "Could not persist refreshed token");
                    drop(guard);
                    return self.logout_after_failed_refresh(generation).await;
                }
                let delay = self
                    .schedule
                    .delay_for(&response.access_token, response.expires_in);
                self.arm_refresh(generation, delay);
                debug!("Token refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.logout_after_failed_refresh(generation).await
            }
        }
    }

    async fn logout_after_failed_refresh(&self, generation: u64) -> RefreshOutcome {
        if self.end_session(Some(generation)).await {
            self.announce_logout();
            RefreshOutcome::LoggedOut
        } else if self.is_authenticated() {
            RefreshOutcome::Stale
        } else {
            // A 401 already ended it through the expiry hook.
            RefreshOutcome::LoggedOut
        }
    }

    /// Schedules the next silent refresh for `generation`, replacing any
    /// pending one.
    fn arm_refresh(self: &Arc<Self>, generation: u64, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "Arming token refresh");
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.generation() != generation {
                return;
            }
            // Separate task: re-arming from inside the refresh must not abort it.
            tokio::spawn(async move {
                inner.refresh_token().await;
            });
        });

        let previous = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_refresh(&self) {
        let pending = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            debug!("Cancelling scheduled token refresh");
            task.abort();
        }
    }
}

#[async_trait]
impl SessionExpiryHandler for StoreInner {
    async fn session_expired(&self) {
        if self.end_session(None).await {
            info!("Session expired; token and identity cleared");
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.cancel_refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::models::AuthToken;
    use crate::storage::{MemoryStorage, TokenReader};
    use crate::ui::{HistoryNavigator, NoticeLog};
    use chrono::Utc;
    use std::sync::atomic::AtomicBool;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LOGIN_BODY: &str = r#"{"access_token": "t1", "user": {"id": "1", "username": "ada", "email": "a@b.com", "created_at": "2024-05-01T10:20:30"}}"#;

    /// Memory storage whose first read sees the current value, then stalls.
    struct SlowFirstRead {
        inner: MemoryStorage,
        stalled: AtomicBool,
        delay: Duration,
    }

    #[async_trait]
    impl TokenStorage for SlowFirstRead {
        async fn get(&self) -> Result<Option<AuthToken>, StorageError> {
            let token = self.inner.get().await?;
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(self.delay).await;
            }
            Ok(token)
        }

        async fn set(&self, token: &AuthToken) -> Result<(), StorageError> {
            self.inner.set(token).await
        }

        async fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear().await
        }

        fn describe(&self) -> String {
            "slow memory".to_string()
        }
    }

    fn user() -> User {
        User {
            id: "1".to_string(),
            username: "ada".to_string(),
            email: "a@b.com".to_string(),
            full_name: None,
            created_at: Utc::now(),
            is_active: true,
        }
    }

    /// Answers every request with `body`, but only after `delay`.
    async fn slow_server(body: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn build_store(base_url: String, storage: Arc<dyn TokenStorage>) -> SessionStore {
        let notices = Arc::new(NoticeLog::new());
        let navigator = Arc::new(HistoryNavigator::new("/dashboard"));
        let api = ApiConfig {
            base_url,
            ..ApiConfig::default()
        };
        let client = Arc::new(
            ApiClient::new(
                &api,
                "/",
                TokenReader::new(storage.clone()),
                notices.clone(),
                navigator.clone(),
            )
            .unwrap(),
        );
        SessionStore::new(
            client,
            storage,
            notices,
            navigator,
            &SessionConfig::default(),
        )
    }

    /// Puts the store straight into a signed-in state without a login round trip.
    async fn sign_in_directly(store: &SessionStore, storage: &MemoryStorage) -> u64 {
        storage.set(&AuthToken::new("t1").unwrap()).await.unwrap();
        let inner = &store.inner;
        let _guard = inner.transition.lock().await;
        inner.session.send_replace(Session::authenticated(user()));
        inner.begin_generation()
    }

    /// A logout that lands while a refresh is in flight wins.
    #[tokio::test]
    async fn test_logout_beats_in_flight_refresh() {
        let url = slow_server(r#"{"access_token": "t2"}"#, Duration::from_millis(300)).await;
        let storage = Arc::new(MemoryStorage::new());
        let store = build_store(url, storage.clone());
        sign_in_directly(&store, &storage).await;

        let refreshing = store.refresh_token();
        let logging_out = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.logout().await;
        };
        let (outcome, ()) = tokio::join!(refreshing, logging_out);

        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(storage.get().await.unwrap(), None);
        assert!(!store.current_session().is_authenticated());
    }

    /// A refresh result for an older session never lands on a newer one.
    #[tokio::test]
    async fn test_refresh_from_previous_generation_is_dropped() {
        let url = slow_server(r#"{"access_token": "t2"}"#, Duration::from_millis(300)).await;
        let storage = Arc::new(MemoryStorage::new());
        let store = build_store(url, storage.clone());
        sign_in_directly(&store, &storage).await;

        let refreshing = store.refresh_token();
        let switching_user = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.logout().await;
            sign_in_directly(&store, &storage).await;
        };
        let (outcome, _) = tokio::join!(refreshing, switching_user);

        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(
            storage.get().await.unwrap(),
            Some(AuthToken::new("t1").unwrap())
        );
        assert!(store.current_session().is_authenticated());
    }

    /// A login that lands while the initial check is still reading storage
    /// keeps its session.
    #[tokio::test]
    async fn test_login_during_initial_check_is_kept() {
        let url = slow_server(LOGIN_BODY, Duration::ZERO).await;
        let storage = Arc::new(SlowFirstRead {
            inner: MemoryStorage::new(),
            stalled: AtomicBool::new(false),
            delay: Duration::from_millis(300),
        });
        let store = build_store(url, storage.clone());

        let checking = store.initialize();
        let logging_in = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.login("a@b.com", "pw").await
        };
        let ((), login) = tokio::join!(checking, logging_in);

        assert!(login.is_ok());
        let session = store.current_session();
        assert!(session.is_authenticated());
        assert!(!session.loading);
        assert_eq!(
            storage.get().await.unwrap(),
            Some(AuthToken::new("t1").unwrap())
        );
    }

    #[tokio::test]
    async fn test_generation_moves_on_every_identity_change() {
        let storage = Arc::new(MemoryStorage::new());
        let store = build_store("http://127.0.0.1:9".to_string(), storage.clone());
        let before = store.inner.generation();

        let signed_in = sign_in_directly(&store, &storage).await;
        assert!(signed_in > before);

        store.logout().await;
        assert!(store.inner.generation() > signed_in);
        assert!(store.inner.refresh_task.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropping_the_store_cancels_the_timer() {
        let storage = Arc::new(MemoryStorage::new());
        let store = build_store("http://127.0.0.1:9".to_string(), storage.clone());
        let generation = sign_in_directly(&store, &storage).await;
        store.inner.arm_refresh(generation, Duration::from_secs(3600));

        let weak = Arc::downgrade(&store.inner);
        drop(store);
        assert!(weak.upgrade().is_none());
    }
}
