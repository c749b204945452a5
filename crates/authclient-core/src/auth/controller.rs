//! Top-level session owner.
//!
//! The `SessionController` exposes the auth endpoints (login, signup,
//! password reset), logout, and `execute` for every other call. It turns
//! expiry notices from the interceptor into a fenced logout and broadcasts
//! `SessionEvent`s so the UI can navigate.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use super::{Profile, Session, SessionStore};
use crate::api::payloads::{
    AuthResponse, ForgotPasswordRequest, LoginCredentials, MessageResponse, ResetPasswordRequest,
    SignupRequest, FORGOT_PASSWORD_PATH, LOGIN_PATH, RESET_PASSWORD_PATH, SIGNUP_PATH,
};
use crate::api::{
    ClientError, ExpiryNotice, HttpResponse, ReauthInterceptor, RequestDescriptor, RequestExecutor,
};
use crate::config::Config;
use crate::storage::SessionStorage;

/// Capacity of the session event channel.
/// Events are rare; a lagging subscriber only misses old signals.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Signals for the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum SessionEvent {
    /// Authentication failed terminally; the session is being cleared
    Expired,
    /// The session was cleared; show the login view
    Cleared,
}

pub struct SessionController {
    store: Arc<SessionStore>,
    interceptor: ReauthInterceptor,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Open the session store on `storage` and build the request pipeline.
    ///
    /// Must be called from within a Tokio runtime: the expiry watcher runs
    /// as a background task.
    pub fn new(config: &Config, storage: Box<dyn SessionStorage>) -> Result<Self, ClientError> {
        let store = Arc::new(SessionStore::open(storage)?);
        Self::with_store(config, store)
    }

    /// Build on an already-open store
    pub fn with_store(config: &Config, store: Arc<SessionStore>) -> Result<Self, ClientError> {
        let executor = RequestExecutor::new(&config.base_url, config.request_timeout(), Arc::clone(&store))?;
        Ok(Self::from_executor(executor))
    }

    pub fn from_executor(executor: RequestExecutor) -> Self {
        let store = Arc::clone(executor.store());
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(watch_expiry(expiry_rx, Arc::clone(&store), events.clone()));

        Self {
            store,
            interceptor: ReauthInterceptor::new(executor, expiry_tx),
            events,
        }
    }

    /// Subscribe to `SessionEvent`s
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.store.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.read().is_present()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.store.read().profile().cloned()
    }

    /// Send any request through the reauthenticating pipeline
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, ClientError> {
        self.interceptor.execute(descriptor).await
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(), ClientError> {
        let descriptor = RequestDescriptor::post(LOGIN_PATH).json(credentials)?.public();
        self.sign_in(&descriptor).await?;
        info!("Login successful");
        Ok(())
    }

    /// Create an account. The server signs the new user in.
    pub async fn signup(&self, account: &SignupRequest) -> Result<(), ClientError> {
        let descriptor = RequestDescriptor::post(SIGNUP_PATH).json(account)?.public();
        self.sign_in(&descriptor).await?;
        info!("Signup successful");
        Ok(())
    }

    /// Ask the server to send a password reset link; returns its message
    pub async fn forgot_password(&self, email: &str) -> Result<String, ClientError> {
        let descriptor = RequestDescriptor::post(FORGOT_PASSWORD_PATH)
            .json(&ForgotPasswordRequest { email })?
            .public();
        let response: MessageResponse = self.interceptor.execute(&descriptor).await?.json()?;
        Ok(response.message)
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, ClientError> {
        let descriptor = RequestDescriptor::post(RESET_PASSWORD_PATH)
            .json(&ResetPasswordRequest { token, new_password })?
            .public();
        let response: MessageResponse = self.interceptor.execute(&descriptor).await?.json()?;
        Ok(response.message)
    }

    /// Clear the session and tell the UI.
    ///
    /// A refresh still in flight is fenced by the store's epoch: its tokens
    /// are discarded and its waiters get `SessionExpired`.
    pub fn logout(&self) -> Result<(), ClientError> {
        end_session(&self.store, &self.events)?;
        info!("Logged out");
        Ok(())
    }

    async fn sign_in(&self, descriptor: &RequestDescriptor) -> Result<(), ClientError> {
        let auth: AuthResponse = self.interceptor.execute(descriptor).await?.json()?;
        self.store.write(auth.into_session())?;
        Ok(())
    }
}

/// Clear the session, signalling `Cleared` only when one was present.
fn end_session(
    store: &SessionStore,
    events: &broadcast::Sender<SessionEvent>,
) -> Result<(), ClientError> {
    match store.clear() {
        Ok(false) => Ok(()),
        Ok(true) => {
            // Receivers may not exist yet; that's fine
            let _ = events.send(SessionEvent::Cleared);
            Ok(())
        }
        Err(e) => {
            // Memory is already cleared
            let _ = events.send(SessionEvent::Cleared);
            Err(e.into())
        }
    }
}

/// Turn expiry notices into a logout of the session they refer to.
///
/// Notices for an epoch that has since been superseded (a new login) are
/// dropped, and repeated notices for the same epoch are signalled once.
/// Ends when the interceptor is dropped.
async fn watch_expiry(
    mut expiry_rx: mpsc::UnboundedReceiver<ExpiryNotice>,
    store: Arc<SessionStore>,
    events: broadcast::Sender<SessionEvent>,
) {
    let mut signalled: Option<u64> = None;

    while let Some(ExpiryNotice { reason, epoch }) = expiry_rx.recv().await {
        if signalled == Some(epoch) {
            debug!(?reason, epoch, "Expiry already signalled");
            continue;
        }
        match store.clear_if_current(epoch) {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(?reason, epoch, "Session replaced since expiry, ignoring notice");
                continue;
            }
            Err(e) => error!(error = %e, "Failed to clear expired session"),
        }

        info!(?reason, "Session expired");
        signalled = Some(epoch);
        let _ = events.send(SessionEvent::Expired);
        let _ = events.send(SessionEvent::Cleared);
    }
    debug!("Expiry watcher stopped");
}
