//! Reauthentication interceptor.
//!
//! Wraps the `RequestExecutor`. When an authenticated call comes back 401,
//! the interceptor refreshes the token pair and replays the call once.
//! Refreshes are single-flight: every caller that fails while a refresh is
//! outstanding attaches to the same shared future and observes the same
//! outcome, so a rotated refresh token is never spent twice.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::payloads::{RefreshRequest, RefreshResponse, REFRESH_PATH};
use super::{ClientError, HttpResponse, RequestDescriptor, RequestExecutor};
use crate::auth::{SessionStore, TokenPair};

/// Why the interceptor gave up on the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// A 401 arrived and there was no refresh token to use
    NoRefreshToken,
    /// The refresh call failed or its result could not be stored
    RefreshRejected,
}

/// Expiry notice for the session owner. `epoch` is the store epoch at which
/// the session was found absent or was cleared; a session written after it
/// is newer and must be left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub reason: ExpiryReason,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Renewed,
    Expired,
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

enum RefreshState {
    Idle,
    Refreshing(SharedRefresh),
}

/// What a caller that just saw a 401 should do next.
enum Recovery {
    /// No refresh token at `epoch`
    Expired { epoch: u64 },
    /// Credentials changed after the request went out; replay right away
    Replay,
    Wait(SharedRefresh),
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ReauthInterceptor {
    executor: RequestExecutor,
    state: Arc<Mutex<RefreshState>>,
    expiry_tx: mpsc::UnboundedSender<ExpiryNotice>,
}

impl ReauthInterceptor {
    /// Expiry notices are sent on `expiry_tx` each time the interceptor
    /// abandons the session.
    pub fn new(executor: RequestExecutor, expiry_tx: mpsc::UnboundedSender<ExpiryNotice>) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            expiry_tx,
        }
    }

    /// Send the request, recovering from an expired access token.
    ///
    /// Non-401 responses are returned as-is, whatever their status. A
    /// replayed request that is rejected again becomes `ClientError::Http`
    /// with status 401 and never triggers another refresh.
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, ClientError> {
        let sent = self.executor.store().snapshot();
        let response = self
            .executor
            .send_with(descriptor, sent.session.access_token())
            .await?;

        if !descriptor.needs_auth() || !response.is_unauthorized() {
            return Ok(response);
        }
        debug!(path = descriptor.path(), "Request unauthorized");

        match self.recover(sent.epoch) {
            Recovery::Expired { epoch } => {
                info!(path = descriptor.path(), "No refresh token, session expired");
                notify(&self.expiry_tx, ExpiryReason::NoRefreshToken, epoch);
                Err(ClientError::SessionExpired)
            }
            Recovery::Replay => self.replay(descriptor).await,
            Recovery::Wait(refresh) => match refresh.await {
                RefreshOutcome::Renewed => self.replay(descriptor).await,
                RefreshOutcome::Expired => Err(ClientError::SessionExpired),
            },
        }
    }

    /// Decide how to recover from a 401 on a request sent at `sent_epoch`.
    ///
    /// An in-flight refresh is always joined, even when the epoch has moved:
    /// the tokens it is replacing are the ones about to be rejected. Only
    /// when no refresh is running does a moved epoch mean "replay now".
    /// Starts a refresh otherwise.
    fn recover(&self, sent_epoch: u64) -> Recovery {
        let mut state = lock(&self.state);
        let current = self.executor.store().snapshot();

        let Some(refresh_token) = current.session.refresh_token() else {
            return Recovery::Expired {
                epoch: current.epoch,
            };
        };
        if let RefreshState::Refreshing(refresh) = &*state {
            debug!("Joining in-flight refresh");
            return Recovery::Wait(refresh.clone());
        }
        if current.epoch != sent_epoch {
            return Recovery::Replay;
        }

        let task = tokio::spawn(run_refresh(
            self.executor.clone(),
            Arc::clone(&self.state),
            self.expiry_tx.clone(),
            refresh_token.to_string(),
            current.epoch,
        ));
        let cycle_state = Arc::clone(&self.state);
        let refresh = async move {
            task.await.unwrap_or_else(|e| {
                error!(error = %e, "Refresh task failed");
                *lock(&cycle_state) = RefreshState::Idle;
                RefreshOutcome::Expired
            })
        }
        .boxed()
        .shared();

        *state = RefreshState::Refreshing(refresh.clone());
        Recovery::Wait(refresh)
    }

    async fn replay(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, ClientError> {
        let session = self.executor.store().read();
        let Some(access_token) = session.access_token() else {
            debug!(path = descriptor.path(), "Session cleared before replay");
            return Err(ClientError::SessionExpired);
        };

        let response = self.executor.send_with(descriptor, Some(access_token)).await?;
        if response.is_unauthorized() {
            warn!(path = descriptor.path(), "Replayed request rejected again");
            return Err(ClientError::http(StatusCode::UNAUTHORIZED, response.body));
        }
        Ok(response)
    }
}

/// One refresh cycle. Runs as its own task so it completes even if every
/// waiting caller is dropped. Returns the state to `Idle` before the outcome
/// is published.
async fn run_refresh(
    executor: RequestExecutor,
    state: Arc<Mutex<RefreshState>>,
    expiry_tx: mpsc::UnboundedSender<ExpiryNotice>,
    refresh_token: String,
    epoch: u64,
) -> RefreshOutcome {
    info!("Refreshing session tokens");
    let store = Arc::clone(executor.store());

    let outcome = match request_tokens(&executor, &refresh_token).await {
        Ok(tokens) => match store.renew_if_current(epoch, tokens) {
            Ok(Some(_)) => {
                info!("Session tokens refreshed");
                RefreshOutcome::Renewed
            }
            Ok(None) => {
                info!("Session changed during refresh, discarding refreshed tokens");
                RefreshOutcome::Expired
            }
            Err(e) => {
                error!(error = %e, "Failed to store refreshed tokens");
                expire(&store, epoch, &expiry_tx)
            }
        },
        Err(e) => {
            warn!(error = %e, "Token refresh failed");
            expire(&store, epoch, &expiry_tx)
        }
    };

    *lock(&state) = RefreshState::Idle;
    outcome
}

async fn request_tokens(
    executor: &RequestExecutor,
    refresh_token: &str,
) -> Result<TokenPair, ClientError> {
    let descriptor = RequestDescriptor::post(REFRESH_PATH)
        .json(&RefreshRequest { refresh_token })?
        .public();
    let response = executor.send_with(&descriptor, None).await?;
    let payload: RefreshResponse = response.json()?;
    Ok(payload.into())
}

fn expire(
    store: &SessionStore,
    epoch: u64,
    expiry_tx: &mpsc::UnboundedSender<ExpiryNotice>,
) -> RefreshOutcome {
    match store.clear_if_current(epoch) {
        Ok(Some(cleared)) => notify(expiry_tx, ExpiryReason::RefreshRejected, cleared),
        Ok(None) => debug!("Session replaced during refresh, leaving it in place"),
        Err(e) => {
            error!(error = %e, "Failed to erase stored session");
            notify(expiry_tx, ExpiryReason::RefreshRejected, epoch + 1);
        }
    }
    RefreshOutcome::Expired
}

fn notify(expiry_tx: &mpsc::UnboundedSender<ExpiryNotice>, reason: ExpiryReason, epoch: u64) {
    if expiry_tx.send(ExpiryNotice { reason, epoch }).is_err() {
        debug!(?reason, epoch, "No expiry listener");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future;

    use super::*;
    use crate::auth::Session;
    use crate::storage::MemoryStorage;

    fn interceptor() -> (ReauthInterceptor, Arc<SessionStore>) {
        let store = Arc::new(
            SessionStore::open(Box::new(MemoryStorage::new())).expect("open store"),
        );
        let executor =
            RequestExecutor::new("http://127.0.0.1:9", Duration::from_secs(1), Arc::clone(&store))
                .expect("executor");
        let (expiry_tx, _) = mpsc::unbounded_channel();
        (ReauthInterceptor::new(executor, expiry_tx), store)
    }

    fn sign_in(store: &SessionStore, access: &str, refresh: &str) {
        store
            .write(Session::authenticated(TokenPair::new(access, refresh), None))
            .expect("write session");
    }

    #[test]
    fn test_stale_request_joins_in_flight_refresh() {
        let (interceptor, store) = interceptor();
        sign_in(&store, "access-1", "refresh-1");
        let sent_epoch = store.epoch();
        store
            .renew_if_current(sent_epoch, TokenPair::new("access-2", "refresh-2"))
            .expect("renew");
        *lock(&interceptor.state) =
            RefreshState::Refreshing(future::pending::<RefreshOutcome>().boxed().shared());

        assert!(matches!(interceptor.recover(sent_epoch), Recovery::Wait(_)));
    }

    #[test]
    fn test_stale_request_replays_when_idle() {
        let (interceptor, store) = interceptor();
        sign_in(&store, "access-1", "refresh-1");
        let sent_epoch = store.epoch();
        sign_in(&store, "access-2", "refresh-2");

        assert!(matches!(interceptor.recover(sent_epoch), Recovery::Replay));
    }

    #[test]
    fn test_missing_refresh_token_expires_at_current_epoch() {
        let (interceptor, store) = interceptor();
        sign_in(&store, "access-1", "refresh-1");
        store.clear().expect("clear");
        let epoch = store.epoch();

        assert!(matches!(
            interceptor.recover(epoch - 1),
            Recovery::Expired { epoch: at } if at == epoch
        ));
    }
}
