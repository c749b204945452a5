use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::{Session, TokenPair};
use crate::storage::{Hydrated, SessionStorage, StorageError, StoredSession};

/// A session together with the epoch it was read at.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub epoch: u64,
    pub session: Session,
}

struct State {
    epoch: u64,
    session: Session,
}

/// Holder of the current session, mirrored to durable storage.
///
/// Every mutation replaces the whole session and bumps the epoch. Writers
/// that started from an older snapshot (an in-flight token refresh) use the
/// `*_if_current` variants so a logout or login in between wins.
///
/// Storage I/O runs synchronously while the state lock is held, so memory
/// never runs ahead of storage and no two writes interleave.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    state: Mutex<State>,
}

impl SessionStore {
    /// Open the store, hydrating from durable storage
    pub fn open(storage: Box<dyn SessionStorage>) -> Result<Self, StorageError> {
        let session = match storage.load()? {
            None => Session::absent(),
            Some(record) => match record.hydrate() {
                Hydrated::Session(session) => session,
                Hydrated::Partial => {
                    warn!("Stored session has only one token, discarding it");
                    storage.erase()?;
                    Session::absent()
                }
            },
        };
        debug!(present = session.is_present(), "Session store opened");

        Ok(Self {
            storage,
            state: Mutex::new(State { epoch: 0, session }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session
    pub fn read(&self) -> Session {
        self.lock().session.clone()
    }

    /// Current session and epoch, read together
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            epoch: state.epoch,
            session: state.session.clone(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Replace the session. Durable storage is updated before memory.
    pub fn write(&self, session: Session) -> Result<(), StorageError> {
        let mut state = self.lock();
        Self::apply(&*self.storage, &mut state, session)
    }

    /// Reset to the fully-absent session. No-op when already absent.
    /// Returns whether a session was cleared.
    ///
    /// Memory is cleared even when the durable erase fails; the error is
    /// still returned.
    pub fn clear(&self) -> Result<bool, StorageError> {
        let mut state = self.lock();
        Self::clear_locked(&*self.storage, &mut state)
    }

    /// Install a refreshed token pair if nothing replaced the session since
    /// `epoch`. Returns the new epoch, or `None` when the write was fenced.
    pub fn renew_if_current(
        &self,
        epoch: u64,
        tokens: TokenPair,
    ) -> Result<Option<u64>, StorageError> {
        let mut state = self.lock();
        if state.epoch != epoch || !state.session.is_present() {
            return Ok(None);
        }
        let renewed = state.session.clone().with_tokens(tokens);
        Self::apply(&*self.storage, &mut state, renewed)?;
        Ok(Some(state.epoch))
    }

    /// Clear the session only if nothing replaced it since `epoch`.
    ///
    /// Returns the epoch at which the session is absent, or `None` when the
    /// session was replaced. An erase failure leaves memory cleared at
    /// `epoch + 1`.
    pub fn clear_if_current(&self, epoch: u64) -> Result<Option<u64>, StorageError> {
        let mut state = self.lock();
        if state.epoch != epoch {
            return Ok(None);
        }
        Self::clear_locked(&*self.storage, &mut state)?;
        Ok(Some(state.epoch))
    }

    fn apply(
        storage: &dyn SessionStorage,
        state: &mut State,
        session: Session,
    ) -> Result<(), StorageError> {
        if session.is_present() {
            storage.persist(&StoredSession::from_session(&session))?;
        } else {
            storage.erase()?;
        }
        state.session = session;
        state.epoch += 1;
        Ok(())
    }

    fn clear_locked(storage: &dyn SessionStorage, state: &mut State) -> Result<bool, StorageError> {
        if !state.session.is_present() {
            return Ok(false);
        }
        state.session = Session::absent();
        state.epoch += 1;
        info!("Session cleared");
        storage.erase()?;
        Ok(true)
    }
}
