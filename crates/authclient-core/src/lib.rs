//! authclient-core - session-aware HTTP client.
//!
//! Attaches bearer credentials to outbound calls, refreshes expired access
//! tokens with a single in-flight refresh shared by all failing callers,
//! replays the failed calls once, and persists the session between runs.
//!
//! Entry point is `SessionController`.

pub mod api;
pub mod auth;
pub mod config;
pub mod storage;

pub use api::{
    ClientError, ExpiryNotice, ExpiryReason, HttpResponse, LoginCredentials, ReauthInterceptor,
    RequestDescriptor, RequestExecutor, SignupRequest, TransportError,
};
pub use auth::{Profile, Session, SessionController, SessionEvent, SessionStore, TokenPair};
pub use config::{Config, StorageKind};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError, StoredSession};
