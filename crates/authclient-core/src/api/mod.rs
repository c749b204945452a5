//! HTTP request pipeline.
//!
//! `RequestExecutor` sends a single call with the current bearer token.
//! `ReauthInterceptor` wraps it and recovers from expired access tokens
//! with a single-flight refresh followed by one replay.

pub mod error;
pub mod executor;
pub mod interceptor;
pub mod payloads;
pub mod request;

pub use error::{ClientError, TransportError};
pub use executor::RequestExecutor;
pub use interceptor::{ExpiryNotice, ExpiryReason, ReauthInterceptor};
pub use payloads::{LoginCredentials, SignupRequest};
pub use request::{HttpResponse, RequestDescriptor};
