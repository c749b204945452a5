//! Session state and its owner.
//!
//! This module provides:
//! - `Session`, `TokenPair`, `Profile`: the authenticated identity
//! - `SessionStore`: in-memory session mirrored to durable storage
//! - `SessionController`: login/logout entry points and session signals

pub mod controller;
pub mod session;
pub mod store;

pub use controller::{SessionController, SessionEvent};
pub use session::{Profile, Session, TokenPair};
pub use store::{SessionSnapshot, SessionStore};
