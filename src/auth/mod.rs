//! Sign-in for the XRPC service.
//!
//! Password sessions via `com.atproto.server.createSession`; the resulting
//! tokens live in [`session::SessionManager`].

pub mod credentials;
pub mod session;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login rejected (status {status}): {reason}")]
    Rejected { status: u16, reason: String },
    #[error("login request failed: {0}")]
    Transport(String),
    #[error("malformed login response: {0}")]
    MalformedResponse(String),
    #[error("failed to persist session: {0}")]
    Storage(#[from] StoreError),
}
