//! Credential lifecycle and client sessions.

pub mod credential;
pub mod session;
pub mod token;

pub use credential::{CredentialRecord, CredentialState, TOKEN_REFRESH_BUFFER_SECS};
pub use session::{NoSession, SessionCodec, SessionPayload, SessionSink, SessionSlot};
pub use token::TokenManager;
