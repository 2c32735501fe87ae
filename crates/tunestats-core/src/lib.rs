//! Core library for tunestats.
//!
//! Per-user caching of listening statistics fetched from the Spotify Web
//! API, with encrypted credential storage and token refresh. Front ends (the
//! CLI, a web layer) compose these pieces:
//!
//! - [`TokenManager`] keeps a user's access token valid
//! - [`CacheOrchestrator`] serves each resource kind from cache or upstream
//! - [`ResourceStore`] persists both in one document per user
//! - [`LibraryActions`] queues tracks and curates the recommendations playlist

pub mod auth;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod library;
pub mod models;
pub mod store;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{CredentialRecord, NoSession, SessionCodec, SessionSink, TokenManager};
pub use cache::{CacheOrchestrator, CachePolicy, Origin, ResourceKind, ResourceStore, Served};
pub use config::Config;
pub use crypto::{CryptoCodec, CryptoError, KeyStore};
pub use error::{Error, Result};
pub use library::{LibraryActions, TrackUri};
pub use store::{DocumentStore, FileDocumentStore, MemoryDocumentStore, StoreError};
pub use upstream::{SpotifyAccounts, SpotifyClient, UpstreamError};
