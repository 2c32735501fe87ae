//! Symmetric encryption for credentials and session tokens.
//!
//! This module provides:
//! - `CryptoCodec`: XChaCha20-Poly1305 encryption of text or JSON payloads
//! - `KeyStore`: OS keychain storage for the provisioned encryption key
//!
//! The codec never generates a key on its own. Keys are minted by the
//! `tunestats keygen` command and loaded from configuration at startup.

pub mod codec;
pub mod keystore;

pub use codec::{CryptoCodec, CryptoError, Plaintext};
pub use keystore::KeyStore;
