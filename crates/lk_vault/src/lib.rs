//! lk_vault — the encrypted credential vault
//!
//! A vault is a single JSON document: cleartext metadata plus AEAD envelopes
//! for every secret field, guarded by a verification token whose plaintext
//! is the digest of the entries list. Opening a vault means deriving the key
//! from master password + device secret and proving it against that token;
//! a wrong password and a tampered file are indistinguishable by design.
//!
//! # Modules
//! - `record`   — document and record types, envelope framing, canonical bytes
//! - `keystore` — device-secret storage capability (platform keyring / memory)
//! - `config`   — recognized options, defaults, validation
//! - `engine`   — create/open/list/add/edit/remove/rekey, atomic persistence
//! - `error`    — unified error type

pub mod config;
pub mod engine;
pub mod error;
pub mod keystore;
pub mod record;

pub use config::{Config, KeyStoreBackend};
pub use engine::{DecryptedEntry, EntryUpdate, VaultEngine};
pub use error::VaultError;
pub use keystore::{open_backend, KeyStore, MemoryKeyStore, PlatformKeyStore};
pub use record::{Envelope, PasswordRecord, VaultDocument};
