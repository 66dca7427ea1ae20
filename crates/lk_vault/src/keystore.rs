//! Device-secret storage capability.
//!
//! The device secret never leaves the machine; it lives in an OS-provided
//! store keyed by user. The platform backend delegates to the OS keyring,
//! the in-memory backend backs tests and headless environments.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;

use crate::config::KeyStoreBackend;
use crate::error::VaultError;

/// Keyring service name shared by all Latchkey entries.
pub const SERVICE_NAME: &str = "Latchkey";

pub trait KeyStore: Send + Sync {
    fn put(&self, user: &str, secret: &[u8]) -> Result<(), VaultError>;
    fn get(&self, user: &str) -> Result<Option<Vec<u8>>, VaultError>;
    /// Removes the secret; part of explicit account reset only.
    fn delete(&self, user: &str) -> Result<(), VaultError>;
}

/// OS keyring backend. Secrets are base64 inside the keyring entry.
pub struct PlatformKeyStore;

impl PlatformKeyStore {
    fn entry(user: &str) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(SERVICE_NAME, user)
            .map_err(|e| VaultError::KeyStore(format!("keyring init: {e}")))
    }
}

impl KeyStore for PlatformKeyStore {
    fn put(&self, user: &str, secret: &[u8]) -> Result<(), VaultError> {
        Self::entry(user)?
            .set_password(&BASE64.encode(secret))
            .map_err(|e| VaultError::KeyStore(format!("store secret: {e}")))
    }

    fn get(&self, user: &str) -> Result<Option<Vec<u8>>, VaultError> {
        match Self::entry(user)?.get_password() {
            Ok(encoded) => Ok(Some(BASE64.decode(encoded)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::KeyStore(format!("load secret: {e}"))),
        }
    }

    fn delete(&self, user: &str) -> Result<(), VaultError> {
        match Self::entry(user)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::KeyStore(format!("delete secret: {e}"))),
        }
    }
}

/// Instantiate the configured backend.
pub fn open_backend(backend: KeyStoreBackend) -> Box<dyn KeyStore> {
    match backend {
        KeyStoreBackend::Platform => Box::new(PlatformKeyStore),
        KeyStoreBackend::Memory => Box::new(MemoryKeyStore::new()),
    }
}

/// Process-local backend.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn put(&self, user: &str, secret: &[u8]) -> Result<(), VaultError> {
        self.entries.lock().insert(user.to_string(), secret.to_vec());
        Ok(())
    }

    fn get(&self, user: &str) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self.entries.lock().get(user).cloned())
    }

    fn delete(&self, user: &str) -> Result<(), VaultError> {
        self.entries.lock().remove(user);
        Ok(())
    }
}
