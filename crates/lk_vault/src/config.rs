//! Recognized configuration options.
//!
//! Unknown keys are rejected at parse time; values are validated before any
//! key derivation happens, so a config cannot talk the engine below the
//! PBKDF2 floor or onto an unsupported SRP group.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lk_crypto::kdf::{DEFAULT_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};

use crate::error::VaultError;

pub const DEFAULT_SYNC_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 10_000;

/// The only SRP group currently supported.
pub const SRP_GROUP_MODP_2048: &str = "modp-2048";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStoreBackend {
    /// OS keyring (default).
    Platform,
    /// Process-local, for tests and headless use.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub pbkdf2_iterations: u32,
    pub srp_group: String,
    pub sync_base_url: String,
    pub sync_timeout_ms: u64,
    pub key_store_backend: KeyStoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            srp_group: SRP_GROUP_MODP_2048.to_string(),
            sync_base_url: DEFAULT_SYNC_BASE_URL.to_string(),
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            key_store_backend: KeyStoreBackend::Platform,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(VaultError::InvalidRequest(format!(
                "pbkdf2_iterations {} below minimum {}",
                self.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        if self.srp_group != SRP_GROUP_MODP_2048 {
            return Err(VaultError::InvalidRequest(format!(
                "unsupported srp_group {:?}",
                self.srp_group
            )));
        }
        if self.sync_timeout_ms == 0 {
            return Err(VaultError::InvalidRequest(
                "sync_timeout_ms must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}
