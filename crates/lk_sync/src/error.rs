use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// AEAD tag rejection or SRP proof mismatch. Never merged with network
    /// failures: tampering and flaky transport are different events.
    #[error("authentication failed")]
    AuthFail,

    /// A decoded payload did not match its separately stored digest. The
    /// local vault remains the source of truth.
    #[error("integrity check failed on remote payload")]
    IntegrityFail,

    #[error("not found on server")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] lk_crypto::CryptoError),

    #[error("SRP error: {0}")]
    Srp(#[from] lk_srp::SrpError),

    #[error("vault error: {0}")]
    Vault(#[from] lk_vault::VaultError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}
