use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Master-password verification failed. At the engine surface this also
    /// covers AEAD failures on the verification token, so callers cannot
    /// tell which step rejected.
    #[error("wrong master password")]
    WrongPassword,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Invariant violation; the vault session must be reopened.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("vault for user {0} is already open in this process")]
    AlreadyOpen(String),

    #[error("key store error: {0}")]
    KeyStore(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] lk_crypto::CryptoError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
