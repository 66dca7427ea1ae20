use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Tag verification failed. Never merged with other kinds: callers
    /// distinguish tampering from malformed input.
    #[error("authentication failed (tag mismatch)")]
    AuthFail,

    #[error("authentication tag must be 16 bytes, got {0}")]
    InvalidTagSize(usize),

    #[error("IV must be at least one byte")]
    EmptyIv,

    #[error("GHASH subkey must be 16 bytes, got {0}")]
    InvalidSubkeySize(usize),

    #[error("GHASH input of {0} bytes is not block-aligned")]
    UnpaddedInput(usize),

    #[error("iteration count {got} is below the accepted minimum {min}")]
    IterationsTooLow { got: u32, min: u32 },

    #[error("derived key length must be nonzero")]
    EmptyDerivedKey,
}
