use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SrpError {
    /// Proof mismatch. Kept separate from malformed-input errors so callers
    /// can tell tampering from bad requests.
    #[error("session proof verification failed")]
    InvalidProof,

    #[error("public ephemeral value is zero modulo N")]
    ZeroEphemeral,

    #[error("scrambling parameter is zero")]
    ZeroScrambler,

    #[error("verifier must lie in [1, N-1]")]
    InvalidVerifier,

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
