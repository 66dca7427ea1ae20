//! API request/response types shared between client and server.
//! These map directly to JSON bodies on the wire. SRP values are lowercase
//! hex without a `0x` prefix; M1/M2 are 64-char hex; binary vault fields are
//! standard-alphabet base64.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Account and login ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    /// Hex SRP salt.
    pub salt: String,
    /// Hex SRP verifier `g^x mod N`.
    pub verifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInitRequest {
    pub username: String,
    /// Client public ephemeral, hex.
    #[serde(rename = "A")]
    pub client_public: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInitResponse {
    /// Hex SRP salt stored at registration.
    pub salt: String,
    /// Server public ephemeral, hex.
    #[serde(rename = "B")]
    pub server_public: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginVerifyRequest {
    pub username: String,
    #[serde(rename = "A")]
    pub client_public: String,
    /// Client session proof.
    #[serde(rename = "M1")]
    pub client_proof: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginVerifyResponse {
    /// Server session proof, checked by the client before the token is used.
    #[serde(rename = "M2")]
    pub server_proof: String,
    /// Bearer token for the vault endpoints.
    pub token: String,
}

/// Body of `POST /password`: replacement SRP credentials after a master
/// password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialUpdateRequest {
    pub salt: String,
    pub verifier: String,
}

// ── Vault storage ────────────────────────────────────────────────────────────

/// The encrypted document stored on the server. Entries are sealed into one
/// inner AEAD envelope; a digest of that envelope is sealed separately so a
/// downloading client can detect corruption before trusting the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVault {
    pub user: String,
    pub version: u64,
    /// Per-user KDF salt, base64. Transmitted so an enrolled device can
    /// derive the vault key; the device secret never travels.
    pub salt: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub vault_iv: String,
    pub vault_ciphertext: String,
    pub vault_tag: String,
    #[serde(rename = "verificationIV")]
    pub verification_iv: String,
    #[serde(rename = "verificationCiphertext")]
    pub verification_ciphertext: String,
    #[serde(rename = "verificationTag")]
    pub verification_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreVaultResponse {
    pub success: bool,
    /// Server receipt time; echoed for observability, never used for
    /// reconciliation.
    pub timestamp: DateTime<Utc>,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
