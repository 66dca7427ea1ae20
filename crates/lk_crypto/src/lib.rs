//! lk_crypto — Latchkey cryptographic primitives
//!
//! The vault format is pinned to AES-256-GCM, which this crate implements
//! from the block cipher up so that non-96-bit IVs (required by the vault
//! conformance surface, unsupported by the RustCrypto AEAD crates) take the
//! standard GHASH-derived J0 path.
//!
//! # Module layout
//! - `aes`   — AES-256 key schedule and single-block encrypt/decrypt (FIPS-197)
//! - `ghash` — GHASH over GF(2^128), block padding, length block (SP 800-38D)
//! - `gcm`   — AES-256-GCM AEAD with AAD and constant-time tag verification
//! - `hash`  — SHA-256 / SHA-512 digests and HMAC
//! - `kdf`   — PBKDF2-HMAC-SHA256/SHA512 and vault-key derivation
//! - `error` — unified error type
//!
//! All secret material held by this crate is zeroized on drop.

pub mod aes;
pub mod error;
pub mod gcm;
pub mod ghash;
pub mod hash;
pub mod kdf;

pub use error::CryptoError;
pub use gcm::{Aes256Gcm, IV_SIZE, TAG_SIZE};
pub use kdf::{VaultKey, DEFAULT_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};
