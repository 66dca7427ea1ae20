//! lk_srp — SRP-6a augmented password-authenticated key exchange
//!
//! The server stores only a verifier `v = g^x mod N`; the password never
//! crosses the wire. Client and server prove knowledge of a common session
//! key K through the transcript hashes M1 and M2.
//!
//! Wire discipline (pinned for compatibility with deployed vaults): big
//! integers travel as lowercase minimal hex; they enter digests as the bytes
//! of their even-length hex form; M1 and M2 hash the UTF-8 of hex strings,
//! `M1 = H(A_hex || B_hex || K_hex)` and `M2 = H(A_hex || M1_hex || K_hex)`.
//!
//! # Modules
//! - `bignum` — arbitrary-precision unsigned integers and modular exponentiation
//! - `group`  — the 2048-bit MODP group, `k = H(N || g)`, padding helpers
//! - `client` — registration, client ephemeral, session computation
//! - `server` — verifier records, transient login sessions, proof verification
//! - `error`  — unified error type

pub mod bignum;
pub mod client;
pub mod error;
pub mod group;
pub mod server;

pub use bignum::BigNum;
pub use client::{ClientEphemeral, ClientSession, Registration};
pub use error::SrpError;
pub use server::{ServerSession, SrpRecord, SrpSession};
