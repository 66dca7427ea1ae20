//! SRP-6a client role: registration material and session computation.
//!
//! Registration produces `(salt, verifier)` for the server; login generates
//! an ephemeral `(a, A)`, then derives the session key and both transcript
//! proofs from the server's `B`. The client checks the server's `M2` before
//! trusting the session.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use lk_crypto::hash::sha256;

use crate::bignum::BigNum;
use crate::error::SrpError;
use crate::group::{group, hash_bytes, pad_n};

/// Ephemeral secrets are 256 random bits.
pub const EPHEMERAL_SIZE: usize = 32;

/// Registration salts are 16 random bytes, hex on the wire.
pub const REGISTRATION_SALT_SIZE: usize = 16;

/// What the server stores at registration. Contains no password material.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Lowercase hex salt.
    pub salt: String,
    /// Lowercase hex verifier `g^x mod N`.
    pub verifier: String,
}

/// `x = H(salt || password)` as an integer.
fn compute_x(salt_hex: &str, password: &str) -> Result<BigNum, SrpError> {
    let salt = hex::decode(salt_hex)?;
    let mut material = Zeroizing::new(Vec::with_capacity(salt.len() + password.len()));
    material.extend_from_slice(&salt);
    material.extend_from_slice(password.as_bytes());
    Ok(BigNum::from_bytes_be(&sha256(&material)))
}

/// Fresh registration material for a new password.
pub fn generate_registration(password: &str) -> Registration {
    let mut salt = [0u8; REGISTRATION_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    registration_with_salt(&hex::encode(salt), password)
        .expect("freshly encoded salt is valid hex")
}

/// Registration from a caller-supplied salt (hex).
pub fn registration_with_salt(salt_hex: &str, password: &str) -> Result<Registration, SrpError> {
    let grp = group();
    let mut x = compute_x(salt_hex, password)?;
    let verifier = BigNum::mod_pow(&grp.g, &x, &grp.n);
    x.zeroize();
    Ok(Registration {
        salt: salt_hex.to_string(),
        verifier: verifier.to_hex(),
    })
}

/// Client ephemeral `(a, A)`. The secret exponent is wiped on drop; the
/// value is consumed by `compute_session`, so one ephemeral serves exactly
/// one login attempt.
pub struct ClientEphemeral {
    secret: BigNum,
    pub public: BigNum,
}

impl Drop for ClientEphemeral {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl ClientEphemeral {
    pub fn generate() -> Self {
        let grp = group();
        loop {
            let mut bytes = [0u8; EPHEMERAL_SIZE];
            OsRng.fill_bytes(&mut bytes);
            let secret = BigNum::from_bytes_be(&bytes);
            bytes.zeroize();
            let public = BigNum::mod_pow(&grp.g, &secret, &grp.n);
            if !public.is_zero() {
                return Self { secret, public };
            }
        }
    }

    /// Build from a known secret exponent. Rejects exponents whose public
    /// value is zero modulo N.
    pub fn from_secret(secret: BigNum) -> Result<Self, SrpError> {
        let grp = group();
        let public = BigNum::mod_pow(&grp.g, &secret, &grp.n);
        if public.is_zero() {
            return Err(SrpError::ZeroEphemeral);
        }
        Ok(Self { secret, public })
    }

    pub fn public_hex(&self) -> String {
        self.public.to_hex()
    }
}

/// Outcome of a successful client-side exchange.
pub struct ClientSession {
    key: Zeroizing<[u8; 32]>,
    /// A as sent to the server, canonical hex.
    pub public_hex: String,
    /// M1, the proof the client sends.
    pub proof: String,
    /// M2 the server must echo back.
    server_proof: String,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("public_hex", &self.public_hex)
            .field("proof", &self.proof)
            .field("server_proof", &self.server_proof)
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Constant-time check of the server's M2 against the expected value.
    pub fn verify_server_proof(&self, m2_hex: &str) -> Result<(), SrpError> {
        let expected = hex::decode(&self.server_proof).expect("proof computed as hex");
        let got = hex::decode(m2_hex)?;
        if got.len() != expected.len() || expected.ct_eq(&got).unwrap_u8() != 1 {
            return Err(SrpError::InvalidProof);
        }
        Ok(())
    }
}

/// Derive `(K, M1, M2)` from the server's public ephemeral.
///
/// `S = (B - k*v)^(a + u*x) mod N`, with the base lifted into `[0, N)`;
/// `K = H(pad_N(S))`. Aborts when `B` or `u` degenerates to zero.
pub fn compute_session(
    salt_hex: &str,
    username: &str,
    password: &str,
    ephemeral: ClientEphemeral,
    server_public_hex: &str,
) -> Result<ClientSession, SrpError> {
    let grp = group();

    let server_public = BigNum::from_hex(server_public_hex)?.rem(&grp.n);
    if server_public.is_zero() {
        return Err(SrpError::ZeroEphemeral);
    }

    tracing::debug!(user = username, "computing SRP client session");

    let u = BigNum::from_bytes_be(&sha256(
        &[hash_bytes(&ephemeral.public), hash_bytes(&server_public)].concat(),
    ));
    if u.is_zero() {
        return Err(SrpError::ZeroScrambler);
    }

    let mut x = compute_x(salt_hex, password)?;
    let verifier = BigNum::mod_pow(&grp.g, &x, &grp.n);
    let kv = grp.k.mul(&verifier).rem(&grp.n);
    let mut base = match server_public.checked_sub(&kv) {
        Some(diff) => diff,
        None => server_public
            .add(&grp.n)
            .checked_sub(&kv)
            .expect("kv is reduced mod N"),
    };
    let mut exponent = ephemeral.secret.add(&u.mul(&x));
    let mut shared = BigNum::mod_pow(&base, &exponent, &grp.n);

    let key = sha256(&pad_n(&shared));
    let a_hex = ephemeral.public.to_hex();
    let b_hex = server_public.to_hex();
    let key_hex = hex::encode(key);
    let proof = hex::encode(sha256(format!("{a_hex}{b_hex}{key_hex}").as_bytes()));
    let server_proof = hex::encode(sha256(format!("{a_hex}{proof}{key_hex}").as_bytes()));

    x.zeroize();
    base.zeroize();
    exponent.zeroize();
    shared.zeroize();

    Ok(ClientSession {
        key: Zeroizing::new(key),
        public_hex: a_hex,
        proof,
        server_proof,
    })
}
