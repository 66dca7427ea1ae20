//! SRP-6a server role: verifier records, transient login sessions, proof
//! verification.
//!
//! The server never sees the password. A login session is created per
//! `/login/init`, holds `(b, B)` plus the cached salt and verifier, and is
//! consumed by exactly one verification attempt.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use lk_crypto::hash::sha256;

use crate::bignum::BigNum;
use crate::client::EPHEMERAL_SIZE;
use crate::error::SrpError;
use crate::group::{group, hash_bytes, pad_n};

/// What the server persists per user: salt and verifier, both hex.
#[derive(Debug, Clone)]
pub struct SrpRecord {
    pub username: String,
    pub salt: String,
    pub verifier: String,
}

impl SrpRecord {
    /// Validates the verifier into `[1, N-1]` and the salt as hex.
    pub fn new(username: &str, salt: &str, verifier: &str) -> Result<Self, SrpError> {
        hex::decode(salt)?;
        let v = BigNum::from_hex(verifier)?;
        let grp = group();
        if v.is_zero() || v >= grp.n {
            return Err(SrpError::InvalidVerifier);
        }
        Ok(Self {
            username: username.to_string(),
            salt: salt.to_string(),
            verifier: v.to_hex(),
        })
    }
}

/// Server ephemeral `(b, B)`; the secret exponent is wiped on drop.
struct ServerEphemeral {
    secret: BigNum,
    public: BigNum,
}

impl Drop for ServerEphemeral {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl ServerEphemeral {
    /// `B = (k*v + g^b) mod N`, regenerated in the (astronomically unlikely)
    /// case B ends up zero.
    fn generate(verifier: &BigNum) -> Self {
        let grp = group();
        let kv = grp.k.mul(verifier).rem(&grp.n);
        loop {
            let mut bytes = [0u8; EPHEMERAL_SIZE];
            OsRng.fill_bytes(&mut bytes);
            let secret = BigNum::from_bytes_be(&bytes);
            bytes.zeroize();
            let public = kv.add(&BigNum::mod_pow(&grp.g, &secret, &grp.n)).rem(&grp.n);
            if !public.is_zero() {
                return Self { secret, public };
            }
        }
    }

    fn from_secret(secret: BigNum, verifier: &BigNum) -> Result<Self, SrpError> {
        let grp = group();
        let kv = grp.k.mul(verifier).rem(&grp.n);
        let public = kv.add(&BigNum::mod_pow(&grp.g, &secret, &grp.n)).rem(&grp.n);
        if public.is_zero() {
            return Err(SrpError::ZeroEphemeral);
        }
        Ok(Self { secret, public })
    }
}

/// One login attempt, created at `/login/init` and consumed by `verify`.
pub struct SrpSession {
    pub username: String,
    salt: String,
    verifier: String,
    ephemeral: ServerEphemeral,
}

impl SrpSession {
    pub fn begin(record: &SrpRecord) -> Result<Self, SrpError> {
        let verifier = BigNum::from_hex(&record.verifier)?;
        Ok(Self {
            username: record.username.clone(),
            salt: record.salt.clone(),
            verifier: record.verifier.clone(),
            ephemeral: ServerEphemeral::generate(&verifier),
        })
    }

    /// Deterministic variant for transcript tests.
    pub fn with_ephemeral(record: &SrpRecord, secret: BigNum) -> Result<Self, SrpError> {
        let verifier = BigNum::from_hex(&record.verifier)?;
        Ok(Self {
            username: record.username.clone(),
            salt: record.salt.clone(),
            verifier: record.verifier.clone(),
            ephemeral: ServerEphemeral::from_secret(secret, &verifier)?,
        })
    }

    pub fn salt_hex(&self) -> &str {
        &self.salt
    }

    /// B, canonical lowercase hex, as sent in the `/login/init` response.
    pub fn public_hex(&self) -> String {
        self.ephemeral.public.to_hex()
    }

    /// Check the client's `M1`; on success return the session key and `M2`.
    ///
    /// `S = (A * v^u)^b mod N`. Consumes the session whatever the outcome,
    /// so a failed proof cannot be retried against the same ephemeral.
    pub fn verify(
        self,
        client_public_hex: &str,
        client_proof_hex: &str,
    ) -> Result<ServerSession, SrpError> {
        let grp = group();

        let client_public = BigNum::from_hex(client_public_hex)?.rem(&grp.n);
        if client_public.is_zero() {
            return Err(SrpError::ZeroEphemeral);
        }

        let u = BigNum::from_bytes_be(&sha256(
            &[hash_bytes(&client_public), hash_bytes(&self.ephemeral.public)].concat(),
        ));
        if u.is_zero() {
            return Err(SrpError::ZeroScrambler);
        }

        let verifier = BigNum::from_hex(&self.verifier)?;
        let base = client_public
            .mul(&BigNum::mod_pow(&verifier, &u, &grp.n))
            .rem(&grp.n);
        let mut shared = BigNum::mod_pow(&base, &self.ephemeral.secret, &grp.n);

        let key = sha256(&pad_n(&shared));
        shared.zeroize();

        let a_hex = client_public.to_hex();
        let b_hex = self.ephemeral.public.to_hex();
        let key_hex = hex::encode(key);
        let expected_proof = hex::encode(sha256(format!("{a_hex}{b_hex}{key_hex}").as_bytes()));

        let expected = hex::decode(&expected_proof).expect("proof computed as hex");
        let got = hex::decode(client_proof_hex)?;
        if got.len() != expected.len() || expected.ct_eq(&got).unwrap_u8() != 1 {
            tracing::debug!(user = %self.username, "SRP proof mismatch");
            return Err(SrpError::InvalidProof);
        }

        let proof = hex::encode(sha256(format!("{a_hex}{expected_proof}{key_hex}").as_bytes()));
        Ok(ServerSession {
            key: Zeroizing::new(key),
            proof,
        })
    }
}

/// Outcome of a successful server-side verification.
pub struct ServerSession {
    key: Zeroizing<[u8; 32]>,
    /// M2, echoed to the client.
    pub proof: String,
}

impl std::fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("proof", &self.proof)
            .finish_non_exhaustive()
    }
}

impl ServerSession {
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }
}
