//! AES-256-GCM authenticated encryption (NIST SP 800-38D).
//!
//! 96-bit IVs take the fast path (J0 = IV || 0^31 || 1); any other nonempty
//! IV length derives J0 through GHASH. Tag verification is constant-time and
//! no plaintext is released on failure.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::aes::{self, RoundKeys, BLOCK_SIZE};
use crate::error::CryptoError;
use crate::ghash::{ghash, length_block, pad_to_16};

/// IV length the vault engine always uses.
pub const IV_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const KEY_SIZE: usize = 32;

/// An AES-256-GCM instance bound to one key. The expanded key schedule and
/// the hash subkey zeroize on drop.
pub struct Aes256Gcm {
    round_keys: RoundKeys,
    h: [u8; BLOCK_SIZE],
}

impl Drop for Aes256Gcm {
    fn drop(&mut self) {
        self.h.zeroize();
    }
}

impl Aes256Gcm {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        let round_keys = aes::key_schedule(key);
        // Hash subkey H = E_K(0^128).
        let h = aes::encrypt_block(&[0u8; BLOCK_SIZE], &round_keys);
        Self { round_keys, h }
    }

    /// Encrypt `plaintext`, authenticating `aad` alongside it. Returns the
    /// ciphertext (same length as the plaintext) and the 16-byte tag.
    pub fn encrypt(
        &self,
        iv: &[u8],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_SIZE]), CryptoError> {
        let j0 = self.j0(iv)?;
        let mut icb = j0;
        inc32(&mut icb);
        let ciphertext = self.gctr(&icb, plaintext);
        let tag = self.compute_tag(&j0, &ciphertext, aad)?;
        Ok((ciphertext, tag))
    }

    /// Verify the tag, then decrypt. Tag mismatch yields `AuthFail` and
    /// nothing else; the keystream is never applied to unauthenticated data.
    pub fn decrypt(
        &self,
        iv: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if tag.len() != TAG_SIZE {
            return Err(CryptoError::InvalidTagSize(tag.len()));
        }
        let j0 = self.j0(iv)?;
        let expected = self.compute_tag(&j0, ciphertext, aad)?;
        if expected.ct_eq(tag).unwrap_u8() != 1 {
            return Err(CryptoError::AuthFail);
        }
        let mut icb = j0;
        inc32(&mut icb);
        Ok(self.gctr(&icb, ciphertext))
    }

    /// J0 per SP 800-38D §7.1.
    fn j0(&self, iv: &[u8]) -> Result<[u8; BLOCK_SIZE], CryptoError> {
        if iv.is_empty() {
            return Err(CryptoError::EmptyIv);
        }
        if iv.len() == IV_SIZE {
            let mut j0 = [0u8; BLOCK_SIZE];
            j0[..IV_SIZE].copy_from_slice(iv);
            j0[BLOCK_SIZE - 1] = 1;
            Ok(j0)
        } else {
            let mut data = pad_to_16(iv);
            data.extend_from_slice(&length_block(0, iv.len()));
            ghash(&self.h, &data)
        }
    }

    /// GCTR: XOR with the keystream E_K(ICB), E_K(inc32(ICB)), ...
    fn gctr(&self, icb: &[u8; BLOCK_SIZE], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut counter = *icb;
        for chunk in data.chunks(BLOCK_SIZE) {
            let mut keystream = aes::encrypt_block(&counter, &self.round_keys);
            for (b, k) in chunk.iter().zip(&keystream) {
                out.push(b ^ k);
            }
            keystream.zeroize();
            inc32(&mut counter);
        }
        out
    }

    fn compute_tag(
        &self,
        j0: &[u8; BLOCK_SIZE],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<[u8; TAG_SIZE], CryptoError> {
        let mut data = pad_to_16(aad);
        data.extend_from_slice(&pad_to_16(ciphertext));
        data.extend_from_slice(&length_block(aad.len(), ciphertext.len()));
        let s = ghash(&self.h, &data)?;
        let e_j0 = aes::encrypt_block(j0, &self.round_keys);
        let mut tag = [0u8; TAG_SIZE];
        for i in 0..TAG_SIZE {
            tag[i] = e_j0[i] ^ s[i];
        }
        Ok(tag)
    }
}

/// Increment the last 32 bits of the counter block, wrapping mod 2^32.
fn inc32(block: &mut [u8; BLOCK_SIZE]) {
    let ctr = u32::from_be_bytes(block[12..].try_into().expect("4-byte suffix"));
    block[12..].copy_from_slice(&ctr.wrapping_add(1).to_be_bytes());
}

/// Fresh random 96-bit nonce for vault envelopes.
pub fn generate_nonce() -> [u8; IV_SIZE] {
    let mut nonce = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
