//! GHASH universal hash over GF(2^128) (NIST SP 800-38D §6.4).
//!
//! Multiplication uses the shift-and-xor method with the reduction constant
//! `0xE1 || 0^120`, the bit-reversed form of x^128 + x^7 + x^2 + x + 1.
//! Bit selection and reduction are mask-based, so the multiply runs the same
//! instruction sequence regardless of operand bits.

use crate::error::CryptoError;

/// Reduction constant R, MSB-first representation.
const R: u128 = 0xe1 << 120;

/// GHASH subkey length, same as the cipher block.
pub const GHASH_BLOCK: usize = 16;

/// Multiply two field elements, x treated MSB-first per SP 800-38D.
fn gf128_mul(x: u128, y: u128) -> u128 {
    let mut z = 0u128;
    let mut v = y;
    let mut i = 128;
    while i > 0 {
        i -= 1;
        let x_bit = (x >> i) & 1;
        z ^= v & x_bit.wrapping_neg();
        let lsb = v & 1;
        v = (v >> 1) ^ (R & lsb.wrapping_neg());
    }
    z
}

/// Zero-pad `data` up to the next 16-byte boundary. Already-aligned input
/// (including empty input) is returned unchanged.
pub fn pad_to_16(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let rem = out.len() % GHASH_BLOCK;
    if rem != 0 {
        out.resize(out.len() + (GHASH_BLOCK - rem), 0);
    }
    out
}

/// The final GHASH block: 64-bit big-endian **bit** lengths of the AAD and
/// the ciphertext, in that order. Arguments are byte lengths.
pub fn length_block(aad_len: usize, ct_len: usize) -> [u8; GHASH_BLOCK] {
    let mut out = [0u8; GHASH_BLOCK];
    out[..8].copy_from_slice(&((aad_len as u64) * 8).to_be_bytes());
    out[8..].copy_from_slice(&((ct_len as u64) * 8).to_be_bytes());
    out
}

/// GHASH_H(data): Y_0 = 0, Y_i = (Y_{i-1} ^ X_i) * H.
///
/// `h` must be 16 bytes and `data` must already be padded to a multiple of
/// 16; callers assemble `pad_to_16(aad) || pad_to_16(ct) || length_block`.
pub fn ghash(h: &[u8], data: &[u8]) -> Result<[u8; GHASH_BLOCK], CryptoError> {
    if h.len() != GHASH_BLOCK {
        return Err(CryptoError::InvalidSubkeySize(h.len()));
    }
    if data.len() % GHASH_BLOCK != 0 {
        return Err(CryptoError::UnpaddedInput(data.len()));
    }
    let h = u128::from_be_bytes(h.try_into().expect("length checked above"));
    let mut y = 0u128;
    for block in data.chunks_exact(GHASH_BLOCK) {
        let x = u128::from_be_bytes(block.try_into().expect("exact chunk"));
        y = gf128_mul(y ^ x, h);
    }
    Ok(y.to_be_bytes())
}
