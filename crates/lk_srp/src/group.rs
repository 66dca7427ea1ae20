//! The 2048-bit MODP group from the SRP-6a specification (RFC 5054,
//! appendix A), with the multiplier parameter `k = H(N || g)` computed once
//! per process.

use once_cell::sync::Lazy;

use lk_crypto::hash::sha256;

use crate::bignum::BigNum;

/// RFC 5054 2048-bit prime, lowercase hex.
pub const N_HEX: &str = "ac6bdb41324a9a9bf166de5e1389582faf72b6651987ee07fc3192943db56050\
                         a37329cbb4a099ed8193e0757767a13dd52312ab4b03310dcd7f48a9da04fd50\
                         e8083969edb767b0cf6095179a163ab3661a05fbd5faaae82918a9962f0b93b8\
                         55f97993ec975eeaa80d740adbf4ff747359d041d5c33ea71d281e446b14773b\
                         ca97b43a23fb801676bd207a436c6481f1d2b9078717461a5b9d32e688f87748\
                         544523b524b0d57d5ea77a2775d2ecfa032cfbdbf52fb3786160279004e57ae6\
                         af874e7303ce53299ccc041c7bc308d82a5698f3a8d0c38271ae35f8e9dbfbb6\
                         94b5c803d89f7ae435de236d525f54759b65e372fcd68ef20fa7111f9e4aff73";

pub const GENERATOR: u64 = 2;

/// Byte length of N; `pad_n` targets this width.
pub const N_BYTE_LEN: usize = 256;

pub struct Group {
    pub n: BigNum,
    pub g: BigNum,
    pub k: BigNum,
}

static GROUP: Lazy<Group> = Lazy::new(|| {
    let n = BigNum::from_hex(N_HEX).expect("compiled-in group prime is valid hex");
    let g = BigNum::from_u64(GENERATOR);
    let k = BigNum::from_bytes_be(&sha256(&[hash_bytes(&n), hash_bytes(&g)].concat()));
    Group { n, g, k }
});

pub fn group() -> &'static Group {
    &GROUP
}

/// Left-zero-pad a value to the byte length of N. Values are already reduced
/// mod N when this is called.
pub fn pad_n(value: &BigNum) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    debug_assert!(bytes.len() <= N_BYTE_LEN);
    let mut out = vec![0u8; N_BYTE_LEN - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

/// Canonical byte form of a big integer for hashing: its even-length hex
/// decoded to bytes (a zero nibble is prepended to odd-length hex, so zero
/// becomes the single byte 0x00).
pub fn hash_bytes(value: &BigNum) -> Vec<u8> {
    let hex_form = value.to_hex();
    let bytes = if hex_form.len() % 2 == 1 {
        hex::decode(format!("0{hex_form}"))
    } else {
        hex::decode(&hex_form)
    };
    bytes.expect("hex produced by to_hex is valid")
}
