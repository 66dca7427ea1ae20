//! Arbitrary-precision nonnegative integers for the SRP group arithmetic.
//!
//! Little-endian `u64` limbs, normalized (no trailing zero limbs). The only
//! heavy operation the exchange needs is `mod_pow`, implemented as
//! left-to-right square-and-multiply where the multiply result is folded in
//! by mask selection rather than a branch on the exponent bit. Reduction is
//! binary shift-and-subtract against the fixed modulus.

use std::cmp::Ordering;

use zeroize::Zeroize;

use crate::error::SrpError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BigNum {
    /// Little-endian limbs; empty means zero.
    limbs: Vec<u64>,
}

impl Zeroize for BigNum {
    fn zeroize(&mut self) {
        self.limbs.zeroize();
    }
}

impl BigNum {
    pub fn zero() -> Self {
        Self { limbs: Vec::new() }
    }

    pub fn from_u64(value: u64) -> Self {
        Self::normalized(vec![value])
    }

    fn normalized(mut limbs: Vec<u64>) -> Self {
        while limbs.last() == Some(&0) {
            limbs.pop();
        }
        Self { limbs }
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Number of significant bits; zero for zero.
    pub fn bit_len(&self) -> usize {
        match self.limbs.last() {
            None => 0,
            Some(top) => self.limbs.len() * 64 - top.leading_zeros() as usize,
        }
    }

    pub fn bit(&self, index: usize) -> bool {
        self.limbs
            .get(index / 64)
            .map(|limb| (limb >> (index % 64)) & 1 == 1)
            .unwrap_or(false)
    }

    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        let mut limbs = Vec::with_capacity(bytes.len() / 8 + 1);
        for chunk in bytes.rchunks(8) {
            let mut buf = [0u8; 8];
            buf[8 - chunk.len()..].copy_from_slice(chunk);
            limbs.push(u64::from_be_bytes(buf));
        }
        Self::normalized(limbs)
    }

    /// Minimal big-endian bytes; empty for zero.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.limbs.len() * 8);
        for limb in self.limbs.iter().rev() {
            out.extend_from_slice(&limb.to_be_bytes());
        }
        let leading = out.iter().take_while(|&&b| b == 0).count();
        out.drain(..leading);
        out
    }

    /// Parse lowercase or uppercase hex, with or without a leading zero
    /// nibble. No `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, SrpError> {
        let bytes = if hex_str.len() % 2 == 1 {
            hex::decode(format!("0{hex_str}"))?
        } else {
            hex::decode(hex_str)?
        };
        Ok(Self::from_bytes_be(&bytes))
    }

    /// Minimal lowercase hex, no leading zeros; `"0"` for zero.
    pub fn to_hex(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let encoded = hex::encode(self.to_bytes_be());
        match encoded.strip_prefix('0') {
            Some(rest) => rest.to_string(),
            None => encoded,
        }
    }

    pub fn add(&self, rhs: &Self) -> Self {
        let len = self.limbs.len().max(rhs.limbs.len());
        let mut out = Vec::with_capacity(len + 1);
        let mut carry = 0u128;
        for i in 0..len {
            let a = self.limbs.get(i).copied().unwrap_or(0) as u128;
            let b = rhs.limbs.get(i).copied().unwrap_or(0) as u128;
            let t = a + b + carry;
            out.push(t as u64);
            carry = t >> 64;
        }
        if carry != 0 {
            out.push(carry as u64);
        }
        Self::normalized(out)
    }

    /// `self - rhs`, or `None` when rhs is larger.
    pub fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        if self < rhs {
            return None;
        }
        let mut out = Vec::with_capacity(self.limbs.len());
        let mut borrow = 0u64;
        for i in 0..self.limbs.len() {
            let b = rhs.limbs.get(i).copied().unwrap_or(0);
            let (d1, underflow1) = self.limbs[i].overflowing_sub(b);
            let (d2, underflow2) = d1.overflowing_sub(borrow);
            out.push(d2);
            borrow = (underflow1 | underflow2) as u64;
        }
        debug_assert_eq!(borrow, 0);
        Some(Self::normalized(out))
    }

    /// Schoolbook multiplication with 128-bit intermediate products.
    pub fn mul(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        let mut out = vec![0u64; self.limbs.len() + rhs.limbs.len()];
        for (i, &a) in self.limbs.iter().enumerate() {
            let mut carry = 0u128;
            for (j, &b) in rhs.limbs.iter().enumerate() {
                let t = out[i + j] as u128 + (a as u128) * (b as u128) + carry;
                out[i + j] = t as u64;
                carry = t >> 64;
            }
            let mut idx = i + rhs.limbs.len();
            while carry != 0 {
                let t = out[idx] as u128 + carry;
                out[idx] = t as u64;
                carry = t >> 64;
                idx += 1;
            }
        }
        Self::normalized(out)
    }

    /// `self mod modulus` by binary shift-and-subtract.
    pub fn rem(&self, modulus: &Self) -> Self {
        assert!(!modulus.is_zero(), "reduction modulo zero");
        if self < modulus {
            return self.clone();
        }
        let mut r = self.clone();
        let max_shift = self.bit_len() - modulus.bit_len();
        for shift in (0..=max_shift).rev() {
            while cmp_shifted(&r.limbs, &modulus.limbs, shift) != Ordering::Less {
                sub_shifted(&mut r.limbs, &modulus.limbs, shift);
                while r.limbs.last() == Some(&0) {
                    r.limbs.pop();
                }
            }
        }
        r
    }

    /// Pick `a` when `choice` is true, `b` otherwise, via limb masks.
    fn select(a: &Self, b: &Self, choice: bool) -> Self {
        let mask = (choice as u64).wrapping_neg();
        let len = a.limbs.len().max(b.limbs.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let av = a.limbs.get(i).copied().unwrap_or(0);
            let bv = b.limbs.get(i).copied().unwrap_or(0);
            out.push((av & mask) | (bv & !mask));
        }
        Self::normalized(out)
    }

    /// `base^exponent mod modulus`. Square-and-multiply over the exponent
    /// bits, most significant first; the multiply is always computed and
    /// folded in by selection.
    pub fn mod_pow(base: &Self, exponent: &Self, modulus: &Self) -> Self {
        let base = base.rem(modulus);
        let mut acc = Self::from_u64(1).rem(modulus);
        for i in (0..exponent.bit_len()).rev() {
            acc = acc.mul(&acc).rem(modulus);
            let stepped = acc.mul(&base).rem(modulus);
            acc = Self::select(&stepped, &acc, exponent.bit(i));
        }
        acc
    }
}

impl Ord for BigNum {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.limbs.len().cmp(&other.limbs.len()) {
            Ordering::Equal => {}
            order => return order,
        }
        for (a, b) in self.limbs.iter().rev().zip(other.limbs.iter().rev()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                order => return order,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for BigNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Limb `idx` of `limbs << shift` without materializing the shifted value.
fn shifted_limb(limbs: &[u64], idx: usize, limb_off: usize, bit_off: u32) -> u64 {
    if idx < limb_off {
        return 0;
    }
    let i = idx - limb_off;
    let current = limbs.get(i).copied().unwrap_or(0);
    if bit_off == 0 {
        return current;
    }
    let spill = if i == 0 {
        0
    } else {
        limbs.get(i - 1).copied().unwrap_or(0) >> (64 - bit_off)
    };
    (current << bit_off) | spill
}

fn cmp_shifted(value: &[u64], modulus: &[u64], shift: usize) -> Ordering {
    let limb_off = shift / 64;
    let bit_off = (shift % 64) as u32;
    let shifted_len = limb_off + modulus.len() + usize::from(bit_off != 0);
    let n = value.len().max(shifted_len);
    for idx in (0..n).rev() {
        let a = value.get(idx).copied().unwrap_or(0);
        let b = shifted_limb(modulus, idx, limb_off, bit_off);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            order => return order,
        }
    }
    Ordering::Equal
}

/// In-place `value -= modulus << shift`. Caller guarantees no underflow.
fn sub_shifted(value: &mut [u64], modulus: &[u64], shift: usize) {
    let limb_off = shift / 64;
    let bit_off = (shift % 64) as u32;
    let mut borrow = 0u64;
    for idx in limb_off..value.len() {
        let m = shifted_limb(modulus, idx, limb_off, bit_off);
        let (d1, underflow1) = value[idx].overflowing_sub(m);
        let (d2, underflow2) = d1.overflowing_sub(borrow);
        value[idx] = d2;
        borrow = (underflow1 | underflow2) as u64;
    }
    debug_assert_eq!(borrow, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(hex: &str) -> BigNum {
        BigNum::from_hex(hex).unwrap()
    }

    const N_2048: &str = "ac6bdb41324a9a9bf166de5e1389582faf72b6651987ee07fc3192943db56050\
                          a37329cbb4a099ed8193e0757767a13dd52312ab4b03310dcd7f48a9da04fd50\
                          e8083969edb767b0cf6095179a163ab3661a05fbd5faaae82918a9962f0b93b8\
                          55f97993ec975eeaa80d740adbf4ff747359d041d5c33ea71d281e446b14773b\
                          ca97b43a23fb801676bd207a436c6481f1d2b9078717461a5b9d32e688f87748\
                          544523b524b0d57d5ea77a2775d2ecfa032cfbdbf52fb3786160279004e57ae6\
                          af874e7303ce53299ccc041c7bc308d82a5698f3a8d0c38271ae35f8e9dbfbb6\
                          94b5c803d89f7ae435de236d525f54759b65e372fcd68ef20fa7111f9e4aff73";

    #[test]
    fn hex_round_trips() {
        assert_eq!(BigNum::zero().to_hex(), "0");
        assert_eq!(n("0").to_hex(), "0");
        assert_eq!(n("f").to_hex(), "f");
        assert_eq!(n("0f").to_hex(), "f");
        assert_eq!(n("deadbeef").to_hex(), "deadbeef");
        assert_eq!(n("DEADBEEF").to_hex(), "deadbeef");
        assert_eq!(n(N_2048).to_hex(), N_2048);
        // Odd-length hex gains a zero nibble when decoded to bytes.
        assert_eq!(n("123").to_bytes_be(), vec![0x01, 0x23]);
    }

    #[test]
    fn byte_round_trips() {
        assert_eq!(BigNum::zero().to_bytes_be(), Vec::<u8>::new());
        assert_eq!(BigNum::from_bytes_be(&[0, 0, 1, 2]).to_bytes_be(), vec![1, 2]);
        let bytes = hex::decode("0102030405060708090a0b0c0d0e0f10").unwrap();
        assert_eq!(BigNum::from_bytes_be(&bytes).to_bytes_be(), bytes);
    }

    #[test]
    fn ordering_and_bits() {
        assert!(n("ffffffffffffffff") < n("10000000000000000"));
        assert!(n("2") > n("1"));
        assert_eq!(n("8000000000000000").bit_len(), 64);
        assert_eq!(n("10000000000000000").bit_len(), 65);
        assert!(n("10").bit(4));
        assert!(!n("10").bit(3));
    }

    #[test]
    fn add_sub_mul() {
        let a = n("ffffffffffffffffffffffffffffffff");
        assert_eq!(a.add(&BigNum::from_u64(1)).to_hex(), "100000000000000000000000000000000");
        assert_eq!(
            a.add(&BigNum::from_u64(1)).checked_sub(&BigNum::from_u64(1)).unwrap(),
            a
        );
        assert!(BigNum::from_u64(1).checked_sub(&BigNum::from_u64(2)).is_none());

        let b = n("fedcba9876543210fedcba9876543210");
        assert_eq!(
            a.mul(&b).to_hex(),
            "fedcba9876543210fedcba987654320f0123456789abcdef0123456789abcdf0"
        );
    }

    #[test]
    fn rem_vectors() {
        assert_eq!(n("10").rem(&n("10")).to_hex(), "0");
        assert_eq!(n("11").rem(&n("10")).to_hex(), "1");
        assert_eq!(n("3").rem(&n("10")).to_hex(), "3");
        assert_eq!(
            n("abcdef0123456789abcdef0123456789abcdef0123456789")
                .rem(&n("1234567890abcdef1234567"))
                .to_hex(),
            "9678f62630c08ec838bf62"
        );
    }

    #[test]
    fn mod_pow_small() {
        let m = n("ffffffffffffffc5");
        let a = n("123456789abcdef0fedcba9876543210deadbeefcafebabe0123456789abcdef");
        let e = n("fedcba9876543210");
        assert_eq!(BigNum::mod_pow(&a, &e, &m).to_hex(), "201ecafe12ad6c8");

        // Edge exponents.
        assert_eq!(BigNum::mod_pow(&a, &BigNum::zero(), &m).to_hex(), "1");
        assert_eq!(BigNum::mod_pow(&a, &BigNum::from_u64(1), &m), a.rem(&m));
        assert_eq!(
            BigNum::mod_pow(&BigNum::zero(), &BigNum::from_u64(5), &m).to_hex(),
            "0"
        );
        assert_eq!(BigNum::mod_pow(&a, &e, &BigNum::from_u64(1)).to_hex(), "0");
    }

    #[test]
    fn mod_pow_2048() {
        let modulus = n(N_2048);
        let base = n("b6d02fd0c1e6f4d9a1b2c3d4e5f60718293a4b5c6d7e8f90123456789abcdef0");
        let exp = n("1f2e3d4c5b6a79880977a6b5c4d3e2f1");
        assert_eq!(
            BigNum::mod_pow(&base, &exp, &modulus).to_hex(),
            "a9192afd320a83ca3cecc51a732a1e55ef4af2d50308e1a0ec37ace6f3d4ddb1\
             55ecb6cbe167df83a7a164bcf069731cbb1783592732670505eee1375cb18dde\
             f45748fc4f8f57ed929772de1b86edb9623001a23f1f1cf57720ab2fa1417bf6\
             f639e339add164c6eb0951201ecd0abed137a6bb311586e710646de9cb0de3e1\
             c8885e704446d3d24f2baba7ba4345d586f47673b36fd4fed0ee2cc1646215b4\
             cf84707b7b8fe218adf5fc2d0c80b1c87e0c5d6e4d9eb4430cbef9bd53c8ad09\
             beb44e849de52625bc91daf34d39687b064787ba405d7abfd9ff761766019996\
             58941be2b8251f32c89529f08abbf472c4e08ed0f1fa7db4764eaea3be92f50e"
        );

        assert_eq!(
            BigNum::mod_pow(&BigNum::from_u64(2), &n("deadbeef"), &modulus).to_hex(),
            "1fd82b1e2685395e902e88aab8312ed3220cf67af568d2bc32e18cefd1ccaccb\
             d9319fae753a77e21ea4c714ef3e87105c499cce39513196465e8b1af09ef472\
             6567a3234fbc18b7047a1e6af0444c603ae2c84fd34991e880e12c25142fe2ea\
             ca8f4024b05a7e9e492325ea876c6a2e7e2a47fb42da0718cb06e34877411323\
             abf6a135732becd73905cd3525024f87ab511942412239b96b54483f0049960a\
             166635e39c5172f97da3ea8f511de1f123a63791ed504c95b713aa96683d91bb\
             d19f309f9b61ae1114cb561f9e0a6f41daa133b1e8dfdb6ba90f8deb4d22452b\
             2ea1508492c18bacc1e1753847b119685d3525a88b643458d3b9504c20e78b74"
        );
    }

    #[test]
    fn rfc5054_verifier() {
        // Appendix B of RFC 5054: v = g^x mod N over the 1024-bit group.
        let modulus = n(
            "eeaf0ab9adb38dd69c33f80afa8fc5e86072618775ff3c0b9ea2314c9c256576\
             d674df7496ea81d3383b4813d692c6e0e0d5d8e250b98be48e495c1d6089dad1\
             5dc7d7b46154d6b6ce8ef4ad69b15d4982559b297bcf1885c529f566660e57ec\
             68edbc3c05726cc02fd4cbf4976eaa9afd5138fe8376435b9fc61d2fc0eb06e3",
        );
        let x = n("94b7555aabe9127cc58ccf4993db6cf84d16c124");
        assert_eq!(
            BigNum::mod_pow(&BigNum::from_u64(2), &x, &modulus).to_hex(),
            "7e273de8696ffc4f4e337d05b4b375beb0dde1569e8fa00a9886d8129bada1f1\
             822223ca1a605b530e379ba4729fdc59f105b4787e5186f5c671085a1447b52a\
             48cf1970b4fb6f8400bbf4cebfbb168152e08ab5ea53d15c1aff87b2b9da6e04\
             e058ad51cc72bfc9033b564e26480d78e955a5e29e7ab245db2be315e2099afb"
        );
    }

    #[test]
    fn zeroize_clears_limbs() {
        let mut v = n("deadbeefdeadbeefdeadbeef");
        v.zeroize();
        assert!(v.is_zero());
    }
}
