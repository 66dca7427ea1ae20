//! Vault document and record types.
//!
//! The on-disk shape is fixed: binary fields are standard-alphabet base64,
//! timestamps RFC 3339, secret fields AEAD envelopes with independent
//! nonces. The canonical byte sequence hashed into the verification token
//! (and into sync digests) is the compact JSON encoding of the `passwords`
//! array in insertion order; both ends of the protocol run this codec, which
//! pins the encoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lk_crypto::gcm::{generate_nonce, Aes256Gcm, IV_SIZE, TAG_SIZE};
use lk_crypto::hash::sha256;
use lk_crypto::CryptoError;

use crate::error::VaultError;

/// An AEAD envelope: ciphertext, 12-byte nonce, 16-byte tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

impl Envelope {
    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Self, CryptoError> {
        let iv = generate_nonce();
        let (ciphertext, tag) = cipher.encrypt(&iv, plaintext, &[])?;
        Ok(Self { iv, ciphertext, tag })
    }

    pub fn open(&self, cipher: &Aes256Gcm) -> Result<Vec<u8>, CryptoError> {
        cipher.decrypt(&self.iv, &self.ciphertext, &self.tag, &[])
    }

    /// Rebuild from base64 fields, validating nonce and tag widths.
    pub fn from_base64(ciphertext: &str, iv: &str, tag: &str) -> Result<Self, VaultError> {
        let iv_bytes = BASE64.decode(iv)?;
        let iv: [u8; IV_SIZE] = iv_bytes
            .try_into()
            .map_err(|bad: Vec<u8>| VaultError::InvalidRequest(format!("IV must be {IV_SIZE} bytes, got {}", bad.len())))?;
        let tag_bytes = BASE64.decode(tag)?;
        let tag: [u8; TAG_SIZE] = tag_bytes
            .try_into()
            .map_err(|bad: Vec<u8>| VaultError::InvalidRequest(format!("tag must be {TAG_SIZE} bytes, got {}", bad.len())))?;
        Ok(Self {
            iv,
            ciphertext: BASE64.decode(ciphertext)?,
            tag,
        })
    }

    pub fn ciphertext_base64(&self) -> String {
        BASE64.encode(&self.ciphertext)
    }

    pub fn iv_base64(&self) -> String {
        BASE64.encode(self.iv)
    }

    pub fn tag_base64(&self) -> String {
        BASE64.encode(self.tag)
    }
}

/// Cleartext entry metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub site: String,
    pub category: String,
    pub note: String,
    pub favorite: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Encrypted entry fields. `username` and `password` are independent
/// envelopes with distinct nonces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    pub username: String,
    pub username_iv: String,
    pub username_tag: String,
    pub password: String,
    pub password_iv: String,
    pub password_tag: String,
}

impl RecordData {
    pub fn from_envelopes(username: &Envelope, password: &Envelope) -> Self {
        Self {
            username: username.ciphertext_base64(),
            username_iv: username.iv_base64(),
            username_tag: username.tag_base64(),
            password: password.ciphertext_base64(),
            password_iv: password.iv_base64(),
            password_tag: password.tag_base64(),
        }
    }

    pub fn username_envelope(&self) -> Result<Envelope, VaultError> {
        Envelope::from_base64(&self.username, &self.username_iv, &self.username_tag)
    }

    pub fn password_envelope(&self) -> Result<Envelope, VaultError> {
        Envelope::from_base64(&self.password, &self.password_iv, &self.password_tag)
    }

    pub fn set_username(&mut self, envelope: &Envelope) {
        self.username = envelope.ciphertext_base64();
        self.username_iv = envelope.iv_base64();
        self.username_tag = envelope.tag_base64();
    }

    pub fn set_password(&mut self, envelope: &Envelope) {
        self.password = envelope.ciphertext_base64();
        self.password_iv = envelope.iv_base64();
        self.password_tag = envelope.tag_base64();
    }
}

/// One credential entry. Ids are unique within a vault and monotone:
/// the next id is max(id)+1, or 0 for the first entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub password_id: u64,
    pub metadata: RecordMetadata,
    pub data: RecordData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultBody {
    pub passwords: Vec<PasswordRecord>,
}

/// The persisted vault document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultDocument {
    pub user: String,
    /// Monotonic counter, >= 1; bumped on every locally mutating save.
    pub version: u64,
    /// Per-user KDF salt, base64 (32 bytes).
    pub salt: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// AEAD envelope over SHA-256 of the canonical entries list.
    #[serde(rename = "verificationToken")]
    pub verification_token: String,
    #[serde(rename = "verificationIV")]
    pub verification_iv: String,
    #[serde(rename = "verificationTag")]
    pub verification_tag: String,
    pub vault: VaultBody,
}

impl VaultDocument {
    pub fn from_json(bytes: &[u8]) -> Result<Self, VaultError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, VaultError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn verification_envelope(&self) -> Result<Envelope, VaultError> {
        Envelope::from_base64(
            &self.verification_token,
            &self.verification_iv,
            &self.verification_tag,
        )
    }

    pub fn set_verification_envelope(&mut self, envelope: &Envelope) {
        self.verification_token = envelope.ciphertext_base64();
        self.verification_iv = envelope.iv_base64();
        self.verification_tag = envelope.tag_base64();
    }
}

/// The pinned canonical byte sequence for a list of entries.
pub fn canonical_entries(records: &[PasswordRecord]) -> Result<Vec<u8>, VaultError> {
    Ok(serde_json::to_vec(records)?)
}

/// SHA-256 over the canonical entries, the verification-token plaintext.
pub fn entries_digest(records: &[PasswordRecord]) -> Result<[u8; 32], VaultError> {
    Ok(sha256(&canonical_entries(records)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PasswordRecord {
        let zero_iv = BASE64.encode([0u8; IV_SIZE]);
        let zero_tag = BASE64.encode([0u8; TAG_SIZE]);
        PasswordRecord {
            password_id: 0,
            metadata: RecordMetadata {
                site: "github.com".into(),
                category: "dev".into(),
                note: String::new(),
                favorite: false,
                created: "2026-08-02T10:00:00Z".parse().unwrap(),
                updated: "2026-08-02T10:00:00Z".parse().unwrap(),
            },
            data: RecordData {
                username: BASE64.encode(b"A"),
                username_iv: zero_iv.clone(),
                username_tag: zero_tag.clone(),
                password: BASE64.encode(b"B"),
                password_iv: zero_iv,
                password_tag: zero_tag,
            },
        }
    }

    #[test]
    fn canonical_bytes_are_pinned() {
        let canonical = canonical_entries(&[sample_record()]).unwrap();
        assert_eq!(
            String::from_utf8(canonical).unwrap(),
            r#"[{"password_id":0,"metadata":{"site":"github.com","category":"dev","note":"","favorite":false,"created":"2026-08-02T10:00:00Z","updated":"2026-08-02T10:00:00Z"},"data":{"username":"QQ==","username_iv":"AAAAAAAAAAAAAAAA","username_tag":"AAAAAAAAAAAAAAAAAAAAAA==","password":"Qg==","password_iv":"AAAAAAAAAAAAAAAA","password_tag":"AAAAAAAAAAAAAAAAAAAAAA=="}}]"#
        );
        assert_eq!(
            hex::encode(entries_digest(&[sample_record()]).unwrap()),
            "c97b79f139ace20851b58f62a872526927956a7174c9b31bf47c99a1f6a53b69"
        );
    }

    #[test]
    fn document_codec_round_trips_exactly() {
        let doc = VaultDocument {
            user: "alice".into(),
            version: 3,
            salt: BASE64.encode([7u8; 32]),
            created_at: "2026-08-01T08:30:00Z".parse().unwrap(),
            updated_at: "2026-08-02T10:00:00Z".parse().unwrap(),
            verification_token: BASE64.encode([1u8; 32]),
            verification_iv: BASE64.encode([2u8; IV_SIZE]),
            verification_tag: BASE64.encode([3u8; TAG_SIZE]),
            vault: VaultBody {
                passwords: vec![sample_record()],
            },
        };
        let bytes = doc.to_json().unwrap();
        let parsed = VaultDocument::from_json(&bytes).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.to_json().unwrap(), bytes);

        // Field names on the wire are fixed.
        let text = String::from_utf8(bytes).unwrap();
        for field in [
            "\"createdAt\"",
            "\"updatedAt\"",
            "\"verificationToken\"",
            "\"verificationIV\"",
            "\"verificationTag\"",
            "\"password_id\"",
            "\"username_iv\"",
        ] {
            assert!(text.contains(field), "missing {field}");
        }
    }

    #[test]
    fn envelope_seal_open_round_trip() {
        let cipher = Aes256Gcm::new(&[9u8; 32]);
        let envelope = Envelope::seal(&cipher, b"me@example.org").unwrap();
        assert_eq!(envelope.open(&cipher).unwrap(), b"me@example.org");

        let rebuilt = Envelope::from_base64(
            &envelope.ciphertext_base64(),
            &envelope.iv_base64(),
            &envelope.tag_base64(),
        )
        .unwrap();
        assert_eq!(rebuilt, envelope);
    }

    #[test]
    fn envelope_framing_is_validated() {
        assert!(matches!(
            Envelope::from_base64("!!!", "AAAAAAAAAAAAAAAA", "AAAAAAAAAAAAAAAAAAAAAA=="),
            Err(VaultError::Base64Decode(_))
        ));
        assert!(matches!(
            Envelope::from_base64("", &BASE64.encode([0u8; 5]), "AAAAAAAAAAAAAAAAAAAAAA=="),
            Err(VaultError::InvalidRequest(_))
        ));
        assert!(matches!(
            Envelope::from_base64("", &BASE64.encode([0u8; 12]), &BASE64.encode([0u8; 3])),
            Err(VaultError::InvalidRequest(_))
        ));
    }

    #[test]
    fn independent_nonces_per_field() {
        let cipher = Aes256Gcm::new(&[4u8; 32]);
        let user_env = Envelope::seal(&cipher, b"user").unwrap();
        let pass_env = Envelope::seal(&cipher, b"pass").unwrap();
        assert_ne!(user_env.iv, pass_env.iv);
        let data = RecordData::from_envelopes(&user_env, &pass_env);
        assert_ne!(data.username_iv, data.password_iv);
        assert_eq!(data.username_envelope().unwrap(), user_env);
        assert_eq!(data.password_envelope().unwrap(), pass_env);
    }
}
