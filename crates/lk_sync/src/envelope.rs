//! The transport envelope.
//!
//! Upload: canonical entries JSON -> inner AEAD envelope under the vault key
//! -> SHA-256 of (iv || ciphertext || tag) -> outer AEAD envelope over that
//! digest. Download verifies in reverse: outer envelope first, digest
//! compared in constant time, only then is the inner envelope opened. A
//! digest mismatch is `IntegrityFail` and nothing local changes.

use subtle::ConstantTimeEq;

use lk_crypto::gcm::Aes256Gcm;
use lk_crypto::hash::sha256;
use lk_crypto::kdf::VaultKey;
use lk_vault::record::{canonical_entries, Envelope};
use lk_vault::{PasswordRecord, VaultDocument};

use crate::api::RemoteVault;
use crate::error::SyncError;

/// Digest input for the integrity envelope: the inner envelope's raw parts
/// in wire order.
fn envelope_digest(inner: &Envelope) -> [u8; 32] {
    sha256(&[inner.iv.as_slice(), &inner.ciphertext, &inner.tag].concat())
}

/// Seal a local document for upload.
pub fn build_remote_vault(
    document: &VaultDocument,
    key: &VaultKey,
) -> Result<RemoteVault, SyncError> {
    let cipher = Aes256Gcm::new(key.as_bytes());
    let canonical = canonical_entries(&document.vault.passwords)?;
    let inner = Envelope::seal(&cipher, &canonical)?;
    let outer = Envelope::seal(&cipher, &envelope_digest(&inner))?;
    Ok(RemoteVault {
        user: document.user.clone(),
        version: document.version,
        salt: document.salt.clone(),
        created_at: document.created_at,
        updated_at: document.updated_at,
        vault_iv: inner.iv_base64(),
        vault_ciphertext: inner.ciphertext_base64(),
        vault_tag: inner.tag_base64(),
        verification_iv: outer.iv_base64(),
        verification_ciphertext: outer.ciphertext_base64(),
        verification_tag: outer.tag_base64(),
    })
}

/// Verify and open a downloaded document, returning its entries.
pub fn open_remote_vault(
    remote: &RemoteVault,
    key: &VaultKey,
) -> Result<Vec<PasswordRecord>, SyncError> {
    let cipher = Aes256Gcm::new(key.as_bytes());
    let inner = Envelope::from_base64(&remote.vault_ciphertext, &remote.vault_iv, &remote.vault_tag)?;
    let outer = Envelope::from_base64(
        &remote.verification_ciphertext,
        &remote.verification_iv,
        &remote.verification_tag,
    )?;

    let expected = outer.open(&cipher).map_err(|_| SyncError::AuthFail)?;
    let digest = envelope_digest(&inner);
    if expected.len() != digest.len() || digest.ct_eq(&expected).unwrap_u8() != 1 {
        return Err(SyncError::IntegrityFail);
    }

    let plaintext = inner.open(&cipher)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
