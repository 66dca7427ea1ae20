//! The vault engine: master-password verification, entry mutation, rekey.
//!
//! Resident state holds ciphertext only; entries are decrypted on demand and
//! returned to the caller as short-lived values. Every mutating operation
//! re-seals the verification token and persists before returning, writing to
//! a temporary file and renaming so a failure at any step leaves the
//! previous vault intact. One vault object owns the file: concurrent opens
//! of the same user in one process are rejected.

use std::collections::HashSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use lk_crypto::gcm::Aes256Gcm;
use lk_crypto::kdf::{derive_vault_key, generate_device_secret, generate_salt, VaultKey};

use crate::config::Config;
use crate::error::VaultError;
use crate::keystore::KeyStore;
use crate::record::{
    entries_digest, Envelope, PasswordRecord, RecordData, RecordMetadata, VaultBody, VaultDocument,
};

static OPEN_VAULTS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Registration in the process-wide open-vault set, released on drop.
struct OpenGuard {
    user: String,
}

impl OpenGuard {
    fn acquire(user: &str) -> Result<Self, VaultError> {
        if !OPEN_VAULTS.lock().insert(user.to_string()) {
            return Err(VaultError::AlreadyOpen(user.to_string()));
        }
        Ok(Self {
            user: user.to_string(),
        })
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        OPEN_VAULTS.lock().remove(&self.user);
    }
}

/// A decrypted entry handed to the caller. Secret fields wipe on drop; the
/// type deliberately has no `Debug` so secrets cannot leak through logging.
pub struct DecryptedEntry {
    pub id: u64,
    pub site: String,
    pub category: String,
    pub note: String,
    pub favorite: bool,
    pub username: Zeroizing<String>,
    pub password: Zeroizing<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Field-wise edit; `None` leaves the field untouched.
#[derive(Debug, Default)]
pub struct EntryUpdate {
    pub site: Option<String>,
    pub category: Option<String>,
    pub note: Option<String>,
    pub favorite: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct VaultEngine {
    document: VaultDocument,
    key: VaultKey,
    cipher: Aes256Gcm,
    device_secret: Zeroizing<Vec<u8>>,
    path: PathBuf,
    config: Config,
    _guard: OpenGuard,
}

impl std::fmt::Debug for VaultEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultEngine")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VaultEngine {
    /// Create a fresh vault: new salt, new device secret (stored in the key
    /// store), empty entries, sealed verification token, persisted.
    pub fn create(
        user: &str,
        master_password: &str,
        path: &Path,
        config: Config,
        key_store: &dyn KeyStore,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        let guard = OpenGuard::acquire(user)?;
        if path.exists() {
            return Err(VaultError::InvalidRequest(format!(
                "vault file {} already exists",
                path.display()
            )));
        }

        let salt = generate_salt();
        let device_secret = Zeroizing::new(generate_device_secret().to_vec());
        key_store.put(user, &device_secret)?;

        let key = derive_vault_key(master_password, &device_secret, &salt, config.pbkdf2_iterations)?;
        let cipher = Aes256Gcm::new(key.as_bytes());

        let now = Utc::now();
        let mut document = VaultDocument {
            user: user.to_string(),
            version: 1,
            salt: BASE64.encode(salt),
            created_at: now,
            updated_at: now,
            verification_token: String::new(),
            verification_iv: String::new(),
            verification_tag: String::new(),
            vault: VaultBody { passwords: Vec::new() },
        };
        let digest = entries_digest(&document.vault.passwords)?;
        document.set_verification_envelope(&Envelope::seal(&cipher, &digest)?);

        let engine = Self {
            document,
            key,
            cipher,
            device_secret,
            path: path.to_path_buf(),
            config,
            _guard: guard,
        };
        engine.persist()?;
        tracing::debug!(user, "vault created");
        Ok(engine)
    }

    /// Open an existing vault. Any failure of the verification envelope,
    /// whether tag rejection or digest mismatch, is reported as
    /// `WrongPassword`; no entries are exposed on that path.
    pub fn open(
        user: &str,
        master_password: &str,
        path: &Path,
        config: Config,
        key_store: &dyn KeyStore,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        let guard = OpenGuard::acquire(user)?;
        if !path.exists() {
            return Err(VaultError::NotFound(format!(
                "vault file {}",
                path.display()
            )));
        }
        let document = VaultDocument::from_json(&fs::read(path)?)?;
        if document.user != user {
            return Err(VaultError::InvalidRequest(format!(
                "vault belongs to {:?}, not {user:?}",
                document.user
            )));
        }

        let device_secret = Zeroizing::new(
            key_store
                .get(user)?
                .ok_or_else(|| VaultError::NotFound(format!("device secret for {user}")))?,
        );
        let salt = BASE64.decode(&document.salt)?;
        let key = derive_vault_key(master_password, &device_secret, &salt, config.pbkdf2_iterations)?;
        let cipher = Aes256Gcm::new(key.as_bytes());

        let envelope = document.verification_envelope()?;
        let plaintext = envelope
            .open(&cipher)
            .map_err(|_| VaultError::WrongPassword)?;
        let digest = entries_digest(&document.vault.passwords)?;
        if plaintext.len() != digest.len() || digest.ct_eq(&plaintext).unwrap_u8() != 1 {
            return Err(VaultError::WrongPassword);
        }

        tracing::debug!(user, version = document.version, "vault opened");
        Ok(Self {
            document,
            key,
            cipher,
            device_secret,
            path: path.to_path_buf(),
            config,
            _guard: guard,
        })
    }

    pub fn document(&self) -> &VaultDocument {
        &self.document
    }

    pub fn user(&self) -> &str {
        &self.document.user
    }

    pub fn version(&self) -> u64 {
        self.document.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.document.updated_at
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Key access for the sync layer's transport envelopes.
    pub fn vault_key(&self) -> &VaultKey {
        &self.key
    }

    /// Decrypt all entries, in stored (id-insertion) order.
    pub fn list(&self) -> Result<Vec<DecryptedEntry>, VaultError> {
        self.document
            .vault
            .passwords
            .iter()
            .map(|record| self.decrypt_record(record))
            .collect()
    }

    fn decrypt_record(&self, record: &PasswordRecord) -> Result<DecryptedEntry, VaultError> {
        let username = self.open_utf8(&record.data.username_envelope()?)?;
        let password = self.open_utf8(&record.data.password_envelope()?)?;
        Ok(DecryptedEntry {
            id: record.password_id,
            site: record.metadata.site.clone(),
            category: record.metadata.category.clone(),
            note: record.metadata.note.clone(),
            favorite: record.metadata.favorite,
            username,
            password,
            created: record.metadata.created,
            updated: record.metadata.updated,
        })
    }

    fn open_utf8(&self, envelope: &Envelope) -> Result<Zeroizing<String>, VaultError> {
        let bytes = envelope.open(&self.cipher)?;
        String::from_utf8(bytes)
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Internal("entry payload is not UTF-8".to_string()))
    }

    /// Append an entry. Returns the assigned id: max existing id + 1, or 0
    /// for the first entry.
    pub fn add(
        &mut self,
        site: &str,
        username: &str,
        password: &str,
        note: &str,
        category: &str,
        favorite: bool,
    ) -> Result<u64, VaultError> {
        let id = self
            .document
            .vault
            .passwords
            .iter()
            .map(|r| r.password_id)
            .max()
            .map_or(0, |m| m + 1);
        let now = Utc::now();
        let username_env = Envelope::seal(&self.cipher, username.as_bytes())?;
        let password_env = Envelope::seal(&self.cipher, password.as_bytes())?;
        self.document.vault.passwords.push(PasswordRecord {
            password_id: id,
            metadata: RecordMetadata {
                site: site.to_string(),
                category: category.to_string(),
                note: note.to_string(),
                favorite,
                created: now,
                updated: now,
            },
            data: RecordData::from_envelopes(&username_env, &password_env),
        });
        self.finish_mutation()?;
        tracing::debug!(user = %self.document.user, id, "entry added");
        Ok(id)
    }

    /// Replace the provided fields of the entry with the given id. Secret
    /// fields are re-encrypted under fresh nonces.
    pub fn edit(&mut self, id: u64, update: EntryUpdate) -> Result<(), VaultError> {
        let username_env = match &update.username {
            Some(value) => Some(Envelope::seal(&self.cipher, value.as_bytes())?),
            None => None,
        };
        let password_env = match &update.password {
            Some(value) => Some(Envelope::seal(&self.cipher, value.as_bytes())?),
            None => None,
        };

        let record = self
            .document
            .vault
            .passwords
            .iter_mut()
            .find(|r| r.password_id == id)
            .ok_or_else(|| VaultError::NotFound(format!("entry {id}")))?;

        if let Some(site) = update.site {
            record.metadata.site = site;
        }
        if let Some(category) = update.category {
            record.metadata.category = category;
        }
        if let Some(note) = update.note {
            record.metadata.note = note;
        }
        if let Some(favorite) = update.favorite {
            record.metadata.favorite = favorite;
        }
        if let Some(envelope) = username_env {
            record.data.set_username(&envelope);
        }
        if let Some(envelope) = password_env {
            record.data.set_password(&envelope);
        }
        record.metadata.updated = Utc::now();

        self.finish_mutation()?;
        tracing::debug!(user = %self.document.user, id, "entry edited");
        Ok(())
    }

    /// Remove the entry whose id matches. Matching is by id equality, never
    /// by list position.
    pub fn remove(&mut self, id: u64) -> Result<(), VaultError> {
        let position = self
            .document
            .vault
            .passwords
            .iter()
            .position(|r| r.password_id == id)
            .ok_or_else(|| VaultError::NotFound(format!("entry {id}")))?;
        self.document.vault.passwords.remove(position);
        self.finish_mutation()?;
        tracing::debug!(user = %self.document.user, id, "entry removed");
        Ok(())
    }

    /// Rekey the vault: verify the current password by trial decryption,
    /// generate a new salt (the device secret is retained), re-encrypt every
    /// entry under the new key with fresh nonces, and persist atomically.
    /// Until the rename succeeds nothing in memory or on disk changes.
    pub fn change_master_password(
        &mut self,
        current: &str,
        new: &str,
    ) -> Result<(), VaultError> {
        let current_salt = BASE64.decode(&self.document.salt)?;
        let current_key = derive_vault_key(
            current,
            &self.device_secret,
            &current_salt,
            self.config.pbkdf2_iterations,
        )?;
        let current_cipher = Aes256Gcm::new(current_key.as_bytes());
        self.document
            .verification_envelope()?
            .open(&current_cipher)
            .map_err(|_| VaultError::WrongPassword)?;

        let decrypted: Vec<(u64, RecordMetadata, Zeroizing<String>, Zeroizing<String>)> = self
            .document
            .vault
            .passwords
            .iter()
            .map(|record| {
                Ok((
                    record.password_id,
                    record.metadata.clone(),
                    self.open_utf8(&record.data.username_envelope()?)?,
                    self.open_utf8(&record.data.password_envelope()?)?,
                ))
            })
            .collect::<Result<_, VaultError>>()?;

        let new_salt = generate_salt();
        let new_key = derive_vault_key(
            new,
            &self.device_secret,
            &new_salt,
            self.config.pbkdf2_iterations,
        )?;
        let new_cipher = Aes256Gcm::new(new_key.as_bytes());

        let mut staged = self.document.clone();
        staged.salt = BASE64.encode(new_salt);
        staged.version += 1;
        staged.updated_at = Utc::now();
        staged.vault.passwords = decrypted
            .iter()
            .map(|(id, metadata, username, password)| {
                Ok(PasswordRecord {
                    password_id: *id,
                    metadata: metadata.clone(),
                    data: RecordData::from_envelopes(
                        &Envelope::seal(&new_cipher, username.as_bytes())?,
                        &Envelope::seal(&new_cipher, password.as_bytes())?,
                    ),
                })
            })
            .collect::<Result<_, VaultError>>()?;
        let digest = entries_digest(&staged.vault.passwords)?;
        staged.set_verification_envelope(&Envelope::seal(&new_cipher, &digest)?);

        persist_document(&self.path, &staged)?;
        self.document = staged;
        self.key = new_key;
        self.cipher = new_cipher;
        tracing::debug!(user = %self.document.user, "master password changed");
        Ok(())
    }

    /// Adopt a downloaded state: replace entries, copy the remote salt and
    /// timestamps, re-seal the verification token, persist. The version is
    /// not bumped; this save reflects no local mutation.
    pub fn apply_remote(
        &mut self,
        passwords: Vec<PasswordRecord>,
        salt: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.document.vault.passwords = passwords;
        self.document.salt = salt;
        self.document.created_at = created_at;
        self.document.updated_at = updated_at;
        self.reseal_verification()?;
        self.persist()
    }

    fn finish_mutation(&mut self) -> Result<(), VaultError> {
        self.document.version += 1;
        self.document.updated_at = Utc::now();
        self.reseal_verification()?;
        self.persist()
    }

    fn reseal_verification(&mut self) -> Result<(), VaultError> {
        let digest = entries_digest(&self.document.vault.passwords)?;
        let envelope = Envelope::seal(&self.cipher, &digest)?;
        self.document.set_verification_envelope(&envelope);
        Ok(())
    }

    fn persist(&self) -> Result<(), VaultError> {
        persist_document(&self.path, &self.document)
    }
}

/// Write-to-temp-then-rename. An error before the rename leaves the
/// previous file untouched.
fn persist_document(path: &Path, document: &VaultDocument) -> Result<(), VaultError> {
    let bytes = document.to_json()?;
    let staging = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&staging)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeyStore;
    use tempfile::tempdir;

    fn test_config() -> Config {
        Config {
            pbkdf2_iterations: lk_crypto::MIN_PBKDF2_ITERATIONS,
            ..Config::default()
        }
    }

    #[test]
    fn create_close_reopen_lists_entries_in_id_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alice.vault");
        let store = MemoryKeyStore::new();

        let mut vault =
            VaultEngine::create("alice", "correct horse", &path, test_config(), &store).unwrap();
        assert_eq!(vault.version(), 1);
        vault.add("github.com", "me@x", "p@ss-1", "", "dev", false).unwrap();
        vault.add("bank", "acct", "$ecret", "", "finance", true).unwrap();
        drop(vault);

        let vault =
            VaultEngine::open("alice", "correct horse", &path, test_config(), &store).unwrap();
        let entries = vault.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 0);
        assert_eq!(entries[0].site, "github.com");
        assert_eq!(&*entries[0].username, "me@x");
        assert_eq!(&*entries[0].password, "p@ss-1");
        assert_eq!(entries[1].id, 1);
        assert_eq!(entries[1].site, "bank");
        assert_eq!(&*entries[1].password, "$ecret");
        assert!(entries[1].favorite);
    }

    #[test]
    fn wrong_password_rejected_without_touching_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bob.vault");
        let store = MemoryKeyStore::new();

        let mut vault = VaultEngine::create("bob", "right", &path, test_config(), &store).unwrap();
        vault.add("site", "user", "pw", "", "", false).unwrap();
        drop(vault);

        let before = fs::read(&path).unwrap();
        let err = VaultEngine::open("bob", "wrong", &path, test_config(), &store).unwrap_err();
        assert!(matches!(err, VaultError::WrongPassword));
        assert_eq!(fs::read(&path).unwrap(), before);

        VaultEngine::open("bob", "right", &path, test_config(), &store).unwrap();
    }

    #[test]
    fn missing_device_secret_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("carol.vault");
        let store = MemoryKeyStore::new();
        drop(VaultEngine::create("carol", "pw", &path, test_config(), &store).unwrap());

        // A new device without the secret cannot open the vault.
        let fresh_store = MemoryKeyStore::new();
        let err =
            VaultEngine::open("carol", "pw", &path, test_config(), &fresh_store).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn edit_changes_only_requested_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dave.vault");
        let store = MemoryKeyStore::new();
        let mut vault = VaultEngine::create("dave", "pw", &path, test_config(), &store).unwrap();
        let id = vault.add("example.org", "old-user", "old-pass", "note", "misc", false).unwrap();

        let before = vault.document().vault.passwords[0].clone();
        vault
            .edit(
                id,
                EntryUpdate {
                    password: Some("new-pass".into()),
                    favorite: Some(true),
                    ..EntryUpdate::default()
                },
            )
            .unwrap();

        let after = &vault.document().vault.passwords[0];
        // Untouched fields survive, including the username envelope.
        assert_eq!(after.metadata.site, "example.org");
        assert_eq!(after.metadata.note, "note");
        assert_eq!(after.data.username, before.data.username);
        assert_eq!(after.data.username_iv, before.data.username_iv);
        // The rewritten password envelope gets a fresh nonce.
        assert_ne!(after.data.password_iv, before.data.password_iv);
        assert!(after.metadata.favorite);
        assert!(after.metadata.updated >= before.metadata.updated);

        let entries = vault.list().unwrap();
        assert_eq!(&*entries[0].username, "old-user");
        assert_eq!(&*entries[0].password, "new-pass");

        assert!(matches!(
            vault.edit(99, EntryUpdate::default()),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn remove_matches_id_not_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("erin.vault");
        let store = MemoryKeyStore::new();
        let mut vault = VaultEngine::create("erin", "pw", &path, test_config(), &store).unwrap();
        vault.add("a", "u", "p", "", "", false).unwrap();
        vault.add("b", "u", "p", "", "", false).unwrap();
        vault.add("c", "u", "p", "", "", false).unwrap();

        vault.remove(1).unwrap();
        let ids: Vec<u64> = vault.list().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 2]);

        // Entry 2 now sits at index 1; removing id 2 must still find it.
        vault.remove(2).unwrap();
        let ids: Vec<u64> = vault.list().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0]);

        // Next id continues above the highest ever assigned.
        let id = vault.add("d", "u", "p", "", "", false).unwrap();
        assert_eq!(id, 1);

        assert!(matches!(vault.remove(42), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn version_and_updated_at_advance_on_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frank.vault");
        let store = MemoryKeyStore::new();
        let mut vault = VaultEngine::create("frank", "pw", &path, test_config(), &store).unwrap();
        let (v0, t0) = (vault.version(), vault.updated_at());
        vault.add("s", "u", "p", "", "", false).unwrap();
        assert_eq!(vault.version(), v0 + 1);
        assert!(vault.updated_at() >= t0);
        vault.remove(0).unwrap();
        assert_eq!(vault.version(), v0 + 2);
    }

    #[test]
    fn change_master_password_rolls_every_envelope() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grace.vault");
        let store = MemoryKeyStore::new();
        let mut vault = VaultEngine::create("grace", "old-mp", &path, test_config(), &store).unwrap();
        vault.add("site", "user", "secret", "", "", false).unwrap();
        let old_salt = vault.document().salt.clone();
        let old_iv = vault.document().vault.passwords[0].data.password_iv.clone();

        assert!(matches!(
            vault.change_master_password("not-the-password", "new-mp"),
            Err(VaultError::WrongPassword)
        ));

        vault.change_master_password("old-mp", "new-mp").unwrap();
        assert_ne!(vault.document().salt, old_salt);
        assert_ne!(vault.document().vault.passwords[0].data.password_iv, old_iv);
        let entries = vault.list().unwrap();
        assert_eq!(&*entries[0].password, "secret");
        drop(vault);

        assert!(matches!(
            VaultEngine::open("grace", "old-mp", &path, test_config(), &store),
            Err(VaultError::WrongPassword)
        ));
        let vault = VaultEngine::open("grace", "new-mp", &path, test_config(), &store).unwrap();
        assert_eq!(&*vault.list().unwrap()[0].username, "user");
    }

    #[test]
    fn concurrent_open_of_same_user_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("henry.vault");
        let store = MemoryKeyStore::new();
        let vault = VaultEngine::create("henry", "pw", &path, test_config(), &store).unwrap();

        let err = VaultEngine::open("henry", "pw", &path, test_config(), &store).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyOpen(_)));

        drop(vault);
        VaultEngine::open("henry", "pw", &path, test_config(), &store).unwrap();
    }

    #[test]
    fn tampered_entries_fail_open_as_wrong_password() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iris.vault");
        let store = MemoryKeyStore::new();
        let mut vault = VaultEngine::create("iris", "pw", &path, test_config(), &store).unwrap();
        vault.add("site", "user", "pw1", "", "", false).unwrap();
        drop(vault);

        let mut document =
            VaultDocument::from_json(&fs::read(&path).unwrap()).unwrap();
        document.vault.passwords[0].metadata.site = "evil.example".into();
        fs::write(&path, document.to_json().unwrap()).unwrap();

        let err = VaultEngine::open("iris", "pw", &path, test_config(), &store).unwrap_err();
        assert!(matches!(err, VaultError::WrongPassword));
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("judy.vault");
        let store = MemoryKeyStore::new();
        drop(VaultEngine::create("judy", "pw", &path, test_config(), &store).unwrap());
        assert!(matches!(
            VaultEngine::create("judy", "pw", &path, test_config(), &store),
            Err(VaultError::InvalidRequest(_))
        ));
    }
}
