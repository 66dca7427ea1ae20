//! The session facade: one engine, one transport, one optional token.
//!
//! Mutations complete local persistence before any network traffic; sync is
//! a separately observable outcome (`SyncStatus`), never a reason to fail a
//! durable local write. Reconciliation is strict last-writer-wins on
//! `updatedAt` with no merging and no clock-skew compensation.

use lk_srp::client::{self, ClientEphemeral};
use lk_vault::{DecryptedEntry, EntryUpdate, VaultEngine};

use crate::api::{
    CredentialUpdateRequest, LoginInitRequest, LoginVerifyRequest, RegisterRequest,
};
use crate::envelope::{build_remote_vault, open_remote_vault};
use crate::error::SyncError;
use crate::transport::SyncTransport;

/// Outcome of the sync step attached to a successful mutation.
#[derive(Debug)]
pub enum SyncStatus {
    Synced,
    /// No bearer token held; sync is a no-op.
    NoToken,
    /// The local mutation is durable; only the sync step failed.
    Failed(SyncError),
}

pub struct Session<T: SyncTransport> {
    engine: VaultEngine,
    transport: T,
    token: Option<String>,
}

impl<T: SyncTransport> Session<T> {
    pub fn new(engine: VaultEngine, transport: T) -> Self {
        Self {
            engine,
            transport,
            token: None,
        }
    }

    pub fn engine(&self) -> &VaultEngine {
        &self.engine
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    /// Create the account on the server: SRP salt and verifier only.
    pub async fn register_account(&mut self, master_password: &str) -> Result<(), SyncError> {
        let registration = client::generate_registration(master_password);
        self.transport
            .register(&RegisterRequest {
                username: self.engine.user().to_string(),
                salt: registration.salt,
                verifier: registration.verifier,
            })
            .await?;
        tracing::debug!(user = %self.engine.user(), "account registered");
        Ok(())
    }

    /// Full SRP login. The client verifies the server's M2 before holding
    /// the bearer token; a mismatched proof leaves the session logged out.
    pub async fn login(&mut self, master_password: &str) -> Result<(), SyncError> {
        let username = self.engine.user().to_string();
        let ephemeral = ClientEphemeral::generate();
        let init = self
            .transport
            .login_init(&LoginInitRequest {
                username: username.clone(),
                client_public: ephemeral.public_hex(),
            })
            .await?;

        let session = client::compute_session(
            &init.salt,
            &username,
            master_password,
            ephemeral,
            &init.server_public,
        )?;

        let verify = self
            .transport
            .login_verify(&LoginVerifyRequest {
                username: username.clone(),
                client_public: session.public_hex.clone(),
                client_proof: session.proof.clone(),
            })
            .await?;

        session
            .verify_server_proof(&verify.server_proof)
            .map_err(|_| SyncError::AuthFail)?;

        self.token = Some(verify.token);
        tracing::debug!(user = %username, "login complete");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<DecryptedEntry>, SyncError> {
        Ok(self.engine.list()?)
    }

    /// Add an entry; local persistence first, then sync.
    pub async fn add(
        &mut self,
        site: &str,
        username: &str,
        password: &str,
        note: &str,
        category: &str,
        favorite: bool,
    ) -> Result<(u64, SyncStatus), SyncError> {
        let id = self
            .engine
            .add(site, username, password, note, category, favorite)?;
        Ok((id, self.sync().await))
    }

    pub async fn edit(&mut self, id: u64, update: EntryUpdate) -> Result<SyncStatus, SyncError> {
        self.engine.edit(id, update)?;
        Ok(self.sync().await)
    }

    pub async fn remove(&mut self, id: u64) -> Result<SyncStatus, SyncError> {
        self.engine.remove(id)?;
        Ok(self.sync().await)
    }

    /// Rekey locally first; the server's SRP credentials are replaced last,
    /// so a failed push leaves a vault that still opens with the new
    /// password while the old credentials stay on the server.
    pub async fn change_master_password(
        &mut self,
        current: &str,
        new: &str,
    ) -> Result<SyncStatus, SyncError> {
        self.engine.change_master_password(current, new)?;

        if let Some(token) = self.token.clone() {
            let registration = client::generate_registration(new);
            if let Err(error) = self
                .transport
                .update_credentials(
                    &token,
                    &CredentialUpdateRequest {
                        salt: registration.salt,
                        verifier: registration.verifier,
                    },
                )
                .await
            {
                tracing::warn!(error = %error, "credential update failed; vault rekeyed locally");
                return Ok(SyncStatus::Failed(error));
            }
        }

        Ok(self.sync().await)
    }

    /// The reconciler. No token: no-op. No remote vault: push. Otherwise
    /// strict last-writer-wins on `updatedAt`.
    pub async fn sync(&mut self) -> SyncStatus {
        let Some(token) = self.token.clone() else {
            return SyncStatus::NoToken;
        };
        match self.reconcile(&token).await {
            Ok(()) => SyncStatus::Synced,
            Err(error) => {
                tracing::warn!(user = %self.engine.user(), error = %error, "sync failed");
                SyncStatus::Failed(error)
            }
        }
    }

    async fn reconcile(&mut self, token: &str) -> Result<(), SyncError> {
        let remote = match self.transport.fetch_vault(token).await? {
            None => return self.push(token).await,
            Some(remote) => remote,
        };

        let local_updated = self.engine.updated_at();
        if remote.updated_at > local_updated {
            // Download path: integrity first, then adopt remote state
            // wholesale. The version is not bumped.
            let records = open_remote_vault(&remote, self.engine.vault_key())?;
            self.engine.apply_remote(
                records,
                remote.salt.clone(),
                remote.created_at,
                remote.updated_at,
            )?;
            tracing::debug!(user = %self.engine.user(), "pulled newer remote vault");
        } else if remote.updated_at < local_updated {
            self.push(token).await?;
        }
        Ok(())
    }

    async fn push(&mut self, token: &str) -> Result<(), SyncError> {
        let remote = build_remote_vault(self.engine.document(), self.engine.vault_key())?;
        let receipt = self.transport.store_vault(token, &remote).await?;
        // The echoed timestamp is informational only.
        tracing::debug!(user = %self.engine.user(), server_time = %receipt.timestamp, "pushed local vault");
        Ok(())
    }
}
