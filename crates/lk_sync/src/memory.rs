//! In-process sync server.
//!
//! Implements the full transport contract against process-local state:
//! SRP records, one transient login session per username (a new
//! `/login/init` replaces the previous one; verify consumes the session
//! whatever the outcome), bearer tokens, and a single stored vault document
//! per user. The server half of every scenario test runs on this; it stores
//! exactly what a real server would store, and nothing derived from the
//! password itself.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;

use lk_srp::{SrpError, SrpRecord, SrpSession};

use crate::api::{
    CredentialUpdateRequest, LoginInitRequest, LoginInitResponse, LoginVerifyRequest,
    LoginVerifyResponse, RegisterRequest, RemoteVault, StoreVaultResponse,
};
use crate::error::SyncError;
use crate::transport::SyncTransport;

#[derive(Default)]
struct ServerState {
    records: HashMap<String, SrpRecord>,
    sessions: HashMap<String, SrpSession>,
    /// token -> username
    tokens: HashMap<String, String>,
    vaults: HashMap<String, RemoteVault>,
}

#[derive(Default)]
pub struct MemoryServer {
    state: Mutex<ServerState>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn authorize(&self, token: &str) -> Result<String, SyncError> {
        self.state
            .lock()
            .tokens
            .get(token)
            .cloned()
            .ok_or(SyncError::AuthFail)
    }

    // ── Test and inspection hooks ────────────────────────────────────────────

    pub fn stored_record(&self, username: &str) -> Option<SrpRecord> {
        self.state.lock().records.get(username).cloned()
    }

    pub fn stored_vault(&self, username: &str) -> Option<RemoteVault> {
        self.state.lock().vaults.get(username).cloned()
    }

    /// Mutate the stored vault in place; simulates tampering in transit or
    /// at rest.
    pub fn tamper_vault(&self, username: &str, mutate: impl FnOnce(&mut RemoteVault)) {
        if let Some(vault) = self.state.lock().vaults.get_mut(username) {
            mutate(vault);
        }
    }

    /// Replace the stored vault wholesale.
    pub fn put_vault(&self, username: &str, vault: RemoteVault) {
        self.state.lock().vaults.insert(username.to_string(), vault);
    }

    /// Everything the server persists for a user, serialized. Used to prove
    /// zero-knowledge: no stored field may contain password material.
    pub fn stored_text(&self, username: &str) -> String {
        let state = self.state.lock();
        let record = state
            .records
            .get(username)
            .map(|r| format!("{} {} {}", r.username, r.salt, r.verifier))
            .unwrap_or_default();
        let vault = state
            .vaults
            .get(username)
            .map(|v| serde_json::to_string(v).expect("remote vault serializes"))
            .unwrap_or_default();
        format!("{record}\n{vault}")
    }
}

fn fresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl SyncTransport for MemoryServer {
    async fn register(&self, request: &RegisterRequest) -> Result<(), SyncError> {
        let record = SrpRecord::new(&request.username, &request.salt, &request.verifier)?;
        let mut state = self.state.lock();
        if state.records.contains_key(&request.username) {
            return Err(SyncError::Server(format!(
                "user {} already registered",
                request.username
            )));
        }
        state.records.insert(request.username.clone(), record);
        Ok(())
    }

    async fn login_init(&self, request: &LoginInitRequest) -> Result<LoginInitResponse, SyncError> {
        let mut state = self.state.lock();
        let record = state
            .records
            .get(&request.username)
            .ok_or(SyncError::NotFound)?;
        let session = SrpSession::begin(record)?;
        let response = LoginInitResponse {
            salt: record.salt.clone(),
            server_public: session.public_hex(),
        };
        // Only the most recent init is honored.
        state.sessions.insert(request.username.clone(), session);
        Ok(response)
    }

    async fn login_verify(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, SyncError> {
        // The session is consumed on success AND failure.
        let session = self
            .state
            .lock()
            .sessions
            .remove(&request.username)
            .ok_or(SyncError::AuthFail)?;
        let outcome = session
            .verify(&request.client_public, &request.client_proof)
            .map_err(|e| match e {
                SrpError::InvalidProof => SyncError::AuthFail,
                other => SyncError::Srp(other),
            })?;

        let token = fresh_token();
        self.state
            .lock()
            .tokens
            .insert(token.clone(), request.username.clone());
        Ok(LoginVerifyResponse {
            server_proof: outcome.proof,
            token,
        })
    }

    async fn fetch_vault(&self, token: &str) -> Result<Option<RemoteVault>, SyncError> {
        let username = self.authorize(token)?;
        Ok(self.state.lock().vaults.get(&username).cloned())
    }

    async fn store_vault(
        &self,
        token: &str,
        vault: &RemoteVault,
    ) -> Result<StoreVaultResponse, SyncError> {
        let username = self.authorize(token)?;
        self.state.lock().vaults.insert(username, vault.clone());
        Ok(StoreVaultResponse {
            success: true,
            timestamp: Utc::now(),
        })
    }

    async fn update_credentials(
        &self,
        token: &str,
        request: &CredentialUpdateRequest,
    ) -> Result<(), SyncError> {
        let username = self.authorize(token)?;
        let record = SrpRecord::new(&username, &request.salt, &request.verifier)?;
        self.state.lock().records.insert(username, record);
        Ok(())
    }
}
