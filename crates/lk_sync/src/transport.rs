//! The sync transport capability and its HTTP implementation.
//!
//! Every call carries a bounded timeout; a timeout or connection failure is
//! `SyncError::Network` and never mutates local state. Status mapping is
//! fixed: 401 is `AuthFail`, 404 is `NotFound`, anything else non-2xx is
//! `Server` with the body's `{error}` message when present.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use lk_vault::Config;

use crate::api::{
    AckResponse, CredentialUpdateRequest, LoginInitRequest, LoginInitResponse, LoginVerifyRequest,
    LoginVerifyResponse, RegisterRequest, RemoteVault, StoreVaultResponse,
};
use crate::error::SyncError;

#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<(), SyncError>;
    async fn login_init(&self, request: &LoginInitRequest) -> Result<LoginInitResponse, SyncError>;
    async fn login_verify(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, SyncError>;
    /// `None` when the server has no vault yet (404).
    async fn fetch_vault(&self, token: &str) -> Result<Option<RemoteVault>, SyncError>;
    async fn store_vault(
        &self,
        token: &str,
        vault: &RemoteVault,
    ) -> Result<StoreVaultResponse, SyncError>;
    async fn update_credentials(
        &self,
        token: &str,
        request: &CredentialUpdateRequest,
    ) -> Result<(), SyncError>;
}

#[async_trait]
impl<T: SyncTransport + ?Sized> SyncTransport for std::sync::Arc<T> {
    async fn register(&self, request: &RegisterRequest) -> Result<(), SyncError> {
        (**self).register(request).await
    }

    async fn login_init(&self, request: &LoginInitRequest) -> Result<LoginInitResponse, SyncError> {
        (**self).login_init(request).await
    }

    async fn login_verify(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, SyncError> {
        (**self).login_verify(request).await
    }

    async fn fetch_vault(&self, token: &str) -> Result<Option<RemoteVault>, SyncError> {
        (**self).fetch_vault(token).await
    }

    async fn store_vault(
        &self,
        token: &str,
        vault: &RemoteVault,
    ) -> Result<StoreVaultResponse, SyncError> {
        (**self).store_vault(token, vault).await
    }

    async fn update_credentials(
        &self,
        token: &str,
        request: &CredentialUpdateRequest,
    ) -> Result<(), SyncError> {
        (**self).update_credentials(token, request).await
    }
}

/// REST client for the sync service.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Self::new(
            &config.sync_base_url,
            Duration::from_millis(config.sync_timeout_ms),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a non-2xx response onto the error taxonomy.
    async fn reject(response: reqwest::Response) -> SyncError {
        let status = response.status();
        let message = response
            .json::<crate::api::ErrorResponse>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        match status {
            StatusCode::UNAUTHORIZED => SyncError::AuthFail,
            StatusCode::NOT_FOUND => SyncError::NotFound,
            _ => SyncError::Server(message),
        }
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn register(&self, request: &RegisterRequest) -> Result<(), SyncError> {
        let response = self
            .client
            .post(self.url("/register"))
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        let ack: AckResponse = response.json().await?;
        if !ack.success {
            return Err(SyncError::InvalidResponse("register not acknowledged".into()));
        }
        Ok(())
    }

    async fn login_init(&self, request: &LoginInitRequest) -> Result<LoginInitResponse, SyncError> {
        let response = self
            .client
            .post(self.url("/login/init"))
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(response.json().await?)
    }

    async fn login_verify(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, SyncError> {
        let response = self
            .client
            .post(self.url("/login/verify"))
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(response.json().await?)
    }

    async fn fetch_vault(&self, token: &str) -> Result<Option<RemoteVault>, SyncError> {
        let response = self
            .client
            .get(self.url("/vault"))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(Some(response.json().await?))
    }

    async fn store_vault(
        &self,
        token: &str,
        vault: &RemoteVault,
    ) -> Result<StoreVaultResponse, SyncError> {
        let response = self
            .client
            .post(self.url("/vault"))
            .bearer_auth(token)
            .json(vault)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(response.json().await?)
    }

    async fn update_credentials(
        &self,
        token: &str,
        request: &CredentialUpdateRequest,
    ) -> Result<(), SyncError> {
        let response = self
            .client
            .post(self.url("/password"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }
}
