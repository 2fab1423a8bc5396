// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential directory client.
//!
//! The directory is the external service that knows which Verifiable
//! Credentials a wallet holds and whether the wallet is a registered
//! guardian. It is strictly advisory for authentication: every call degrades
//! to "no data" on failure rather than aborting a login.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Guardian registration data as returned by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuardianInfo {
    pub guardian_id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_email_verified: bool,
    pub is_on_chain_registered: bool,
}

/// A credential record held by a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VcRecord {
    /// The compact credential token embedded into presentations.
    pub vc_jwt: String,
    pub vc_type: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Request(String),
    #[error("directory response was malformed: {0}")]
    Decode(String),
}

/// Read access to the credential directory.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// All credentials held by `address`.
    async fn vcs_by_wallet(&self, address: &str) -> Result<Vec<VcRecord>, DirectoryError>;

    /// Guardian registration for `address`, `None` when not registered.
    async fn guardian_info(&self, address: &str) -> Result<Option<GuardianInfo>, DirectoryError>;
}

/// HTTP client against the real directory service.
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct VcsResponse {
    #[serde(default)]
    vcs: Vec<VcRecord>,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CredentialDirectory for HttpDirectory {
    async fn vcs_by_wallet(&self, address: &str) -> Result<Vec<VcRecord>, DirectoryError> {
        let url = format!("{}/vc/wallet/{address}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        let body: VcsResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))?;
        Ok(body.vcs)
    }

    async fn guardian_info(&self, address: &str) -> Result<Option<GuardianInfo>, DirectoryError> {
        let url = format!("{}/guardian/{address}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        let info: GuardianInfo = response
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))?;
        Ok(Some(info))
    }
}

/// Fixed directory contents for development mode and tests.
#[derive(Default)]
pub struct StaticDirectory {
    vcs: std::collections::HashMap<String, Vec<VcRecord>>,
    guardians: std::collections::HashMap<String, GuardianInfo>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vcs(mut self, address: &str, vcs: Vec<VcRecord>) -> Self {
        self.vcs.insert(address.to_lowercase(), vcs);
        self
    }

    pub fn with_guardian(mut self, address: &str, info: GuardianInfo) -> Self {
        self.guardians.insert(address.to_lowercase(), info);
        self
    }
}

#[async_trait]
impl CredentialDirectory for StaticDirectory {
    async fn vcs_by_wallet(&self, address: &str) -> Result<Vec<VcRecord>, DirectoryError> {
        Ok(self
            .vcs
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn guardian_info(&self, address: &str) -> Result<Option<GuardianInfo>, DirectoryError> {
        Ok(self.guardians.get(&address.to_lowercase()).cloned())
    }
}
