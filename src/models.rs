// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the authentication REST surface. All
//! types derive `Serialize`, `Deserialize`, and `ToSchema` for JSON handling
//! and OpenAPI documentation. Field names are camelCase on the wire.
//!
//! ## Wallet Address Type
//!
//! The [`WalletAddress`] newtype wraps Ethereum-style addresses. The system
//! stores addresses canonically lowercase; [`WalletAddress::parse`] rejects
//! anything else at the API boundary instead of silently fixing it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::directory::GuardianInfo;

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Ethereum-compatible wallet address wrapper.
///
/// Format: `0x` followed by 40 lowercase hexadecimal characters (20 bytes).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    /// Validate an incoming address.
    ///
    /// Mixed-case input is rejected, not lowercased: the canonical form is
    /// the client's responsibility and a mismatch elsewhere in the system
    /// would otherwise surface as a confusing signature failure.
    pub fn parse(value: &str) -> Result<Self, String> {
        let hex_part = value
            .strip_prefix("0x")
            .ok_or_else(|| "wallet address must start with 0x".to_string())?;
        if hex_part.len() != 40 {
            return Err("wallet address must be 20 bytes (40 hex characters)".to_string());
        }
        if !hex_part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err("wallet address must be lowercase hex".to_string());
        }
        Ok(WalletAddress(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// =============================================================================
// Challenge Models
// =============================================================================

/// Request to start a login (step 1).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Wallet address (must be lowercase).
    pub wallet_address: String,
}

/// Material the wallet must sign to produce a VP alongside the challenge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VpSigningData {
    /// The unsigned VP payload, for display and client-side inspection.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// The exact string to sign, returned unmodified at login as
    /// `vpSignedData`.
    pub signing_input: String,
}

/// Response to a challenge request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub success: bool,
    /// Challenge string to be signed with the wallet.
    pub challenge: String,
    /// VP signing data; `null` when the wallet holds no credentials.
    pub vp_signing_data: Option<VpSigningData>,
    /// Challenge expiration time in seconds.
    pub expires_in: u64,
}

// =============================================================================
// Login Models
// =============================================================================

/// Request to complete a login (step 2).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Wallet address (must be lowercase).
    pub wallet_address: String,
    /// Signature of the challenge message.
    pub signature: String,
    /// Original challenge string from the challenge endpoint.
    pub challenge: String,
    /// VP signature (required for a VP-backed session).
    #[serde(default)]
    pub vp_signature: Option<String>,
    /// The `signingInput` string from the challenge response, unmodified.
    #[serde(default)]
    pub vp_signed_data: Option<String>,
}

/// User profile assembled from the credential directory.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub wallet_address: String,
    pub did: String,
    /// Guardian information (`null` if not registered).
    pub guardian_info: Option<GuardianInfo>,
    /// Number of Verifiable Credentials owned.
    pub vc_count: usize,
}

/// Response to a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    /// JWT access token for API authentication.
    pub access_token: String,
    /// Refresh token to obtain new access tokens.
    pub refresh_token: String,
    /// Verifiable Presentation JWT, or `"EMPTY"` when the session carries none.
    pub vp_jwt: String,
    pub profile: Profile,
}

// =============================================================================
// Refresh / Logout Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response to a refresh. The same refresh token is echoed back; refresh
/// tokens are not rotated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
}

// =============================================================================
// Session / Profile Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: Profile,
}

/// The guard contract object attached to verified requests and connections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub address: String,
    /// Whether the session is vouched for by a verified, holder-matching VP.
    pub vp_verified: bool,
    /// Holder DID of the verified VP, when present.
    pub vp_holder: Option<String>,
    pub vc_count: Option<usize>,
}
