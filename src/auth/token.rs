// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access and refresh token issuance and validation.
//!
//! Tokens are HS256 JWTs signed with a secret injected through configuration.
//! Issuing an access token also records it as the address's current token
//! and adds it to the `sessions:` index so bulk revocation can find it.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{keys, SessionStore, StoreError};

/// Access tokens live for 24 hours.
pub const ACCESS_TTL: Duration = Duration::from_secs(86_400);
/// Refresh tokens live for 7 days.
pub const REFRESH_TTL: Duration = Duration::from_secs(604_800);

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Token discriminant carried in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub address: String,
    pub is_guardian: bool,
    pub vc_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique token id. Two logins in the same second must still produce
    /// distinct tokens, or revoking one session would revoke both.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    /// Seconds until expiry, clamped to at least one so a freshly expired
    /// token still gets a short-lived revocation marker.
    pub fn remaining_ttl(&self) -> Duration {
        let remaining = self.exp - chrono::Utc::now().timestamp();
        Duration::from_secs(remaining.max(1) as u64)
    }
}

/// Claims of a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Mints and validates the gateway's own bearer tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    store: Arc<dyn SessionStore>,
}

impl TokenIssuer {
    pub fn new(secret: &str, store: Arc<dyn SessionStore>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            store,
        }
    }

    /// Issue an access token and record it as the address's current token.
    pub async fn issue_access(
        &self,
        address: &str,
        is_guardian: bool,
        vc_count: usize,
        role: Option<String>,
    ) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            address: address.to_string(),
            is_guardian,
            vc_count,
            role,
            kind: TokenKind::Access,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ACCESS_TTL.as_secs() as i64,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        self.store
            .set(&keys::current_token(address), &token, Some(ACCESS_TTL))
            .await?;
        self.store
            .set_add(&keys::sessions(address), &token)
            .await?;

        Ok(token)
    }

    /// Issue a refresh token, stored server-side keyed by address.
    pub async fn issue_refresh(&self, address: &str) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = RefreshClaims {
            address: address.to_string(),
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + REFRESH_TTL.as_secs() as i64,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        self.store
            .set(&keys::refresh(address), &token, Some(REFRESH_TTL))
            .await?;

        Ok(token)
    }

    /// Validate an access token's signature, expiry, and discriminant.
    ///
    /// Revocation (the blocked set) is the guard's concern, not this one's.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.decode_claims(token)?;
        if claims.kind != TokenKind::Access {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    /// Validate a refresh token's signature, expiry, and discriminant.
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.decode_claims(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    fn decode_claims<C: serde::de::DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;

        decode::<C>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            })
    }
}
