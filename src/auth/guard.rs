// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity and session guards.
//!
//! One implementation, two transports: the HTTP extractors below and the
//! WebSocket handshake both call the same [`IdentityGuard`] and
//! [`SessionGuard`] methods, so the verification and caching policy cannot
//! drift between them.
//!
//! The identity guard asserts *who is calling* (valid, unrevoked token,
//! matching wallet header). The session guard additionally asserts *whether
//! the session is vouched for by a verified, holder-matching VP*, consulting
//! the in-process mirror, then the durable cache, before re-running any
//! cryptography. A session without a VP passes the guard flagged
//! `vp_verified: false`; downstream policy decides whether that is enough.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};

use crate::state::AppState;
use crate::store::{keys, SessionStore, StoreError, VpVerificationCache, VpVerificationRecord};

use super::error::AuthError;
use super::token::TokenIssuer;
use super::vp::{PresentationVerifier, VpEngine, EMPTY_VP};

/// Header carrying the caller's wallet address, checked against the token.
pub const WALLET_ADDRESS_HEADER: &str = "x-wallet-address";

/// Durable VP-verification cache entries live up to an hour.
const VP_CACHE_TTL: Duration = Duration::from_secs(3_600);

/// Authenticated caller attached to a request or connection.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Lowercase wallet address.
    pub address: String,
    pub is_guardian: bool,
    pub vc_count: usize,
    /// The bearer token, absent under the development-mode bypass.
    pub token: Option<String>,
    /// Token expiry (unix seconds); 0 under the development-mode bypass.
    pub expires_at: i64,
}

/// VP-verification state attached after the session guard ran.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub address: String,
    pub vp_verified: bool,
    /// Holder DID of the verified VP.
    pub vp_holder: Option<String>,
    pub vc_count: Option<usize>,
}

impl SessionContext {
    fn unverified(address: &str) -> Self {
        Self {
            address: address.to_string(),
            vp_verified: false,
            vp_holder: None,
            vc_count: None,
        }
    }

    fn from_record(address: &str, record: &VpVerificationRecord) -> Self {
        Self {
            address: address.to_string(),
            vp_verified: record.verified,
            vp_holder: Some(record.holder.clone()),
            vc_count: Some(record.vc_count),
        }
    }
}

/// Extract the Bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Per-request identity assertion.
pub struct IdentityGuard {
    tokens: Arc<TokenIssuer>,
    store: Arc<dyn SessionStore>,
    /// Development-only header bypass. MUST stay off in production.
    dev_mode: bool,
}

impl IdentityGuard {
    pub fn new(tokens: Arc<TokenIssuer>, store: Arc<dyn SessionStore>, dev_mode: bool) -> Self {
        Self {
            tokens,
            store,
            dev_mode,
        }
    }

    /// Validate a bearer token: cryptographically valid, unexpired, and not
    /// in the blocked set. Shared by both transports.
    pub async fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        if self.store.exists(&keys::blocked(token)).await? {
            return Err(AuthError::TokenBlocked);
        }

        let claims = self.tokens.validate_access(token)?;
        Ok(Identity {
            address: claims.address,
            is_guardian: claims.is_guardian,
            vc_count: claims.vc_count,
            token: Some(token.to_string()),
            expires_at: claims.exp,
        })
    }

    /// Authenticate an HTTP request.
    ///
    /// Production requires a valid token *and* a wallet-address header equal
    /// to the token's address. Development mode takes the header at its
    /// word, with no cryptography at all.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        if self.dev_mode {
            let address = wallet_header(headers)?;
            return Ok(Identity {
                address: address.to_lowercase(),
                is_guardian: false,
                vc_count: 0,
                token: None,
                expires_at: 0,
            });
        }

        let token = bearer_token(headers)?;
        let identity = self.verify_token(token).await?;

        let wallet = wallet_header(headers)?;
        if !wallet.eq_ignore_ascii_case(&identity.address) {
            return Err(AuthError::WalletAddressMismatch);
        }

        Ok(identity)
    }
}

fn wallet_header(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(WALLET_ADDRESS_HEADER)
        .ok_or(AuthError::MissingWalletHeader)?
        .to_str()
        .map_err(|_| AuthError::MissingWalletHeader)
}

/// Per-request VP-verification assertion, applied after the identity guard.
pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn PresentationVerifier>,
    cache: Arc<VpVerificationCache>,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn PresentationVerifier>,
        cache: Arc<VpVerificationCache>,
    ) -> Self {
        Self {
            store,
            verifier,
            cache,
        }
    }

    /// Authorize a token whose identity is already established.
    ///
    /// The fast path (cache hit) runs no cryptography. Failed verifications
    /// are never cached, so a later valid VP for the same token is not
    /// shadowed by a stale negative.
    pub async fn authorize(
        &self,
        token: &str,
        identity: &Identity,
    ) -> Result<SessionContext, AuthError> {
        if self.store.exists(&keys::blocked(token)).await? {
            return Err(AuthError::TokenBlocked);
        }

        let binding = self.store.get(&keys::vp_binding(token)).await?;
        let vp_jwt = match binding {
            Some(vp_jwt) if vp_jwt != EMPTY_VP => vp_jwt,
            // No VP bound: allowed, but the session is not VP-verified.
            _ => return Ok(SessionContext::unverified(&identity.address)),
        };

        if let Some(record) = self.cache.get(token) {
            if record.verified {
                tracing::debug!(address = %identity.address, "VP verification local cache hit");
                return Ok(SessionContext::from_record(&identity.address, &record));
            }
        }

        if let Some(json) = self.store.get(&keys::vp_verification(token)).await? {
            if let Ok(record) = serde_json::from_str::<VpVerificationRecord>(&json) {
                if record.verified {
                    tracing::debug!(address = %identity.address, "VP verification store cache hit");
                    self.cache.put(token, record.clone());
                    return Ok(SessionContext::from_record(&identity.address, &record));
                }
            }
        }

        // Cache miss: full cryptographic verification.
        let verification = self.verifier.verify_vp(&vp_jwt);
        if !verification.verified {
            tracing::warn!(address = %identity.address, error = ?verification.error, "VP verification failed");
            return Err(AuthError::VpVerificationFailed {
                reason: verification
                    .error
                    .unwrap_or_else(|| "presentation did not verify".to_string()),
                details: verification.vcs,
            });
        }

        let holder = verification.holder.unwrap_or_default();
        let holder_address = VpEngine::address_of_did(&holder);
        if !holder_address.eq_ignore_ascii_case(&identity.address) {
            tracing::warn!(
                holder = %holder_address,
                address = %identity.address,
                "VP holder does not match session address"
            );
            return Err(AuthError::HolderMismatch);
        }

        let record = VpVerificationRecord {
            verified: true,
            holder,
            vc_count: verification.vcs.len(),
            verified_at: chrono::Utc::now().timestamp(),
        };
        let record_json = serde_json::to_string(&record).map_err(StoreError::from)?;
        self.store
            .set(&keys::vp_verification(token), &record_json, Some(VP_CACHE_TTL))
            .await?;
        self.cache.put(token, record.clone());

        Ok(SessionContext::from_record(&identity.address, &record))
    }
}

/// Extractor for identity-guarded handlers.
///
/// ```rust,ignore
/// async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
///     // identity.address is the authenticated wallet
/// }
/// ```
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = state.identity_guard.authenticate(&parts.headers).await?;
        Ok(Auth(identity))
    }
}

/// Extractor for session-guarded handlers: identity plus VP verification.
pub struct VpAuth(pub Identity, pub SessionContext);

impl FromRequestParts<AppState> for VpAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = state.identity_guard.authenticate(&parts.headers).await?;

        let context = match &identity.token {
            Some(token) => state.session_guard.authorize(token, &identity).await?,
            // Development-mode bypass carries no token, hence no VP.
            None => SessionContext::unverified(&identity.address),
        };

        Ok(VpAuth(identity, context))
    }
}
