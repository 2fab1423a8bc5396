// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, refresh, and logout flows.
//!
//! The orchestrator drives the four-step login state machine
//! (`AwaitingChallenge -> ChallengeIssued -> Verified -> SessionActive`)
//! over the challenge store, signature verifier, token issuer, VP engine,
//! and session store. Credential-directory lookups are strictly
//! best-effort: an unreachable directory degrades a login to "no guardian
//! info, no credentials", it never fails it.

use std::sync::Arc;

use crate::directory::{CredentialDirectory, GuardianInfo, VcRecord};
use crate::models::Profile;
use crate::store::{keys, SessionStore, VpVerificationCache};

use super::challenge::{ChallengeStore, CHALLENGE_TTL};
use super::error::AuthError;
use super::signature;
use super::token::{TokenIssuer, ACCESS_TTL};
use super::vp::{VpEngine, VpError, VpSigningMaterial, EMPTY_VP};

/// Result of the challenge step.
pub struct ChallengeOutcome {
    pub challenge: String,
    /// Present when the wallet holds credentials: the VP material to sign in
    /// the same wallet interaction as the challenge.
    pub vp_signing: Option<VpSigningMaterial>,
    pub expires_in: u64,
}

/// Result of a completed login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    /// Compact VP, or [`EMPTY_VP`] when the session carries none.
    pub vp_jwt: String,
    pub profile: Profile,
}

/// Result of a token refresh. The refresh token is echoed, not rotated.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthOrchestrator {
    store: Arc<dyn SessionStore>,
    challenges: ChallengeStore,
    tokens: Arc<TokenIssuer>,
    vp: Arc<VpEngine>,
    directory: Arc<dyn CredentialDirectory>,
    vp_cache: Arc<VpVerificationCache>,
}

impl AuthOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        challenges: ChallengeStore,
        tokens: Arc<TokenIssuer>,
        vp: Arc<VpEngine>,
        directory: Arc<dyn CredentialDirectory>,
        vp_cache: Arc<VpVerificationCache>,
    ) -> Self {
        Self {
            store,
            challenges,
            tokens,
            vp,
            directory,
            vp_cache,
        }
    }

    /// Login step 1: issue a challenge, plus VP signing material when the
    /// wallet holds credentials.
    pub async fn challenge(&self, address: &str) -> Result<ChallengeOutcome, AuthError> {
        let vcs = self.lookup_vcs(address).await;
        let challenge = self.challenges.issue(address).await?;

        let vp_signing = if vcs.is_empty() {
            None
        } else {
            let vc_jwts = vcs.into_iter().map(|vc| vc.vc_jwt).collect();
            let material = self
                .vp
                .prepare_signing(address, vc_jwts, Some("authentication".to_string()))
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            Some(material)
        };

        Ok(ChallengeOutcome {
            challenge,
            vp_signing,
            expires_in: CHALLENGE_TTL.as_secs(),
        })
    }

    /// Login step 2: verify the challenge signature, mint tokens, and bind
    /// a VP (or the [`EMPTY_VP`] sentinel) to the new session.
    pub async fn login(
        &self,
        address: &str,
        challenge: &str,
        challenge_signature: &str,
        vp_signature: Option<&str>,
        vp_signed_data: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        if !self.challenges.consume(address, challenge).await? {
            return Err(AuthError::ChallengeInvalid);
        }
        if !signature::verify_personal(challenge, challenge_signature, address) {
            return Err(AuthError::SignatureInvalid);
        }

        let guardian = self.lookup_guardian(address).await;
        let vcs = self.lookup_vcs(address).await;

        let role = guardian.is_some().then(|| "guardian".to_string());
        let access_token = self
            .tokens
            .issue_access(address, guardian.is_some(), vcs.len(), role)
            .await?;
        let refresh_token = self.tokens.issue_refresh(address).await?;

        let vp_jwt = match (vp_signature, vp_signed_data) {
            (Some(sig), Some(signed_data)) if !vcs.is_empty() => {
                self.vp.assemble(signed_data, sig).map_err(map_assembly_error)?
            }
            _ => EMPTY_VP.to_string(),
        };

        // One session = one VP. The binding must land before any guard can
        // observe the token.
        self.store
            .set(&keys::vp_binding(&access_token), &vp_jwt, Some(ACCESS_TTL))
            .await?;

        tracing::info!(
            address,
            vc_count = vcs.len(),
            vp_bound = vp_jwt != EMPTY_VP,
            "login completed"
        );

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            vp_jwt,
            profile: self.build_profile(address, guardian, vcs.len()),
        })
    }

    /// Reissue an access token against a valid, stored refresh token.
    ///
    /// The new session is bound to [`EMPTY_VP`]: the server has no fresh
    /// client signature, so full VP-gated access requires a re-login.
    pub async fn refresh(&self, presented: &str) -> Result<RefreshOutcome, AuthError> {
        let claims = self
            .tokens
            .validate_refresh(presented)
            .map_err(|_| AuthError::RefreshInvalid)?;

        let stored = self.store.get(&keys::refresh(&claims.address)).await?;
        if stored.as_deref() != Some(presented) {
            return Err(AuthError::RefreshInvalid);
        }

        let guardian = self.lookup_guardian(&claims.address).await;
        let vcs = self.lookup_vcs(&claims.address).await;

        let role = guardian.is_some().then(|| "guardian".to_string());
        let access_token = self
            .tokens
            .issue_access(&claims.address, guardian.is_some(), vcs.len(), role)
            .await?;

        self.store
            .set(&keys::vp_binding(&access_token), EMPTY_VP, Some(ACCESS_TTL))
            .await?;

        Ok(RefreshOutcome {
            access_token,
            refresh_token: presented.to_string(),
        })
    }

    /// Revoke one session: block its token for the token's remaining
    /// validity and drop the VP binding and verification cache entries.
    /// The refresh token and other sessions are untouched.
    pub async fn logout(
        &self,
        token: &str,
        address: &str,
        expires_at: i64,
    ) -> Result<(), AuthError> {
        let remaining = expires_at - chrono::Utc::now().timestamp();
        let ttl = std::time::Duration::from_secs(remaining.max(1) as u64);

        self.store
            .set(&keys::blocked(token), "1", Some(ttl))
            .await?;
        self.store.delete(&keys::vp_binding(token)).await?;
        self.store.delete(&keys::vp_verification(token)).await?;
        self.vp_cache.invalidate(token);
        self.store
            .set_remove(&keys::sessions(address), token)
            .await?;

        tracing::info!(address, "session logged out");
        Ok(())
    }

    /// Revoke every session issued to `address`, then the refresh token.
    ///
    /// Walks the `sessions:` index; each key mutation stands alone, so a
    /// mid-walk store failure leaves already-revoked sessions revoked.
    pub async fn logout_all(&self, address: &str) -> Result<usize, AuthError> {
        let session_key = keys::sessions(address);
        let tokens = self.store.set_members(&session_key).await?;

        let mut revoked = 0;
        for token in &tokens {
            // Expired tokens need no marker; their bindings still get swept.
            if let Ok(claims) = self.tokens.validate_access(token) {
                match self
                    .store
                    .set(&keys::blocked(token), "1", Some(claims.remaining_ttl()))
                    .await
                {
                    Ok(()) => revoked += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to block token during logout-all")
                    }
                }
            }
            if let Err(e) = self.store.delete(&keys::vp_binding(token)).await {
                tracing::warn!(error = %e, "failed to delete VP binding during logout-all");
            }
            if let Err(e) = self.store.delete(&keys::vp_verification(token)).await {
                tracing::warn!(error = %e, "failed to delete VP cache entry during logout-all");
            }
            self.vp_cache.invalidate(token);
        }

        self.store.delete(&session_key).await?;
        self.store.delete(&keys::refresh(address)).await?;
        self.store.delete(&keys::current_token(address)).await?;

        tracing::info!(address, revoked, "all sessions logged out");
        Ok(revoked)
    }

    /// Profile for an authenticated address, from best-effort directory data.
    pub async fn profile(&self, address: &str) -> Profile {
        let guardian = self.lookup_guardian(address).await;
        let vcs = self.lookup_vcs(address).await;
        self.build_profile(address, guardian, vcs.len())
    }

    fn build_profile(
        &self,
        address: &str,
        guardian_info: Option<GuardianInfo>,
        vc_count: usize,
    ) -> Profile {
        Profile {
            wallet_address: address.to_string(),
            did: self.vp.did(address),
            guardian_info,
            vc_count,
        }
    }

    async fn lookup_vcs(&self, address: &str) -> Vec<VcRecord> {
        match self.directory.vcs_by_wallet(address).await {
            Ok(vcs) => vcs,
            Err(e) => {
                tracing::warn!(error = %e, address, "credential directory unavailable, proceeding without VCs");
                Vec::new()
            }
        }
    }

    async fn lookup_guardian(&self, address: &str) -> Option<GuardianInfo> {
        match self.directory.guardian_info(address).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, address, "credential directory unavailable, proceeding without guardian info");
                None
            }
        }
    }
}

fn map_assembly_error(err: VpError) -> AuthError {
    match err {
        VpError::HolderSignatureMismatch { .. } | VpError::Signature(_) => {
            AuthError::SignatureInvalid
        }
        other => AuthError::VpVerificationFailed {
            reason: other.to_string(),
            details: Vec::new(),
        },
    }
}
