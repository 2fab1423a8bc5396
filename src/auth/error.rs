// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Internally the variants keep the full failure taxonomy for logging and
//! tests. On the wire the guard-layer variants collapse into one uniform
//! `401 Unauthorized` body: whether a token was expired, malformed, or
//! revoked is deliberately not disclosed. Login and refresh surface richer
//! but still bounded reasons.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::token::TokenError;
use super::vp::VcCheck;
use crate::store::StoreError;

/// Authentication failure.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// No wallet-address header present
    MissingWalletHeader,
    /// Wallet-address header does not match the token's address
    WalletAddressMismatch,
    /// Token has expired
    TokenExpired,
    /// Token is malformed
    TokenMalformed,
    /// Token signature is invalid
    TokenSignatureInvalid,
    /// Token is in the blocked set (revoked)
    TokenBlocked,
    /// Challenge missing, expired, or mismatched
    ChallengeInvalid,
    /// Wallet signature does not recover to the expected address
    SignatureInvalid,
    /// Refresh token invalid, expired, or superseded
    RefreshInvalid,
    /// Presentation failed verification; details name the failing VCs
    VpVerificationFailed {
        reason: String,
        details: Vec<VcCheck>,
    },
    /// VP verified but its holder is not the session's address
    HolderMismatch,
    /// Internal error
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<VcCheck>,
}

impl AuthError {
    /// Get the error code for this error.
    ///
    /// Guard-layer failures all report `unauthorized`; callers cannot tell
    /// an expired token from a revoked one.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MissingWalletHeader
            | AuthError::WalletAddressMismatch
            | AuthError::TokenExpired
            | AuthError::TokenMalformed
            | AuthError::TokenSignatureInvalid
            | AuthError::TokenBlocked
            | AuthError::HolderMismatch => "unauthorized",
            AuthError::ChallengeInvalid => "challenge_invalid",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::RefreshInvalid => "refresh_invalid",
            AuthError::VpVerificationFailed { .. } => "vp_verification_failed",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// The bounded message sent to clients.
    fn user_message(&self) -> &'static str {
        match self {
            AuthError::ChallengeInvalid => "Invalid or expired challenge",
            AuthError::SignatureInvalid => "Invalid signature",
            AuthError::RefreshInvalid => "Invalid refresh token",
            AuthError::VpVerificationFailed { .. } => "VP verification failed",
            AuthError::Internal(_) => "Internal server error",
            _ => "Unauthorized",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MissingWalletHeader => write!(f, "Wallet address header is required"),
            AuthError::WalletAddressMismatch => write!(f, "Wallet address mismatch"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenMalformed => write!(f, "Token is malformed"),
            AuthError::TokenSignatureInvalid => write!(f, "Token signature is invalid"),
            AuthError::TokenBlocked => write!(f, "Token has been revoked"),
            AuthError::ChallengeInvalid => write!(f, "Challenge is missing, expired, or mismatched"),
            AuthError::SignatureInvalid => write!(f, "Wallet signature is invalid"),
            AuthError::RefreshInvalid => write!(f, "Refresh token is invalid"),
            AuthError::VpVerificationFailed { reason, .. } => {
                write!(f, "VP verification failed: {reason}")
            }
            AuthError::HolderMismatch => write!(f, "VP holder does not match session address"),
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed => AuthError::TokenMalformed,
            TokenError::SignatureInvalid => AuthError::TokenSignatureInvalid,
            TokenError::Store(e) => AuthError::Internal(e.to_string()),
            TokenError::Signing(e) => AuthError::Internal(e),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "authentication internal error");
        }
        let details = match &self {
            AuthError::VpVerificationFailed { details, .. } => details.clone(),
            _ => Vec::new(),
        };
        let body = Json(AuthErrorBody {
            error: self.user_message().to_string(),
            error_code: self.error_code().to_string(),
            details,
        });
        (status, body).into_response()
    }
}
