// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication endpoints.
//!
//! The challenge and login handlers validate the address shape at the
//! boundary (lowercase only, never silently fixed) and delegate the flows to
//! the orchestrator. Guarded endpoints use the `Auth` / `VpAuth` extractors.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::{Auth, VpAuth};
use crate::error::ApiError;
use crate::models::{
    ChallengeRequest, ChallengeResponse, LoginRequest, LoginResponse, LogoutResponse,
    ProfileResponse, RefreshRequest, RefreshResponse, SessionStatusResponse, VpSigningData,
    WalletAddress,
};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/auth/challenge",
    request_body = ChallengeRequest,
    tag = "Authentication",
    responses(
        (status = 200, body = ChallengeResponse),
        (status = 400, description = "Malformed or non-lowercase wallet address")
    )
)]
pub async fn challenge(
    State(state): State<AppState>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, Response> {
    let address = parse_address(&request.wallet_address)?;

    let outcome = state
        .orchestrator
        .challenge(address.as_str())
        .await
        .map_err(IntoResponse::into_response)?;

    let vp_signing_data = match outcome.vp_signing {
        Some(material) => Some(VpSigningData {
            payload: serde_json::to_value(&material.payload)
                .map_err(|e| ApiError::internal(e.to_string()).into_response())?,
            signing_input: material.signing_input,
        }),
        None => None,
    };

    Ok(Json(ChallengeResponse {
        success: true,
        challenge: outcome.challenge,
        vp_signing_data,
        expires_in: outcome.expires_in,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "Authentication",
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, description = "Challenge or signature invalid")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Response> {
    let address = parse_address(&request.wallet_address)?;

    let outcome = state
        .orchestrator
        .login(
            address.as_str(),
            &request.challenge,
            &request.signature,
            request.vp_signature.as_deref(),
            request.vp_signed_data.as_deref(),
        )
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(LoginResponse {
        success: true,
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        vp_jwt: outcome.vp_jwt,
        profile: outcome.profile,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    tag = "Authentication",
    responses(
        (status = 200, body = RefreshResponse),
        (status = 401, description = "Refresh token invalid")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, Response> {
    let outcome = state
        .orchestrator
        .refresh(&request.refresh_token)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(RefreshResponse {
        success: true,
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Authentication",
    responses((status = 200, body = LogoutResponse))
)]
pub async fn logout(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Result<Json<LogoutResponse>, Response> {
    // Under the development bypass there is no token to revoke.
    if let Some(token) = &identity.token {
        state
            .orchestrator
            .logout(token, &identity.address, identity.expires_at)
            .await
            .map_err(IntoResponse::into_response)?;
    }

    Ok(Json(LogoutResponse { success: true }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    tag = "Authentication",
    responses((status = 200, body = LogoutResponse))
)]
pub async fn logout_all(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Result<Json<LogoutResponse>, Response> {
    state
        .orchestrator
        .logout_all(&identity.address)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(LogoutResponse { success: true }))
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "Authentication",
    responses((status = 200, body = ProfileResponse))
)]
pub async fn profile(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Json<ProfileResponse> {
    let profile = state.orchestrator.profile(&identity.address).await;
    Json(ProfileResponse {
        success: true,
        profile,
    })
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "Authentication",
    responses((status = 200, body = SessionStatusResponse))
)]
pub async fn session(VpAuth(_identity, context): VpAuth) -> Json<SessionStatusResponse> {
    Json(SessionStatusResponse {
        address: context.address,
        vp_verified: context.vp_verified,
        vp_holder: context.vp_holder,
        vc_count: context.vc_count,
    })
}

fn parse_address(raw: &str) -> Result<WalletAddress, Response> {
    WalletAddress::parse(raw).map_err(|msg| ApiError::bad_request(msg).into_response())
}
