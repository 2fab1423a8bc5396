// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end authentication scenarios against the in-memory store.

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use did_gateway::auth::{AuthError, EMPTY_VP};
use did_gateway::config::Config;
use did_gateway::directory::{StaticDirectory, VcRecord};
use did_gateway::models::LoginRequest;
use did_gateway::state::AppState;
use did_gateway::store::{keys, MemoryStore, SessionStore};

use common::{make_vc, sign_personal, wallet, TestWallet};

fn test_state(directory: StaticDirectory) -> (AppState, Arc<MemoryStore>) {
    let mut config = Config::for_tests();
    // Exercise the full verification paths, not the development bypass.
    config.production = true;
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store.clone(), Arc::new(directory));
    (state, store)
}

async fn login(state: &AppState, wallet: &TestWallet) -> (String, String, String) {
    let outcome = state.orchestrator.challenge(&wallet.address).await.unwrap();

    let challenge_signature = sign_personal(wallet, &outcome.challenge);
    let (vp_signature, vp_signed_data) = match &outcome.vp_signing {
        Some(material) => (
            Some(sign_personal(wallet, &material.signing_input)),
            Some(material.signing_input.clone()),
        ),
        None => (None, None),
    };

    let request = LoginRequest {
        wallet_address: wallet.address.clone(),
        signature: challenge_signature,
        challenge: outcome.challenge,
        vp_signature,
        vp_signed_data,
    };
    let login = state
        .orchestrator
        .login(
            &request.wallet_address,
            &request.challenge,
            &request.signature,
            request.vp_signature.as_deref(),
            request.vp_signed_data.as_deref(),
        )
        .await
        .unwrap();

    (login.access_token, login.refresh_token, login.vp_jwt)
}

#[tokio::test]
async fn login_without_credentials_yields_empty_vp_and_usable_token() {
    let user = wallet();
    let (state, _) = test_state(StaticDirectory::new());

    let (access_token, _, vp_jwt) = login(&state, &user).await;

    assert_eq!(vp_jwt, EMPTY_VP);

    let identity = state
        .identity_guard
        .verify_token(&access_token)
        .await
        .expect("token must be usable");
    assert_eq!(identity.address, user.address);
    assert_eq!(identity.vc_count, 0);
}

#[tokio::test]
async fn login_with_credentials_yields_holder_matching_vp() {
    let user = wallet();
    let issuer = wallet();
    let subject_did = format!("did:ethr:besu:{}", user.address);

    let directory = StaticDirectory::new().with_vcs(
        &user.address,
        vec![
            VcRecord {
                vc_jwt: make_vc(&issuer, &subject_did, "IdentityCard"),
                vc_type: "IdentityCard".to_string(),
            },
            VcRecord {
                vc_jwt: make_vc(&issuer, &subject_did, "PetOwnership"),
                vc_type: "PetOwnership".to_string(),
            },
        ],
    );
    let (state, _) = test_state(directory);

    // The challenge response must carry VP signing material.
    let outcome = state.orchestrator.challenge(&user.address).await.unwrap();
    assert!(outcome.vp_signing.is_some());

    let (access_token, _, vp_jwt) = login(&state, &user).await;

    // Well-formed three-part token whose holder decodes to the address.
    let parts: Vec<&str> = vp_jwt.split('.').collect();
    assert_eq!(parts.len(), 3);
    let payload: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
    assert_eq!(
        payload["iss"].as_str().unwrap(),
        format!("did:ethr:besu:{}", user.address)
    );
    assert_eq!(payload["vp"]["verifiableCredential"].as_array().unwrap().len(), 2);

    // The session guard verifies it, holder-matched.
    let identity = state
        .identity_guard
        .verify_token(&access_token)
        .await
        .unwrap();
    let context = state
        .session_guard
        .authorize(&access_token, &identity)
        .await
        .unwrap();
    assert!(context.vp_verified);
    assert_eq!(context.vc_count, Some(2));
    assert_eq!(
        context.vp_holder.as_deref(),
        Some(format!("did:ethr:besu:{}", user.address).as_str())
    );
}

#[tokio::test]
async fn empty_session_passes_guard_unverified() {
    let user = wallet();
    let (state, _) = test_state(StaticDirectory::new());

    let (access_token, _, vp_jwt) = login(&state, &user).await;
    assert_eq!(vp_jwt, EMPTY_VP);

    let identity = state
        .identity_guard
        .verify_token(&access_token)
        .await
        .unwrap();
    let context = state
        .session_guard
        .authorize(&access_token, &identity)
        .await
        .expect("EMPTY sessions are allowed through");

    assert!(!context.vp_verified);
    assert!(context.vp_holder.is_none());
    assert!(context.vc_count.is_none());
}

#[tokio::test]
async fn tampered_vp_is_rejected_and_not_cached() {
    let user = wallet();
    let issuer = wallet();
    let subject_did = format!("did:ethr:besu:{}", user.address);

    let directory = StaticDirectory::new().with_vcs(
        &user.address,
        vec![VcRecord {
            vc_jwt: make_vc(&issuer, &subject_did, "IdentityCard"),
            vc_type: "IdentityCard".to_string(),
        }],
    );
    let (state, store) = test_state(directory);

    let (access_token, _, vp_jwt) = login(&state, &user).await;

    // Tamper one byte of the VP's signature and rebind it.
    let parts: Vec<&str> = vp_jwt.split('.').collect();
    let mut signature = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
    signature[7] ^= 0x01;
    let tampered = format!(
        "{}.{}.{}",
        parts[0],
        parts[1],
        URL_SAFE_NO_PAD.encode(signature)
    );
    store
        .set(&keys::vp_binding(&access_token), &tampered, None)
        .await
        .unwrap();

    let identity = state
        .identity_guard
        .verify_token(&access_token)
        .await
        .unwrap();
    let err = state
        .session_guard
        .authorize(&access_token, &identity)
        .await
        .unwrap_err();
    match err {
        AuthError::VpVerificationFailed { reason, .. } => assert!(!reason.is_empty()),
        other => panic!("expected VP verification failure, got {other:?}"),
    }

    // No cache entry was written for the failure.
    assert!(store
        .get(&keys::vp_verification(&access_token))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn revocation_is_final_for_that_token() {
    let user = wallet();
    let (state, _) = test_state(StaticDirectory::new());

    let (access_token, refresh_token, _) = login(&state, &user).await;

    let identity = state
        .identity_guard
        .verify_token(&access_token)
        .await
        .unwrap();
    state
        .orchestrator
        .logout(&access_token, &identity.address, identity.expires_at)
        .await
        .unwrap();

    // The exact token is rejected from now on, well before natural expiry.
    for _ in 0..3 {
        assert!(matches!(
            state.identity_guard.verify_token(&access_token).await,
            Err(AuthError::TokenBlocked)
        ));
    }

    // Single-session logout does not touch the refresh token.
    assert!(state.orchestrator.refresh(&refresh_token).await.is_ok());
}

#[tokio::test]
async fn logout_all_scopes_to_one_address() {
    let alice = wallet();
    let bob = wallet();
    let (state, _) = test_state(StaticDirectory::new());

    let (alice_token_1, alice_refresh, _) = login(&state, &alice).await;
    let (alice_token_2, _, _) = login(&state, &alice).await;
    let (bob_token, _, _) = login(&state, &bob).await;

    let revoked = state.orchestrator.logout_all(&alice.address).await.unwrap();
    assert_eq!(revoked, 2);

    for token in [&alice_token_1, &alice_token_2] {
        assert!(matches!(
            state.identity_guard.verify_token(token).await,
            Err(AuthError::TokenBlocked)
        ));
    }
    assert!(matches!(
        state.orchestrator.refresh(&alice_refresh).await,
        Err(AuthError::RefreshInvalid)
    ));

    // Bob's session is unaffected.
    assert!(state.identity_guard.verify_token(&bob_token).await.is_ok());
}

#[tokio::test]
async fn refreshed_session_downgrades_to_empty_vp() {
    let user = wallet();
    let issuer = wallet();
    let subject_did = format!("did:ethr:besu:{}", user.address);

    let directory = StaticDirectory::new().with_vcs(
        &user.address,
        vec![VcRecord {
            vc_jwt: make_vc(&issuer, &subject_did, "IdentityCard"),
            vc_type: "IdentityCard".to_string(),
        }],
    );
    let (state, store) = test_state(directory);

    let (_, refresh_token, vp_jwt) = login(&state, &user).await;
    assert_ne!(vp_jwt, EMPTY_VP);

    let refreshed = state.orchestrator.refresh(&refresh_token).await.unwrap();

    // No fresh wallet signature: the new token is bound to EMPTY and the
    // guard reports the session as unverified until re-login.
    assert_eq!(
        store
            .get(&keys::vp_binding(&refreshed.access_token))
            .await
            .unwrap()
            .as_deref(),
        Some(EMPTY_VP)
    );
    let identity = state
        .identity_guard
        .verify_token(&refreshed.access_token)
        .await
        .unwrap();
    let context = state
        .session_guard
        .authorize(&refreshed.access_token, &identity)
        .await
        .unwrap();
    assert!(!context.vp_verified);
}
