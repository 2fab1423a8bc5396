// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application state wiring.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth::{
    AuthOrchestrator, ChallengeStore, IdentityGuard, SessionGuard, TokenIssuer, VpEngine,
};
use crate::config::Config;
use crate::directory::CredentialDirectory;
use crate::store::{SessionStore, VpVerificationCache};
use crate::ws::ChatEnvelope;

/// Local VP-verification mirror: capacity in tokens, five-minute TTL.
const VP_CACHE_CAPACITY: usize = 4_096;
const VP_CACHE_LOCAL_TTL: Duration = Duration::from_secs(300);

/// Chat fan-out buffer; slow consumers lag rather than block.
const CHAT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<AuthOrchestrator>,
    pub identity_guard: Arc<IdentityGuard>,
    pub session_guard: Arc<SessionGuard>,
    pub chat: broadcast::Sender<ChatEnvelope>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn CredentialDirectory>,
    ) -> Self {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt_secret, store.clone()));
        let vp = Arc::new(VpEngine::new(
            config.did_prefix.clone(),
            config.vp_audience.clone(),
        ));
        let vp_cache = Arc::new(VpVerificationCache::new(
            VP_CACHE_CAPACITY,
            VP_CACHE_LOCAL_TTL,
        ));

        let orchestrator = Arc::new(AuthOrchestrator::new(
            store.clone(),
            ChallengeStore::new(store.clone(), config.service_name.clone()),
            tokens.clone(),
            vp.clone(),
            directory,
            vp_cache.clone(),
        ));

        let identity_guard = Arc::new(IdentityGuard::new(
            tokens,
            store.clone(),
            !config.production,
        ));
        let session_guard = Arc::new(SessionGuard::new(store, vp, vp_cache));

        let (chat, _) = broadcast::channel(CHAT_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config),
            orchestrator,
            identity_guard,
            session_guard,
            chat,
        }
    }
}
