// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    directory::GuardianInfo,
    models::{
        ChallengeRequest, ChallengeResponse, LoginRequest, LoginResponse, LogoutResponse, Profile,
        ProfileResponse, RefreshRequest, RefreshResponse, SessionStatusResponse, VpSigningData,
    },
    state::AppState,
    ws,
};

pub mod auth;
pub mod health;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/challenge", post(auth::challenge))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/logout-all", post(auth::logout_all))
        .route("/profile", get(auth::profile))
        .route("/session", get(auth::session));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/health", get(health::health))
        .route("/ws/chat", get(ws::chat_ws))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::challenge,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::logout_all,
        auth::profile,
        auth::session,
        health::health
    ),
    components(
        schemas(
            ChallengeRequest,
            ChallengeResponse,
            VpSigningData,
            LoginRequest,
            LoginResponse,
            Profile,
            GuardianInfo,
            RefreshRequest,
            RefreshResponse,
            LogoutResponse,
            ProfileResponse,
            SessionStatusResponse,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Authentication", description = "Wallet challenge/response login, tokens, and sessions"),
        (name = "Health", description = "Liveness probe")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::directory::StaticDirectory;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let state = AppState::new(
            Config::for_tests(),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticDirectory::new()),
        );
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
