// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. The JWT secret
//! is the one value with no safe default: production refuses to start
//! without it, development falls back to a fixed throwaway secret.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `APP_ENV` | `production` or `development` | `development` |
//! | `JWT_SECRET` | HS256 signing secret for access/refresh tokens | Required in production |
//! | `REDIS_URL` | Session store URL | Required in production; in-memory store when unset in development |
//! | `DID_PREFIX` | DID method + network prefix | `did:ethr:besu` |
//! | `VP_AUDIENCE` | `aud` claim for issued VPs (downstream backend URL) | `http://localhost:8080` |
//! | `DIRECTORY_URL` | Credential directory base URL | Unset: empty static directory |
//! | `SERVICE_NAME` | Name embedded in challenge messages | `DID Gateway` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;

use thiserror::Error;

/// Fallback signing secret for development mode only.
const DEV_JWT_SECRET: &str = "insecure-development-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET is required when APP_ENV=production")]
    MissingJwtSecret,
    #[error("REDIS_URL is required when APP_ENV=production")]
    MissingRedisUrl,
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Production mode disables the identity guard's header bypass.
    pub production: bool,
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub did_prefix: String,
    pub vp_audience: String,
    pub directory_url: Option<String>,
    pub service_name: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if production => return Err(ConfigError::MissingJwtSecret),
            _ => {
                tracing::warn!("JWT_SECRET not set, using the development fallback secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.is_empty());
        if production && redis_url.is_none() {
            return Err(ConfigError::MissingRedisUrl);
        }

        let port_raw = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_raw
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port_raw))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            production,
            jwt_secret,
            redis_url,
            did_prefix: env::var("DID_PREFIX").unwrap_or_else(|_| "did:ethr:besu".to_string()),
            vp_audience: env::var("VP_AUDIENCE")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            directory_url: env::var("DIRECTORY_URL").ok().filter(|v| !v.is_empty()),
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "DID Gateway".to_string()),
        })
    }

    /// Configuration for tests: development mode, in-memory store.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            production: false,
            jwt_secret: "test-secret".to_string(),
            redis_url: None,
            did_prefix: "did:ethr:besu".to_string(),
            vp_audience: "http://localhost:8080".to_string(),
            directory_url: None,
            service_name: "DID Gateway".to_string(),
        }
    }
}
