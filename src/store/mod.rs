// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Store
//!
//! All durable authentication state lives in a networked key-value store
//! with per-key TTL support. The [`SessionStore`] trait is the only seam the
//! rest of the crate sees; production runs against Redis
//! ([`RedisStore`]), development and tests against [`MemoryStore`].
//!
//! ## Key Layout
//!
//! ```text
//! challenge:{address}    login challenge text            (300 s)
//! token:{address}        current access token            (24 h)
//! refresh:{address}      refresh token                   (7 d)
//! vp_token:{token}       VP JWT or the literal "EMPTY"   (24 h)
//! vp_verified:{token}    cached VP verification result   (1 h)
//! blocked:{token}        revocation marker               (token's remaining validity)
//! sessions:{address}     set of access tokens issued to the address
//! ```
//!
//! Only single-key atomicity is assumed. Bulk flows (logout-all) iterate the
//! `sessions:` index and tolerate partial failure; each key mutation stands
//! on its own.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis;
pub mod vp_cache;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;
pub use self::vp_cache::{VpVerificationCache, VpVerificationRecord};

/// Session store failure.
///
/// Callers never surface these verbatim; guard and login layers map them to
/// bounded user-facing errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),
    /// A stored value could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Durable key-value operations with TTL support.
///
/// Methods map one-to-one onto the store commands the authentication flows
/// need: plain get/set/delete plus the set operations backing the
/// address -> tokens index used by bulk revocation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a value. Expired and never-set keys are both `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, with an optional TTL. A `None` TTL persists until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Whether a live (unexpired) value exists under the key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Add a member to the set stored under `key`.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Remove a member from the set stored under `key`.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// All members of the set stored under `key` (empty if absent).
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}

/// Key construction for the layout documented in the module header.
///
/// Addresses are canonical lowercase before they reach this module; keys are
/// built verbatim.
pub mod keys {
    /// Login challenge for a wallet address.
    pub fn challenge(address: &str) -> String {
        format!("challenge:{address}")
    }

    /// Current access token for a wallet address.
    pub fn current_token(address: &str) -> String {
        format!("token:{address}")
    }

    /// Refresh token for a wallet address.
    pub fn refresh(address: &str) -> String {
        format!("refresh:{address}")
    }

    /// VP JWT (or the `EMPTY` sentinel) bound to an access token.
    pub fn vp_binding(token: &str) -> String {
        format!("vp_token:{token}")
    }

    /// Durable VP verification result for an access token.
    pub fn vp_verification(token: &str) -> String {
        format!("vp_verified:{token}")
    }

    /// Revocation marker for an access token.
    pub fn blocked(token: &str) -> String {
        format!("blocked:{token}")
    }

    /// Set of access tokens issued to a wallet address.
    pub fn sessions(address: &str) -> String {
        format!("sessions:{address}")
    }
}
