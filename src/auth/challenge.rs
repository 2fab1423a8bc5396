// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time login challenges.
//!
//! A challenge is a human-readable message the wallet signs to prove control
//! of an address. One active challenge per address; issuing a new one
//! overwrites the old. Consumption deletes the entry, so a challenge can be
//! used at most once. Expired and never-issued challenges are
//! indistinguishable to callers.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::store::{keys, SessionStore, StoreError};

/// Challenges live for five minutes.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(300);

/// Issues and consumes per-address login challenges.
pub struct ChallengeStore {
    store: Arc<dyn SessionStore>,
    service_name: String,
}

impl ChallengeStore {
    pub fn new(store: Arc<dyn SessionStore>, service_name: impl Into<String>) -> Self {
        Self {
            store,
            service_name: service_name.into(),
        }
    }

    /// Issue a fresh challenge for `address`, replacing any prior one.
    pub async fn issue(&self, address: &str) -> Result<String, StoreError> {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let challenge = format!(
            "Sign this message to authenticate with {}:\n\nWallet: {}\nNonce: {}\nTimestamp: {}",
            self.service_name,
            address,
            hex::encode(nonce),
            chrono::Utc::now().timestamp(),
        );

        self.store
            .set(&keys::challenge(address), &challenge, Some(CHALLENGE_TTL))
            .await?;

        Ok(challenge)
    }

    /// Consume the stored challenge if `presented` matches it exactly.
    ///
    /// Returns `false` for absent, expired, or mismatched challenges alike.
    /// A match deletes the entry before returning, enforcing single use.
    pub async fn consume(&self, address: &str, presented: &str) -> Result<bool, StoreError> {
        let key = keys::challenge(address);
        match self.store.get(&key).await? {
            Some(stored) if stored == presented => {
                self.store.delete(&key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
