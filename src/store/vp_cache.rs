// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process mirror of VP verification results.
//!
//! The durable `vp_verified:` entries live up to an hour; this LRU mirror
//! expires faster (five minutes) and exists only to keep repeat requests on
//! the same token off the network. The durable store stays authoritative.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// Outcome of a successful VP verification, as cached per access token.
///
/// Only positive results are ever stored; a failed verification is recomputed
/// on the next request (see the session guard).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VpVerificationRecord {
    pub verified: bool,
    /// Holder DID, e.g. `did:ethr:besu:0xabc...`.
    pub holder: String,
    pub vc_count: usize,
    /// Unix timestamp of the verification.
    pub verified_at: i64,
}

struct CacheEntry {
    record: VpVerificationRecord,
    inserted_at: Instant,
}

/// LRU mirror keyed by access token.
pub struct VpVerificationCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl VpVerificationCache {
    /// Create a mirror with the given capacity (tokens) and entry TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
            ttl,
        }
    }

    /// Get the cached record for a token.
    ///
    /// Returns `None` if not cached or expired.
    pub fn get(&self, token: &str) -> Option<VpVerificationRecord> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(token) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.record.clone());
            }
            // Expired — remove it
            cache.pop(token);
        }
        None
    }

    /// Store a record for a token.
    pub fn put(&self, token: &str, record: VpVerificationRecord) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                token.to_string(),
                CacheEntry {
                    record,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drop the entry for a token (logout path).
    pub fn invalidate(&self, token: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(token);
        }
    }
}
