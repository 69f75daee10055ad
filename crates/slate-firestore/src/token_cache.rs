//! Access token cache for Firestore requests.
//!
//! Tokens come either from a Google service account (refreshed ahead of
//! expiry, one refresh at a time) or, against the emulator, from a fixed
//! bearer value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the provider-reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider reports an expiry we cannot convert.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope covering the Firestore REST API.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Bearer value the Firestore emulator accepts as an admin credential.
pub const EMULATOR_TOKEN: &str = "owner";

/// Where tokens come from.
pub enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    fn is_unexpired(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe token cache.
pub struct TokenCache {
    source: TokenSource,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
        }
    }

    /// Cache that always hands out the same bearer value.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self::new(TokenSource::Static(token.into()))
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// A token valid for at least the refresh margin.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        if let Some(cached) = self.slot.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.slot.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        match provider.token(&[DATASTORE_SCOPE]).await {
            Ok(token) => {
                let remaining = token.expires_at() - Utc::now();
                let expires_at = if remaining > chrono::Duration::zero() {
                    Instant::now() + remaining.to_std().unwrap_or(FALLBACK_TTL)
                } else {
                    Instant::now()
                };
                let value = token.as_str().to_string();
                *slot = Some(CachedToken {
                    value: value.clone(),
                    expires_at,
                });
                debug!("Refreshed Firestore access token");
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(cached) if cached.is_unexpired() => {
                    warn!(error = %e, "Token refresh failed, reusing unexpired token");
                    Ok(cached.value.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain access token: {}",
                    e
                ))),
            },
        }
    }
}
