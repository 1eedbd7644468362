//! Token revocation list.
//!
//! A logged-out token stays cryptographically valid until its `exp`, so logout records it here and
//! the auth extractor refuses any token found in the list. Entries only need to live as long as
//! the token would have, after which they are dropped:
//!
//! - [`MemoryRevocationStore`] gives every entry its own expiry inside a `moka` cache, and refuses
//!   new entries once it holds `max_entries` live tokens rather than evicting one
//! - [`PgRevocationStore`] filters on `expires_at` when reading, and [`run_purge_loop`] deletes
//!   rows that have expired

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::{Expiry, future::Cache};
use sqlx::PgPool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::auth::session::RevocationTicket;

#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("revocation store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RevocationError {
    fn from(err: sqlx::Error) -> Self {
        RevocationError::Unavailable(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    /// Remember a token as revoked until its expiry. Tickets that have already expired are not
    /// stored, since the token is unusable anyway.
    async fn revoke(&self, ticket: &RevocationTicket) -> Result<(), RevocationError>;

    async fn is_revoked(&self, key: &str) -> Result<bool, RevocationError>;
}

/// Time left until `expires_at`, or zero if it has passed.
fn remaining(expires_at: DateTime<Utc>) -> Duration {
    (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

struct UntilTokenExpiry;

impl Expiry<String, DateTime<Utc>> for UntilTokenExpiry {
    fn expire_after_create(&self, _key: &String, expires_at: &DateTime<Utc>, _created_at: Instant) -> Option<Duration> {
        Some(remaining(*expires_at))
    }
}

/// Process-local revocation list. Not shared between replicas.
pub struct MemoryRevocationStore {
    cache: Cache<String, DateTime<Utc>>,
    max_entries: u64,
}

impl MemoryRevocationStore {
    pub fn new(max_entries: u64) -> Self {
        // Entries only leave when their token expires; never evicted for size
        let cache = Cache::builder().expire_after(UntilTokenExpiry).build();
        Self { cache, max_entries }
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, ticket: &RevocationTicket) -> Result<(), RevocationError> {
        if remaining(ticket.expires_at).is_zero() {
            debug!("Skipping revocation of already expired token");
            return Ok(());
        }
        if !self.cache.contains_key(&ticket.key) {
            // entry_count is only exact once pending inserts and expirations are applied
            self.cache.run_pending_tasks().await;
            if self.cache.entry_count() >= self.max_entries {
                warn!(max_entries = self.max_entries, "Revocation list is full, refusing new entry");
                return Err(RevocationError::Unavailable("revocation list is full".to_string()));
            }
        }
        self.cache.insert(ticket.key.clone(), ticket.expires_at).await;
        Ok(())
    }

    async fn is_revoked(&self, key: &str) -> Result<bool, RevocationError> {
        Ok(self
            .cache
            .get(key)
            .await
            .is_some_and(|expires_at| expires_at > Utc::now()))
    }
}

/// Revocation list in the `revoked_tokens` table, shared by every replica on the database.
#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete rows whose token has expired, returning how many were removed.
    #[instrument(skip(self), err)]
    pub async fn purge_expired(&self) -> Result<u64, RevocationError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl RevocationStore for PgRevocationStore {
    async fn revoke(&self, ticket: &RevocationTicket) -> Result<(), RevocationError> {
        if remaining(ticket.expires_at).is_zero() {
            debug!("Skipping revocation of already expired token");
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_key, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (token_key) DO UPDATE
            SET expires_at = GREATEST(revoked_tokens.expires_at, EXCLUDED.expires_at)
            "#,
        )
        .bind(&ticket.key)
        .bind(ticket.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_revoked(&self, key: &str) -> Result<bool, RevocationError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_key = $1 AND expires_at > now())",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(revoked)
    }
}

/// Periodically purge expired revocation rows until `shutdown` is cancelled.
pub async fn run_purge_loop(store: PgRevocationStore, interval: Duration, shutdown: CancellationToken) {
    info!(?interval, "Starting revocation purge task");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Revocation purge task shutting down");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "Purged expired revocation entries"),
                    Err(e) => warn!("Failed to purge expired revocation entries: {e}"),
                }
            }
        }
    }
}
