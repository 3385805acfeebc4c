/// SSO-link reconciler
///
/// Drains the SSO-link outbox: claims due entries, writes the matching
/// `sso_integrations` row and marks each entry complete. Inserting a row
/// that already exists counts as success, so a retried entry never produces
/// a second row.
///
/// # Failure handling
///
/// ```text
/// attempt n fails, n <  max_attempts ──> retry after min(base * 2^(n-1), max) + jitter
/// attempt n fails, n >= max_attempts ──> parked, logged at error
/// ```
///
/// # Example
///
/// ```no_run
/// use ssobridge_worker::{config::ReconcilerConfig, reconciler::Reconciler};
/// use ssobridge_shared::store::MemoryIdentityStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let reconciler = Reconciler::new(Arc::new(MemoryIdentityStore::new()), ReconcilerConfig::default());
/// let shutdown = reconciler.shutdown_token();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// reconciler.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::config::ReconcilerConfig;
use rand::Rng;
use ssobridge_shared::models::outbox::SsoLinkOutboxEntry;
use ssobridge_shared::store::{IdentityStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to claim outbox entries: {0}")]
    Claim(#[source] StoreError),
}

/// Outcome counts for one pass over the outbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub claimed: usize,

    /// New integration rows written
    pub linked: usize,

    /// Entries whose row already existed
    pub already_linked: usize,

    /// Failed entries rescheduled
    pub retried: usize,

    /// Failed entries that ran out of attempts
    pub parked: usize,
}

pub struct Reconciler {
    store: Arc<dyn IdentityStore>,
    config: ReconcilerConfig,
    shutdown_token: CancellationToken,
}

impl Reconciler {
    pub fn new(store: Arc<dyn IdentityStore>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Polls the outbox until shutdown
    ///
    /// Sleeps for the poll interval whenever a pass leaves nothing due, or
    /// after a failed claim.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "SSO-link reconciler starting"
        );

        while !self.shutdown_token.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(stats) => {
                    if stats.claimed > 0 {
                        tracing::info!(
                            claimed = stats.claimed,
                            linked = stats.linked,
                            already_linked = stats.already_linked,
                            retried = stats.retried,
                            parked = stats.parked,
                            "Reconciled outbox batch"
                        );
                    }
                    stats.claimed < self.config.batch_size
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reconcile pass failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => break,
                    _ = sleep(self.config.poll_interval()) => {}
                }
            }
        }

        tracing::info!("SSO-link reconciler shut down");
        Ok(())
    }

    /// Claims one batch of due entries and processes it
    pub async fn run_once(&self) -> Result<ReconcileStats, ReconcileError> {
        let entries = self
            .store
            .claim_due_links(self.config.batch_size, self.config.lease())
            .await
            .map_err(ReconcileError::Claim)?;

        let mut stats = ReconcileStats {
            claimed: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            self.reconcile(entry, &mut stats).await;
        }

        Ok(stats)
    }

    async fn reconcile(&self, entry: SsoLinkOutboxEntry, stats: &mut ReconcileStats) {
        match self.store.insert_sso_integration(&entry.to_integration()).await {
            Ok(row) => {
                if row.is_some() {
                    stats.linked += 1;
                } else {
                    stats.already_linked += 1;
                }

                // On failure the lease expires and the insert is retried as a no-op
                if let Err(e) = self.store.complete_link(entry.id).await {
                    tracing::warn!(entry_id = %entry.id, error = %e, "Failed to mark outbox entry complete");
                }
            }
            Err(e) => self.record_failure(&entry, &e.to_string(), stats).await,
        }
    }

    async fn record_failure(
        &self,
        entry: &SsoLinkOutboxEntry,
        error: &str,
        stats: &mut ReconcileStats,
    ) {
        let retry_at = if entry.attempts >= self.config.max_attempts {
            tracing::error!(
                entry_id = %entry.id,
                user_id = %entry.user_id,
                provider = %entry.provider,
                attempts = entry.attempts,
                error,
                "SSO link parked after final attempt"
            );
            stats.parked += 1;
            None
        } else {
            let delay = with_jitter(backoff_delay(
                entry.attempts,
                self.config.base_backoff(),
                self.config.max_backoff(),
            ));
            tracing::warn!(
                entry_id = %entry.id,
                attempts = entry.attempts,
                retry_in_ms = delay.as_millis() as u64,
                error,
                "SSO link insert failed, retrying"
            );
            stats.retried += 1;
            chrono::Duration::from_std(delay)
                .ok()
                .map(|d| chrono::Utc::now() + d)
        };

        if let Err(e) = self.store.fail_link(entry.id, error, retry_at).await {
            tracing::error!(entry_id = %entry.id, error = %e, "Failed to record outbox failure");
        }
    }
}

/// Exponential backoff for the given attempt number (1-based), capped at `max`
pub fn backoff_delay(attempts: i32, base: Duration, max: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 31) as u32;
    base.saturating_mul(2u32.saturating_pow(exponent)).min(max)
}

/// Adds up to 10% random jitter
fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 10;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}
