//! # Refresh Scheduler
//!
//! Owns the periodic timer and orchestrates provider → compiler → store on
//! startup and on every tick.
//!
//! The initial cycle runs before the loop starts and its failure aborts
//! startup. Per-cycle failures inside the loop are logged and the loop
//! waits for the next tick; there is no retry within a tick. Cancellation
//! is observed at the wait point only, so an in-flight cycle always
//! finishes its store call before the loop exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Error, Result};
use crate::registry::RegistryProvider;
use crate::secret::compile_registry_auth_secret;
use crate::store::{self, SecretStore};

/// Periodic refresher for a single secret binding
pub struct Refresher {
    provider: Box<dyn RegistryProvider>,
    store: Arc<dyn SecretStore>,
    registry_kind: String,
    interval: Duration,
    cycle_deadline: Duration,
}

impl Refresher {
    /// `refresh_interval` is in minutes, matching the process flag
    pub fn new(
        provider: Box<dyn RegistryProvider>,
        store: Arc<dyn SecretStore>,
        registry_kind: &str,
        refresh_interval: u64,
    ) -> Self {
        Self::with_interval(
            provider,
            store,
            registry_kind,
            Duration::from_secs(refresh_interval * 60),
        )
    }

    /// Construct with an explicit tick interval; tests use sub-second ticks.
    ///
    /// Each cycle is bounded by a deadline of half the interval, so a
    /// stalled upstream or store call cannot consume a whole refresh period.
    pub fn with_interval(
        provider: Box<dyn RegistryProvider>,
        store: Arc<dyn SecretStore>,
        registry_kind: &str,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            registry_kind: registry_kind.to_string(),
            interval,
            cycle_deadline: interval / 2,
        }
    }

    /// Run the initial refresh cycle, then refresh on every tick until
    /// cancelled.
    ///
    /// An initial-cycle failure is returned as-is and the loop never starts.
    /// Cancellation exits with [`Error::Cancelled`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(registry_kind = %self.registry_kind, "Starting secret refresher");
        self.refresh_once().await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stopped refreshing secret");
                    return Err(Error::Cancelled);
                }
                _ = sleep(self.interval) => {
                    if let Err(err) = self.refresh_once().await {
                        warn!(
                            error = %err,
                            registry_kind = %self.registry_kind,
                            "Failed to refresh secret"
                        );
                    }
                }
            }
        }
    }

    /// One fetch → compile → upsert cycle, bounded by the cycle deadline
    async fn refresh_once(&self) -> Result<()> {
        match timeout(self.cycle_deadline, self.refresh_secret()).await {
            Ok(result) => result,
            Err(_) => Err(Error::DeadlineExceeded(self.cycle_deadline)),
        }
    }

    async fn refresh_secret(&self) -> Result<()> {
        let token = self.provider.fetch_token().await?;
        let secret = compile_registry_auth_secret(&token)?;

        debug!(
            secret_name = %token.secret_name,
            namespace = %token.namespace,
            "Creating or updating secret"
        );
        store::create_or_update(self.store.as_ref(), &secret).await?;

        info!(
            secret_name = %token.secret_name,
            namespace = %token.namespace,
            registry_kind = %self.registry_kind,
            "Secret refreshed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Refresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refresher")
            .field("registry_kind", &self.registry_kind)
            .field("interval", &self.interval)
            .field("cycle_deadline", &self.cycle_deadline)
            .finish_non_exhaustive()
    }
}
