use std::sync::Arc;
use std::time::Duration;

use dropflow_catalog::CatalogSyncCoordinator;
use dropflow_order::OrderOrchestrator;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

/// Periodic trigger for the catalog sync. The coordinator itself skips
/// vendors whose previous run is still in flight, so overlapping triggers
/// are harmless.
pub fn start_sync_worker(
    sync: Arc<CatalogSyncCoordinator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "catalog sync worker started");
        loop {
            sleep(interval).await;
            let outcomes = sync.sync_all().await;
            for outcome in &outcomes {
                if outcome.partial {
                    error!(vendor_id = %outcome.vendor_id, errors = ?outcome.errors,
                        "vendor sync ended partially");
                }
            }
            info!(vendors = outcomes.len(), "catalog sync pass finished");
        }
    })
}

/// Watchdog sweep: no order may sit in `Submitting` forever.
pub fn start_submission_watchdog(
    orchestrator: Arc<OrderOrchestrator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "submission watchdog started");
        loop {
            sleep(interval).await;
            match orchestrator.expire_stuck_submissions().await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "expired stuck submissions"),
                Err(err) => error!(error = %err, "watchdog sweep failed"),
            }
        }
    })
}
