use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use dropflow_core::{AdapterRegistry, Capability, FulfillError};
use tracing::{info, warn};

use crate::models::{CatalogEntry, SyncOutcome};
use crate::store::CatalogStore;

/// Pulls each vendor's product feed through its adapter and reconciles it
/// against the local catalog.
///
/// Runs are vendor-isolated and side-effect-idempotent: re-triggering after a
/// crash is always safe, and one vendor's failure never blocks or rolls back
/// another vendor's sync.
pub struct CatalogSyncCoordinator {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn CatalogStore>,
    running: Mutex<HashSet<String>>,
}

impl CatalogSyncCoordinator {
    pub fn new(registry: Arc<AdapterRegistry>, store: Arc<dyn CatalogStore>) -> Self {
        Self {
            registry,
            store,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Sync one vendor's feed. A second trigger while a run is still in
    /// flight is rejected (the periodic trigger skips, it does not queue).
    pub async fn sync_vendor(&self, vendor_id: &str) -> Result<SyncOutcome, FulfillError> {
        let _run = RunGuard::acquire(&self.running, vendor_id).ok_or_else(|| {
            FulfillError::Conflict(format!("sync already running for vendor {vendor_id}"))
        })?;

        let adapter = self
            .registry
            .get_enabled(vendor_id, Capability::CatalogSync)?;

        let mut existing: HashMap<String, CatalogEntry> = self
            .store
            .list_for_vendor(vendor_id, true)
            .await
            .map_err(FulfillError::storage)?
            .into_iter()
            .map(|e| (e.vendor_product_id.clone(), e))
            .collect();

        let mut outcome = SyncOutcome::new(vendor_id);
        let mut seen: HashSet<String> = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = match adapter.list_products(page_token.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    // Abort this vendor's run; earlier pages stay reconciled.
                    warn!(vendor_id, error = %err, "product listing failed mid-run");
                    outcome.errors.push(err.to_string());
                    outcome.partial = true;
                    break;
                }
            };

            for product in &page.items {
                seen.insert(product.vendor_product_id.clone());

                match existing.get_mut(&product.vendor_product_id) {
                    Some(entry) => {
                        let changed = entry.absorb(product);
                        self.store
                            .upsert(entry)
                            .await
                            .map_err(FulfillError::storage)?;
                        if changed {
                            outcome.updated += 1;
                        }
                    }
                    None => {
                        let entry = CatalogEntry::from_vendor_product(vendor_id, product);
                        self.store
                            .upsert(&entry)
                            .await
                            .map_err(FulfillError::storage)?;
                        existing.insert(entry.vendor_product_id.clone(), entry);
                        outcome.inserted += 1;
                    }
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        // Only a complete feed walk can tell which products disappeared.
        if !outcome.partial {
            for (product_id, entry) in &existing {
                if entry.active && !seen.contains(product_id) {
                    self.store
                        .set_active(vendor_id, product_id, false)
                        .await
                        .map_err(FulfillError::storage)?;
                    outcome.deactivated += 1;
                }
            }
        }

        info!(
            vendor_id,
            inserted = outcome.inserted,
            updated = outcome.updated,
            deactivated = outcome.deactivated,
            partial = outcome.partial,
            "catalog sync finished"
        );
        Ok(outcome)
    }

    /// Sync every enabled vendor with the catalog-sync capability. Failures
    /// are collected per vendor; no vendor blocks another.
    pub async fn sync_all(&self) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::new();
        for vendor_id in self.registry.list_enabled(Capability::CatalogSync) {
            match self.sync_vendor(&vendor_id).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(vendor_id = %vendor_id, error = %err, "vendor sync failed");
                    let mut outcome = SyncOutcome::new(&vendor_id);
                    outcome.errors.push(err.to_string());
                    outcome.partial = true;
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }
}

/// Marks a vendor sync as running for the guard's lifetime.
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    vendor_id: String,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a Mutex<HashSet<String>>, vendor_id: &str) -> Option<Self> {
        let mut held = running.lock().expect("sync run lock poisoned");
        if held.insert(vendor_id.to_string()) {
            Some(Self {
                running,
                vendor_id: vendor_id.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.running.lock().expect("sync run lock poisoned");
        held.remove(&self.vendor_id);
    }
}
