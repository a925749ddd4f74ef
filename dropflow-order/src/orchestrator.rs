use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dropflow_core::{
    AdapterRegistry, CancelOutcome, Capability, ErrorKind, FulfillError, VendorAdapter,
    VendorError, VendorOrderRequest, VendorOrderStatus,
};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};
use uuid::Uuid;

use crate::lease::SubmissionLeases;
use crate::models::{FulfillmentOrder, FulfillmentRequest, OrderState};
use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum automatic retries for transient vendor failures.
    pub max_retries: u32,
    /// Hard ceiling on a single adapter call, regardless of the
    /// adapter-declared timeout.
    pub submit_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            submit_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

/// Routes fulfillment requests to vendor adapters and owns the order
/// lifecycle.
///
/// Explicitly constructed with its dependencies; no ambient singletons, so
/// tests can build isolated instances.
pub struct OrderOrchestrator {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn OrderStore>,
    leases: SubmissionLeases,
    config: OrchestratorConfig,
}

impl OrderOrchestrator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn OrderStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            leases: SubmissionLeases::new(),
            config,
        }
    }

    /// Submit a fulfillment request to a vendor.
    ///
    /// Re-submission with the same idempotency key returns the existing
    /// record without another vendor call. The returned order always carries
    /// an explicit state; a vendor-side failure surfaces as `Failed` with the
    /// reason and kind on the record, not as an `Err`.
    pub async fn create_order(
        &self,
        request: FulfillmentRequest,
        vendor_id: &str,
    ) -> Result<FulfillmentOrder, FulfillError> {
        if let Some(existing) = self.find_existing(&request).await? {
            info!(order_id = %existing.id, key = %existing.idempotency_key,
                "idempotent re-submission, returning existing order");
            return Ok(existing);
        }

        validate_request(&request)?;
        let adapter = self
            .registry
            .get_enabled(vendor_id, Capability::OrderCreation)?;

        let _lease = self.leases.acquire(&request.idempotency_key).ok_or_else(|| {
            FulfillError::Conflict(format!(
                "submission already in flight for idempotency key {}",
                request.idempotency_key
            ))
        })?;

        // Re-check under the lease: a concurrent submission may have landed
        // between the fast-path lookup and lease acquisition.
        if let Some(existing) = self.find_existing(&request).await? {
            return Ok(existing);
        }

        let mut order = FulfillmentOrder::new(request, vendor_id);
        self.store
            .insert(&order)
            .await
            .map_err(FulfillError::storage)?;

        self.submit_with_retries(&mut order, adapter.as_ref())
            .await?;
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<FulfillmentOrder, FulfillError> {
        self.store
            .get(id)
            .await
            .map_err(FulfillError::storage)?
            .ok_or_else(|| FulfillError::NotFound(format!("order not found: {id}")))
    }

    pub async fn list_orders(
        &self,
        vendor_id: Option<&str>,
    ) -> Result<Vec<FulfillmentOrder>, FulfillError> {
        self.store
            .list(vendor_id)
            .await
            .map_err(FulfillError::storage)
    }

    /// Explicit retry of a retry-eligible `Failed` order.
    pub async fn retry_order(&self, id: Uuid) -> Result<FulfillmentOrder, FulfillError> {
        let mut order = self.get_order(id).await?;

        if order.state != OrderState::Failed || !order.retryable {
            return Err(FulfillError::Validation(format!(
                "order {id} is not retry-eligible (state {:?})",
                order.state
            )));
        }

        let adapter = self
            .registry
            .get_enabled(&order.vendor_id, Capability::OrderCreation)?;

        let _lease = self.leases.acquire(&order.idempotency_key).ok_or_else(|| {
            FulfillError::Conflict(format!(
                "submission already in flight for idempotency key {}",
                order.idempotency_key
            ))
        })?;

        order.retry_count += 1;
        order.retryable = false;
        self.submit_with_retries(&mut order, adapter.as_ref())
            .await?;
        Ok(order)
    }

    /// Cancel an order. Only `Pending` and `Accepted` orders can be
    /// cancelled; leaving `Accepted` requires the vendor to confirm.
    pub async fn cancel_order(&self, id: Uuid) -> Result<FulfillmentOrder, FulfillError> {
        let mut order = self.get_order(id).await?;

        match order.state {
            OrderState::Cancelled => Ok(order),
            OrderState::Pending => {
                order.mark_cancelled();
                self.store
                    .update(&order)
                    .await
                    .map_err(FulfillError::storage)?;
                Ok(order)
            }
            OrderState::Accepted => {
                let vendor_order_id = order.vendor_order_id.clone().ok_or_else(|| {
                    FulfillError::Storage(format!("accepted order {id} missing vendor order id"))
                })?;
                let adapter = self.registry.get(&order.vendor_id)?;

                let outcome = timeout(
                    self.effective_timeout(&order.vendor_id),
                    adapter.cancel_order(&vendor_order_id),
                )
                .await
                .map_err(|_| {
                    FulfillError::VendorTransient(format!(
                        "cancellation call to vendor {} timed out",
                        order.vendor_id
                    ))
                })??;

                match outcome {
                    CancelOutcome::Cancelled => {
                        order.mark_cancelled();
                        self.store
                            .update(&order)
                            .await
                            .map_err(FulfillError::storage)?;
                        info!(order_id = %id, vendor_id = %order.vendor_id, "order cancelled");
                        Ok(order)
                    }
                    CancelOutcome::AlreadyShipped => {
                        // State remains Accepted; reconciliation will catch up.
                        Err(FulfillError::Conflict(format!(
                            "vendor {} reports order already shipped, cancellation rejected",
                            order.vendor_id
                        )))
                    }
                }
            }
            state => Err(FulfillError::Validation(format!(
                "order {id} cannot be cancelled from state {state:?}"
            ))),
        }
    }

    /// Single mutation point for externally observed status changes.
    ///
    /// Only forward movement along `Accepted → Shipped → Delivered` is
    /// applied; backward updates are rejected and logged.
    pub async fn apply_status_update(
        &self,
        id: Uuid,
        new_state: OrderState,
        tracking_number: Option<String>,
    ) -> Result<FulfillmentOrder, FulfillError> {
        if !matches!(new_state, OrderState::Shipped | OrderState::Delivered) {
            return Err(FulfillError::Validation(format!(
                "status updates may only move an order to SHIPPED or DELIVERED, got {new_state:?}"
            )));
        }

        let mut order = self.get_order(id).await?;

        let current_rank = order.state.progress_rank().ok_or_else(|| {
            FulfillError::Conflict(format!(
                "order {id} is {:?}, status updates no longer apply",
                order.state
            ))
        })?;
        let new_rank = new_state
            .progress_rank()
            .unwrap_or_default();

        if current_rank < OrderState::Accepted.progress_rank().unwrap_or_default() {
            return Err(FulfillError::Conflict(format!(
                "order {id} has not been accepted by the vendor yet"
            )));
        }
        if new_rank < current_rank {
            warn!(order_id = %id, from = ?order.state, to = ?new_state,
                "rejecting backward status update");
            return Err(FulfillError::Conflict(format!(
                "status update would move order {id} backward ({:?} -> {new_state:?})",
                order.state
            )));
        }
        if new_rank == current_rank {
            // Idempotent re-apply; refresh tracking if provided.
            if tracking_number.is_some() {
                order.tracking_number = tracking_number;
                self.store
                    .update(&order)
                    .await
                    .map_err(FulfillError::storage)?;
            }
            return Ok(order);
        }

        match new_state {
            OrderState::Shipped => order.mark_shipped(tracking_number),
            OrderState::Delivered => order.mark_delivered(),
            _ => unreachable!("guarded above"),
        }
        self.store
            .update(&order)
            .await
            .map_err(FulfillError::storage)?;
        info!(order_id = %id, state = order.state.as_str(), "status update applied");
        Ok(order)
    }

    /// Poll the vendor for the current order status and feed the result
    /// through `apply_status_update`.
    pub async fn reconcile_order(&self, id: Uuid) -> Result<FulfillmentOrder, FulfillError> {
        let order = self.get_order(id).await?;
        let vendor_order_id = order.vendor_order_id.clone().ok_or_else(|| {
            FulfillError::Validation(format!("order {id} has no vendor order id to reconcile"))
        })?;

        // Plain lookup: disabled vendors still get their existing orders
        // reconciled.
        let adapter = self.registry.get(&order.vendor_id)?;
        let status = timeout(
            self.effective_timeout(&order.vendor_id),
            adapter.get_order_status(&vendor_order_id),
        )
        .await
        .map_err(|_| {
            FulfillError::VendorTransient(format!(
                "status poll to vendor {} timed out",
                order.vendor_id
            ))
        })??;

        match status {
            VendorOrderStatus::Accepted | VendorOrderStatus::Unknown => Ok(order),
            VendorOrderStatus::Shipped { tracking_number } => {
                self.apply_status_update(id, OrderState::Shipped, tracking_number)
                    .await
            }
            VendorOrderStatus::Delivered => {
                self.apply_status_update(id, OrderState::Delivered, None)
                    .await
            }
            VendorOrderStatus::Cancelled => {
                let mut order = order;
                if order.state == OrderState::Accepted {
                    order.mark_cancelled();
                    self.store
                        .update(&order)
                        .await
                        .map_err(FulfillError::storage)?;
                    info!(order_id = %id, "vendor reports order cancelled");
                } else if order.state != OrderState::Cancelled {
                    warn!(order_id = %id, state = ?order.state,
                        "vendor reports cancellation for an order past acceptance, ignoring");
                }
                Ok(order)
            }
        }
    }

    /// Watchdog sweep: force `Submitting` records older than the submit
    /// timeout into retry-eligible `Failed` so no order is left in-flight
    /// forever (covers process crashes mid-submission).
    pub async fn expire_stuck_submissions(&self) -> Result<usize, FulfillError> {
        let cutoff = Utc::now()
            - chrono::Duration::milliseconds(self.config.submit_timeout.as_millis() as i64);
        let stuck = self
            .store
            .list_submitting_older_than(cutoff)
            .await
            .map_err(FulfillError::storage)?;

        let mut expired = 0;
        for mut order in stuck {
            // A live lease means the submission is still in flight in this
            // process and will resolve the state itself.
            if self.leases.is_held(&order.idempotency_key) {
                continue;
            }
            let retryable = order.retry_count < self.config.max_retries;
            warn!(order_id = %order.id, vendor_id = %order.vendor_id, retryable,
                "forcing stuck submission to FAILED");
            order.mark_failed(
                ErrorKind::VendorTransient,
                "submission exceeded timeout and was expired by the watchdog",
                retryable,
            );
            self.store
                .update(&order)
                .await
                .map_err(FulfillError::storage)?;
            expired += 1;
        }
        Ok(expired)
    }

    async fn find_existing(
        &self,
        request: &FulfillmentRequest,
    ) -> Result<Option<FulfillmentOrder>, FulfillError> {
        let existing = self
            .store
            .get_by_idempotency_key(&request.idempotency_key)
            .await
            .map_err(FulfillError::storage)?;

        match existing {
            None => Ok(None),
            Some(order) if order.request_fingerprint == request.fingerprint() => Ok(Some(order)),
            Some(order) => Err(FulfillError::Conflict(format!(
                "idempotency key {} was already used with a different request body (order {})",
                request.idempotency_key, order.id
            ))),
        }
    }

    /// Attempt the vendor call, retrying transient failures with exponential
    /// backoff up to the configured maximum. Every intermediate outcome is
    /// persisted so a crash never loses the lifecycle position.
    async fn submit_with_retries(
        &self,
        order: &mut FulfillmentOrder,
        adapter: &dyn VendorAdapter,
    ) -> Result<(), FulfillError> {
        let wire = VendorOrderRequest {
            reference: order.id.to_string(),
            items: order.request.items.clone(),
            destination: order.request.destination.clone(),
            buyer: order.request.buyer.clone(),
            notes: order.request.notes.clone(),
        };
        let call_timeout = self.effective_timeout(&order.vendor_id);

        loop {
            order.mark_submitting();
            self.store
                .update(order)
                .await
                .map_err(FulfillError::storage)?;

            let attempt = timeout(call_timeout, adapter.create_order(&wire)).await;
            let transient_reason = match attempt {
                Ok(Ok(receipt)) => {
                    order.mark_accepted(&receipt);
                    self.store
                        .update(order)
                        .await
                        .map_err(FulfillError::storage)?;
                    info!(order_id = %order.id, vendor_id = %order.vendor_id,
                        vendor_order_id = %receipt.vendor_order_id,
                        retries = order.retry_count, "order accepted by vendor");
                    return Ok(());
                }
                Ok(Err(VendorError::Permanent(reason))) => {
                    order.mark_failed(ErrorKind::VendorPermanent, &reason, false);
                    self.store
                        .update(order)
                        .await
                        .map_err(FulfillError::storage)?;
                    warn!(order_id = %order.id, vendor_id = %order.vendor_id, %reason,
                        "vendor rejected order, not retryable");
                    return Ok(());
                }
                Ok(Err(VendorError::Transient(reason))) => reason,
                Err(_) => format!("vendor call timed out after {call_timeout:?}"),
            };

            if order.retry_count >= self.config.max_retries {
                order.mark_failed(ErrorKind::VendorTransient, &transient_reason, false);
                self.store
                    .update(order)
                    .await
                    .map_err(FulfillError::storage)?;
                warn!(order_id = %order.id, vendor_id = %order.vendor_id,
                    retries = order.retry_count, reason = %transient_reason,
                    "retry budget exhausted, order failed");
                return Ok(());
            }

            order.retry_count += 1;
            order.mark_failed(ErrorKind::VendorTransient, &transient_reason, true);
            self.store
                .update(order)
                .await
                .map_err(FulfillError::storage)?;

            let backoff = self.backoff_for(order.retry_count);
            warn!(order_id = %order.id, vendor_id = %order.vendor_id,
                attempt = order.retry_count, backoff_ms = backoff.as_millis() as u64,
                reason = %transient_reason, "transient vendor failure, backing off");
            sleep(backoff).await;
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.config
            .backoff_base
            .saturating_mul(factor)
            .min(self.config.backoff_cap)
    }

    fn effective_timeout(&self, vendor_id: &str) -> Duration {
        match self.registry.timeout_for(vendor_id) {
            Some(declared) => declared.min(self.config.submit_timeout),
            None => self.config.submit_timeout,
        }
    }
}

fn validate_request(request: &FulfillmentRequest) -> Result<(), FulfillError> {
    if request.idempotency_key.trim().is_empty() {
        return Err(FulfillError::Validation(
            "idempotency key must not be empty".into(),
        ));
    }
    if request.items.is_empty() {
        return Err(FulfillError::Validation(
            "request must contain at least one line item".into(),
        ));
    }
    for item in &request.items {
        if item.quantity == 0 {
            return Err(FulfillError::Validation(format!(
                "line item {} has zero quantity",
                item.vendor_product_id
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(FulfillError::Validation(format!(
                "line item {} has a negative unit price",
                item.vendor_product_id
            )));
        }
    }
    let destination = &request.destination;
    if destination.line1.trim().is_empty()
        || destination.city.trim().is_empty()
        || destination.country.trim().is_empty()
    {
        return Err(FulfillError::Validation(
            "destination address is not resolvable".into(),
        ));
    }
    Ok(())
}
