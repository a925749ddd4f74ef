use chrono::{DateTime, Utc};
use dropflow_core::{Address, Contact, ErrorKind, LineItem, VendorOrderReceipt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lifecycle of a fulfillment attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Pending,
    Submitting,
    Accepted,
    Shipped,
    Delivered,
    Failed,
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "PENDING",
            OrderState::Submitting => "SUBMITTING",
            OrderState::Accepted => "ACCEPTED",
            OrderState::Shipped => "SHIPPED",
            OrderState::Delivered => "DELIVERED",
            OrderState::Failed => "FAILED",
            OrderState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(OrderState::Pending),
            "SUBMITTING" => Some(OrderState::Submitting),
            "ACCEPTED" => Some(OrderState::Accepted),
            "SHIPPED" => Some(OrderState::Shipped),
            "DELIVERED" => Some(OrderState::Delivered),
            "FAILED" => Some(OrderState::Failed),
            "CANCELLED" => Some(OrderState::Cancelled),
            _ => None,
        }
    }

    /// Position along the happy path, used to reject backward status updates.
    pub fn progress_rank(&self) -> Option<u8> {
        match self {
            OrderState::Pending => Some(0),
            OrderState::Submitting => Some(1),
            OrderState::Accepted => Some(2),
            OrderState::Shipped => Some(3),
            OrderState::Delivered => Some(4),
            OrderState::Failed | OrderState::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Delivered | OrderState::Failed | OrderState::Cancelled
        )
    }
}

/// What the checkout flow submits. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentRequest {
    pub items: Vec<LineItem>,
    pub destination: Address,
    pub buyer: Contact,
    #[serde(default)]
    pub notes: Option<String>,
    pub idempotency_key: String,
}

/// Canonical projection of the material request body for fingerprinting.
/// Field order is part of the stored format; do not reorder.
#[derive(Serialize)]
struct FingerprintView<'a> {
    items: &'a [LineItem],
    destination: &'a Address,
    buyer: &'a Contact,
    notes: &'a Option<String>,
}

impl FulfillmentRequest {
    /// Stable fingerprint of the material request body. The same idempotency
    /// key with a different fingerprint is a caller bug and is rejected as a
    /// conflict instead of silently returning the earlier order.
    ///
    /// SHA-256 over the canonical JSON serialization, truncated to 64 bits.
    /// Fingerprints are persisted and compared across releases, so the
    /// algorithm must never drift.
    pub fn fingerprint(&self) -> i64 {
        let view = FingerprintView {
            items: &self.items,
            destination: &self.destination,
            buyer: &self.buyer,
            notes: &self.notes,
        };
        let canonical =
            serde_json::to_vec(&view).expect("fingerprint view is always serializable");
        let digest = Sha256::digest(&canonical);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(prefix)
    }
}

/// Durable record of one fulfillment attempt against one vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentOrder {
    pub id: Uuid,
    pub idempotency_key: String,
    pub request_fingerprint: i64,
    pub vendor_id: String,
    pub vendor_order_id: Option<String>,
    pub state: OrderState,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub retry_count: u32,
    /// Whether an explicit retry may move this order out of `Failed`.
    pub retryable: bool,
    /// Original request, kept so retries can replay the same payload.
    pub request: FulfillmentRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FulfillmentOrder {
    pub fn new(request: FulfillmentRequest, vendor_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            idempotency_key: request.idempotency_key.clone(),
            request_fingerprint: request.fingerprint(),
            vendor_id: vendor_id.to_string(),
            vendor_order_id: None,
            state: OrderState::Pending,
            tracking_number: None,
            estimated_delivery: None,
            delivered_at: None,
            last_error: None,
            last_error_kind: None,
            retry_count: 0,
            retryable: false,
            request,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn mark_submitting(&mut self) {
        self.state = OrderState::Submitting;
        self.touch();
    }

    pub fn mark_accepted(&mut self, receipt: &VendorOrderReceipt) {
        self.state = OrderState::Accepted;
        self.vendor_order_id = Some(receipt.vendor_order_id.clone());
        if receipt.tracking_number.is_some() {
            self.tracking_number = receipt.tracking_number.clone();
        }
        self.estimated_delivery = receipt.estimated_delivery;
        self.last_error = None;
        self.last_error_kind = None;
        self.touch();
    }

    pub fn mark_failed(&mut self, kind: ErrorKind, reason: &str, retryable: bool) {
        self.state = OrderState::Failed;
        self.last_error = Some(reason.to_string());
        self.last_error_kind = Some(kind);
        self.retryable = retryable;
        self.touch();
    }

    pub fn mark_cancelled(&mut self) {
        self.state = OrderState::Cancelled;
        self.touch();
    }

    pub fn mark_shipped(&mut self, tracking_number: Option<String>) {
        self.state = OrderState::Shipped;
        if tracking_number.is_some() {
            self.tracking_number = tracking_number;
        }
        self.touch();
    }

    pub fn mark_delivered(&mut self) {
        self.state = OrderState::Delivered;
        self.delivered_at = Some(Utc::now());
        self.touch();
    }
}
