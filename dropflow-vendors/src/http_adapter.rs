use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropflow_core::{
    Address, CancelOutcome, LineItem, ProductPage, ShippingRate, VendorAdapter, VendorError,
    VendorOrderReceipt, VendorOrderRequest, VendorOrderStatus, VendorProduct,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JSON-over-HTTP vendor adapter.
///
/// Talks to vendors exposing a conventional REST surface and translates both
/// directions: the uniform contract out, vendor wire shapes back in. All
/// transport and status-code failures are mapped into the
/// transient/permanent classification; anything unclassifiable defaults to
/// transient, since retrying is safer than dropping an order.
pub struct HttpVendorAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVendorAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn classify_transport(err: reqwest::Error) -> VendorError {
    // Timeouts, connection resets and the like are worth retrying.
    VendorError::Transient(format!("transport failure: {err}"))
}

fn classify_status(status: StatusCode, body: &str) -> VendorError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        VendorError::Transient(detail)
    } else if status.is_client_error() {
        VendorError::Permanent(detail)
    } else {
        // Unexpected but not obviously fatal.
        VendorError::Transient(detail)
    }
}

async fn read_error(response: reqwest::Response) -> VendorError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(status, &body)
}

#[derive(Serialize)]
struct WireItem<'a> {
    sku: &'a str,
    quantity: u32,
    unit_price_cents: i64,
}

#[derive(Serialize)]
struct WireOrder<'a> {
    reference: &'a str,
    items: Vec<WireItem<'a>>,
    destination: &'a Address,
    customer_name: &'a str,
    customer_email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireOrderReply {
    order_id: String,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct WireStatusReply {
    status: String,
    #[serde(default)]
    tracking_number: Option<String>,
}

#[derive(Deserialize)]
struct WireProduct {
    sku: String,
    name: String,
    price_cents: i64,
    #[serde(default = "default_currency")]
    currency: String,
    in_stock: bool,
    #[serde(default)]
    stock_quantity: Option<i64>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Deserialize)]
struct WireProductPage {
    products: Vec<WireProduct>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Serialize)]
struct WireQuoteRequest<'a> {
    items: Vec<WireItem<'a>>,
    destination: &'a Address,
}

#[derive(Deserialize)]
struct WireQuoteReply {
    cost_cents: i64,
    currency: String,
    eta_days: u32,
}

fn wire_items(items: &[LineItem]) -> Vec<WireItem<'_>> {
    items
        .iter()
        .map(|item| WireItem {
            sku: &item.vendor_product_id,
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
        })
        .collect()
}

#[async_trait]
impl VendorAdapter for HttpVendorAdapter {
    async fn create_order(
        &self,
        request: &VendorOrderRequest,
    ) -> Result<VendorOrderReceipt, VendorError> {
        let body = WireOrder {
            reference: &request.reference,
            items: wire_items(&request.items),
            destination: &request.destination,
            customer_name: &request.buyer.name,
            customer_email: &request.buyer.email,
            notes: request.notes.as_deref(),
        };

        let response = self
            .client
            .post(self.url("/orders"))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let reply: WireOrderReply = response
            .json()
            .await
            .map_err(|e| VendorError::Transient(format!("malformed order reply: {e}")))?;
        debug!(vendor_order_id = %reply.order_id, reference = %request.reference,
            "vendor accepted order");
        Ok(VendorOrderReceipt {
            vendor_order_id: reply.order_id,
            tracking_number: reply.tracking_number,
            estimated_delivery: reply.estimated_delivery,
        })
    }

    async fn get_order_status(
        &self,
        vendor_order_id: &str,
    ) -> Result<VendorOrderStatus, VendorError> {
        let response = self
            .client
            .get(self.url(&format!("/orders/{vendor_order_id}")))
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let reply: WireStatusReply = response
            .json()
            .await
            .map_err(|e| VendorError::Transient(format!("malformed status reply: {e}")))?;

        Ok(match reply.status.as_str() {
            "accepted" | "processing" => VendorOrderStatus::Accepted,
            "shipped" => VendorOrderStatus::Shipped {
                tracking_number: reply.tracking_number,
            },
            "delivered" => VendorOrderStatus::Delivered,
            "cancelled" => VendorOrderStatus::Cancelled,
            _ => VendorOrderStatus::Unknown,
        })
    }

    async fn cancel_order(&self, vendor_order_id: &str) -> Result<CancelOutcome, VendorError> {
        let response = self
            .client
            .post(self.url(&format!("/orders/{vendor_order_id}/cancel")))
            .send()
            .await
            .map_err(classify_transport)?;

        // Vendors answer an uncancellable (already shipped) order with 409.
        if response.status() == StatusCode::CONFLICT {
            return Ok(CancelOutcome::AlreadyShipped);
        }
        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        Ok(CancelOutcome::Cancelled)
    }

    async fn list_products(&self, page_token: Option<&str>) -> Result<ProductPage, VendorError> {
        let mut request = self.client.get(self.url("/products"));
        if let Some(token) = page_token {
            request = request.query(&[("page", token)]);
        }

        let response = request.send().await.map_err(classify_transport)?;
        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let reply: WireProductPage = response
            .json()
            .await
            .map_err(|e| VendorError::Transient(format!("malformed product page: {e}")))?;

        Ok(ProductPage {
            items: reply
                .products
                .into_iter()
                .map(|p| VendorProduct {
                    vendor_product_id: p.sku,
                    name: p.name,
                    price_cents: p.price_cents,
                    currency: p.currency,
                    in_stock: p.in_stock,
                    stock_quantity: p.stock_quantity,
                })
                .collect(),
            next_page_token: reply.next_page,
        })
    }

    async fn quote_shipping(
        &self,
        items: &[LineItem],
        destination: &Address,
    ) -> Result<ShippingRate, VendorError> {
        let body = WireQuoteRequest {
            items: wire_items(items),
            destination,
        };

        let response = self
            .client
            .post(self.url("/shipping/quote"))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let reply: WireQuoteReply = response
            .json()
            .await
            .map_err(|e| VendorError::Transient(format!("malformed quote reply: {e}")))?;
        Ok(ShippingRate {
            cost_cents: reply.cost_cents,
            currency: reply.currency,
            eta_days: reply.eta_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_classify_as_transient() {
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            VendorError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            VendorError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::REQUEST_TIMEOUT, ""),
            VendorError::Transient(_)
        ));
    }

    #[test]
    fn client_errors_classify_as_permanent() {
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "bad sku"),
            VendorError::Permanent(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, ""),
            VendorError::Permanent(_)
        ));
    }

    #[test]
    fn unknown_statuses_default_to_transient() {
        assert!(matches!(
            classify_status(StatusCode::MOVED_PERMANENTLY, ""),
            VendorError::Transient(_)
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let adapter =
            HttpVendorAdapter::new("https://vendor.test/", Duration::from_secs(5)).unwrap();
        assert_eq!(adapter.url("/orders"), "https://vendor.test/orders");
    }
}
