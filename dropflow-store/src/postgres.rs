use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropflow_catalog::{CatalogEntry, CatalogStore};
use dropflow_core::{ErrorKind, StoreError};
use dropflow_order::models::OrderState;
use dropflow_order::{FulfillmentOrder, FulfillmentRequest, OrderStore};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(10).connect(url).await
}

/// Idempotent schema bootstrap; safe to run on every startup.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fulfillment_orders (
            id UUID PRIMARY KEY,
            idempotency_key TEXT NOT NULL UNIQUE,
            request_fingerprint BIGINT NOT NULL,
            vendor_id TEXT NOT NULL,
            vendor_order_id TEXT,
            state TEXT NOT NULL,
            tracking_number TEXT,
            estimated_delivery TIMESTAMPTZ,
            delivered_at TIMESTAMPTZ,
            last_error TEXT,
            last_error_kind TEXT,
            retry_count INT NOT NULL,
            retryable BOOLEAN NOT NULL,
            request TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_entries (
            vendor_id TEXT NOT NULL,
            vendor_product_id TEXT NOT NULL,
            local_product_id UUID NOT NULL,
            name TEXT NOT NULL,
            price_cents BIGINT NOT NULL,
            currency TEXT NOT NULL,
            in_stock BOOLEAN NOT NULL,
            stock_quantity BIGINT,
            active BOOLEAN NOT NULL,
            last_synced_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (vendor_id, vendor_product_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Postgres-backed order store.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn order_from_row(row: &PgRow) -> Result<FulfillmentOrder, StoreError> {
    let state_text: String = row.try_get("state")?;
    let state = OrderState::parse(&state_text)
        .ok_or_else(|| format!("unknown order state in database: {state_text}"))?;

    let kind_text: Option<String> = row.try_get("last_error_kind")?;
    let last_error_kind = match kind_text {
        Some(text) => Some(
            ErrorKind::parse(&text)
                .ok_or_else(|| format!("unknown error kind in database: {text}"))?,
        ),
        None => None,
    };

    let request_json: String = row.try_get("request")?;
    let request: FulfillmentRequest = serde_json::from_str(&request_json)?;

    let retry_count: i32 = row.try_get("retry_count")?;

    Ok(FulfillmentOrder {
        id: row.try_get("id")?,
        idempotency_key: row.try_get("idempotency_key")?,
        request_fingerprint: row.try_get("request_fingerprint")?,
        vendor_id: row.try_get("vendor_id")?,
        vendor_order_id: row.try_get("vendor_order_id")?,
        state,
        tracking_number: row.try_get("tracking_number")?,
        estimated_delivery: row.try_get("estimated_delivery")?,
        delivered_at: row.try_get("delivered_at")?,
        last_error: row.try_get("last_error")?,
        last_error_kind,
        retry_count: retry_count.max(0) as u32,
        retryable: row.try_get("retryable")?,
        request,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &FulfillmentOrder) -> Result<(), StoreError> {
        let request_json = serde_json::to_string(&order.request)?;
        sqlx::query(
            r#"
            INSERT INTO fulfillment_orders (
                id, idempotency_key, request_fingerprint, vendor_id, vendor_order_id,
                state, tracking_number, estimated_delivery, delivered_at,
                last_error, last_error_kind, retry_count, retryable, request,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id)
        .bind(&order.idempotency_key)
        .bind(order.request_fingerprint)
        .bind(&order.vendor_id)
        .bind(&order.vendor_order_id)
        .bind(order.state.as_str())
        .bind(&order.tracking_number)
        .bind(order.estimated_delivery)
        .bind(order.delivered_at)
        .bind(&order.last_error)
        .bind(order.last_error_kind.map(|k| k.as_str()))
        .bind(order.retry_count as i32)
        .bind(order.retryable)
        .bind(request_json)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, order: &FulfillmentOrder) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE fulfillment_orders SET
                vendor_order_id = $2, state = $3, tracking_number = $4,
                estimated_delivery = $5, delivered_at = $6, last_error = $7,
                last_error_kind = $8, retry_count = $9, retryable = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(&order.vendor_order_id)
        .bind(order.state.as_str())
        .bind(&order.tracking_number)
        .bind(order.estimated_delivery)
        .bind(order.delivered_at)
        .bind(&order.last_error)
        .bind(order.last_error_kind.map(|k| k.as_str()))
        .bind(order.retry_count as i32)
        .bind(order.retryable)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("unknown order: {}", order.id).into());
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FulfillmentOrder>, StoreError> {
        let row = sqlx::query("SELECT * FROM fulfillment_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn get_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<FulfillmentOrder>, StoreError> {
        let row = sqlx::query("SELECT * FROM fulfillment_orders WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list(&self, vendor_id: Option<&str>) -> Result<Vec<FulfillmentOrder>, StoreError> {
        let rows = match vendor_id {
            Some(vendor_id) => {
                sqlx::query(
                    "SELECT * FROM fulfillment_orders WHERE vendor_id = $1 ORDER BY created_at",
                )
                .bind(vendor_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM fulfillment_orders ORDER BY created_at")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(order_from_row).collect()
    }

    async fn list_submitting_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FulfillmentOrder>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM fulfillment_orders WHERE state = 'SUBMITTING' AND updated_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }
}

/// Postgres-backed catalog store.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &PgRow) -> Result<CatalogEntry, StoreError> {
    Ok(CatalogEntry {
        vendor_id: row.try_get("vendor_id")?,
        vendor_product_id: row.try_get("vendor_product_id")?,
        local_product_id: row.try_get("local_product_id")?,
        name: row.try_get("name")?,
        price_cents: row.try_get("price_cents")?,
        currency: row.try_get("currency")?,
        in_stock: row.try_get("in_stock")?,
        stock_quantity: row.try_get("stock_quantity")?,
        active: row.try_get("active")?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn upsert(&self, entry: &CatalogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO catalog_entries (
                vendor_id, vendor_product_id, local_product_id, name, price_cents,
                currency, in_stock, stock_quantity, active, last_synced_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (vendor_id, vendor_product_id) DO UPDATE SET
                name = EXCLUDED.name, price_cents = EXCLUDED.price_cents,
                currency = EXCLUDED.currency, in_stock = EXCLUDED.in_stock,
                stock_quantity = EXCLUDED.stock_quantity, active = EXCLUDED.active,
                last_synced_at = EXCLUDED.last_synced_at
            "#,
        )
        .bind(&entry.vendor_id)
        .bind(&entry.vendor_product_id)
        .bind(entry.local_product_id)
        .bind(&entry.name)
        .bind(entry.price_cents)
        .bind(&entry.currency)
        .bind(entry.in_stock)
        .bind(entry.stock_quantity)
        .bind(entry.active)
        .bind(entry.last_synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        vendor_id: &str,
        vendor_product_id: &str,
    ) -> Result<Option<CatalogEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM catalog_entries WHERE vendor_id = $1 AND vendor_product_id = $2",
        )
        .bind(vendor_id)
        .bind(vendor_product_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<CatalogEntry>, StoreError> {
        let rows = if include_inactive {
            sqlx::query(
                "SELECT * FROM catalog_entries WHERE vendor_id = $1 ORDER BY vendor_product_id",
            )
            .bind(vendor_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM catalog_entries WHERE vendor_id = $1 AND active ORDER BY vendor_product_id",
            )
            .bind(vendor_id)
            .fetch_all(&self.pool)
            .await?
        };
        rows.iter().map(entry_from_row).collect()
    }

    async fn set_active(
        &self,
        vendor_id: &str,
        vendor_product_id: &str,
        active: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE catalog_entries SET active = $3 WHERE vendor_id = $1 AND vendor_product_id = $2",
        )
        .bind(vendor_id)
        .bind(vendor_product_id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!(
                "unknown catalog entry: {vendor_id}/{vendor_product_id}"
            )
            .into());
        }
        Ok(())
    }
}
