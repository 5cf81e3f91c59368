//! Postgres-backed batch repository.
//!
//! ## Schema
//!
//! ```text
//! batches      (id, reference UNIQUE, sku, purchased_quantity, eta)
//! order_lines  (id, orderid, sku, qty)
//! allocations  (id, orderline_id -> order_lines, batch_id -> batches)
//! ```
//!
//! `add()` runs in one transaction: upsert the batch row, drop the order lines
//! previously linked to it (allocations cascade), then insert the current
//! lines and their links.
//!
//! ## Error Mapping
//!
//! | SQLx Error | RepositoryError |
//! |------------|-----------------|
//! | Database / PoolClosed / Io / other | `Storage` |
//! | Row decode failure, negative quantities | `Corrupt` |
//! | No batch row for the reference | `NotFound` |

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use batchalloc_allocation::{Batch, OrderLine};
use batchalloc_core::{BatchReference, OrderReference, Sku};

use super::r#trait::{BatchRepository, RepositoryError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        id BIGSERIAL PRIMARY KEY,
        reference TEXT NOT NULL UNIQUE,
        sku TEXT NOT NULL,
        purchased_quantity BIGINT NOT NULL CHECK (purchased_quantity >= 0),
        eta DATE NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS batches_sku_idx ON batches (sku)",
    r#"
    CREATE TABLE IF NOT EXISTS order_lines (
        id BIGSERIAL PRIMARY KEY,
        orderid TEXT NOT NULL,
        sku TEXT NOT NULL,
        qty BIGINT NOT NULL CHECK (qty >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS allocations (
        id BIGSERIAL PRIMARY KEY,
        orderline_id BIGINT NOT NULL REFERENCES order_lines (id) ON DELETE CASCADE,
        batch_id BIGINT NOT NULL REFERENCES batches (id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS allocations_batch_idx ON allocations (batch_id)",
];

/// Postgres-backed batch repository.
///
/// The `BatchRepository` trait is synchronous; the async methods on this type
/// are the real implementation and the trait impl drives them on the tokio
/// runtime captured at construction.
#[derive(Debug, Clone)]
pub struct PostgresBatchRepository {
    pool: Arc<PgPool>,
    runtime: tokio::runtime::Handle,
}

impl PostgresBatchRepository {
    /// Create a repository over `pool`, driven by `runtime`.
    ///
    /// Trait calls made from inside a tokio runtime need the multi-thread flavor.
    pub fn new(pool: PgPool, runtime: tokio::runtime::Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    /// Create the tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        debug!("batch schema ready");
        Ok(())
    }

    /// Upsert a batch and replace its allocation set.
    #[instrument(
        skip(self, batch),
        fields(reference = %batch.reference(), allocations = batch.allocations().count()),
        err
    )]
    pub async fn save(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let batch_id = upsert_batch(&mut tx, batch).await?;

        sqlx::query(
            r#"
            DELETE FROM order_lines
            WHERE id IN (SELECT orderline_id FROM allocations WHERE batch_id = $1)
            "#,
        )
        .bind(batch_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("clear_allocations", e))?;

        for line in batch.allocations() {
            let orderline_id: i64 = sqlx::query(
                "INSERT INTO order_lines (orderid, sku, qty) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(line.reference().as_str())
            .bind(line.sku().as_str())
            .bind(to_db_quantity(line.quantity())?)
            .fetch_one(&mut *tx)
            .await
            .and_then(|row| row.try_get("id"))
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;

            sqlx::query("INSERT INTO allocations (orderline_id, batch_id) VALUES ($1, $2)")
                .bind(orderline_id)
                .bind(batch_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_allocation", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    /// Load a batch with its allocations.
    #[instrument(skip(self, reference), fields(reference = %reference), err)]
    pub async fn load(&self, reference: &BatchReference) -> Result<Batch, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, reference, sku, purchased_quantity, eta
            FROM batches
            WHERE reference = $1
            "#,
        )
        .bind(reference.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_batch", e))?
        .ok_or_else(|| RepositoryError::NotFound(reference.clone()))?;

        let batch_row = BatchRow::from_row(&row).map_err(corrupt)?;
        self.hydrate(batch_row).await
    }

    /// Load every batch for a SKU, in insertion order.
    #[instrument(skip(self, sku), fields(sku = %sku), err)]
    pub async fn load_for_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, reference, sku, purchased_quantity, eta
            FROM batches
            WHERE sku = $1
            ORDER BY id ASC
            "#,
        )
        .bind(sku.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_for_sku", e))?;

        let mut batches = Vec::with_capacity(rows.len());
        for row in rows {
            let batch_row = BatchRow::from_row(&row).map_err(corrupt)?;
            batches.push(self.hydrate(batch_row).await?);
        }
        debug!(count = batches.len(), "loaded batches for sku");
        Ok(batches)
    }

    async fn hydrate(&self, row: BatchRow) -> Result<Batch, RepositoryError> {
        let line_rows = sqlx::query(
            r#"
            SELECT order_lines.orderid, order_lines.sku, order_lines.qty
            FROM order_lines
            JOIN allocations ON allocations.orderline_id = order_lines.id
            WHERE allocations.batch_id = $1
            "#,
        )
        .bind(row.id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_allocations", e))?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for line_row in &line_rows {
            let line = OrderLineRow::from_row(line_row).map_err(corrupt)?;
            lines.push(OrderLine::new(
                OrderReference::new(line.orderid),
                Sku::new(line.sku),
                from_db_quantity("qty", line.qty)?,
            ));
        }

        Ok(Batch::restore(
            BatchReference::new(row.reference),
            Sku::new(row.sku),
            from_db_quantity("purchased_quantity", row.purchased_quantity)?,
            row.eta,
            lines,
        ))
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        // Inside a runtime worker we must yield the thread before blocking on it.
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.runtime.block_on(future))
        } else {
            self.runtime.block_on(future)
        }
    }
}

impl BatchRepository for PostgresBatchRepository {
    fn add(&self, batch: &Batch) -> Result<(), RepositoryError> {
        self.block_on(self.save(batch))
    }

    fn get(&self, reference: &BatchReference) -> Result<Batch, RepositoryError> {
        self.block_on(self.load(reference))
    }

    fn list_for_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        self.block_on(self.load_for_sku(sku))
    }
}

async fn upsert_batch(
    tx: &mut Transaction<'_, Postgres>,
    batch: &Batch,
) -> Result<i64, RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO batches (reference, sku, purchased_quantity, eta)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (reference) DO UPDATE
        SET sku = EXCLUDED.sku,
            purchased_quantity = EXCLUDED.purchased_quantity,
            eta = EXCLUDED.eta
        RETURNING id
        "#,
    )
    .bind(batch.reference().as_str())
    .bind(batch.sku().as_str())
    .bind(to_db_quantity(batch.purchased_quantity())?)
    .bind(batch.eta())
    .fetch_one(&mut **tx)
    .await
    .and_then(|row| row.try_get("id"))
    .map_err(|e| map_sqlx_error("upsert_batch", e))
}

// SQLx row types

#[derive(Debug)]
struct BatchRow {
    id: i64,
    reference: String,
    sku: String,
    purchased_quantity: i64,
    eta: Option<NaiveDate>,
}

impl<'r> FromRow<'r, PgRow> for BatchRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(BatchRow {
            id: row.try_get("id")?,
            reference: row.try_get("reference")?,
            sku: row.try_get("sku")?,
            purchased_quantity: row.try_get("purchased_quantity")?,
            eta: row.try_get("eta")?,
        })
    }
}

#[derive(Debug)]
struct OrderLineRow {
    orderid: String,
    sku: String,
    qty: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderLineRow {
            orderid: row.try_get("orderid")?,
            sku: row.try_get("sku")?,
            qty: row.try_get("qty")?,
        })
    }
}

fn to_db_quantity(quantity: u64) -> Result<i64, RepositoryError> {
    i64::try_from(quantity)
        .map_err(|_| RepositoryError::Storage(format!("quantity {quantity} exceeds BIGINT range")))
}

fn from_db_quantity(column: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::Corrupt(format!("negative {column}: {value}")))
}

fn corrupt(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Corrupt(format!("failed to decode row: {err}"))
}

/// Map SQLx errors to repository errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            RepositoryError::Storage(format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            RepositoryError::Corrupt(format!("{operation}: {err}"))
        }
        _ => RepositoryError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
