//! Allocation use cases (application-level orchestration).
//!
//! ```text
//! OrderLine
//!   ↓
//! 1. Load every batch for the line's SKU (repository)
//!   ↓
//! 2. Pick and mutate one batch (pure domain: `batchalloc_allocation::allocate`)
//!   ↓
//! 3. Persist the chosen batch (repository)
//! ```
//!
//! The service holds no state besides the repository and performs no locking.
//! Two allocations racing for the same SKU can both read the same availability;
//! callers serialize per SKU.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, instrument, warn};

use batchalloc_allocation::{AllocationError, Batch, OrderLine, allocate};
use batchalloc_core::{BatchReference, DomainError, Sku};

use crate::repository::{BatchRepository, RepositoryError};

/// Error surfaced by [`AllocationService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before touching storage.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// No batch could take the line; nothing was persisted.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Storage failures, passed through unchanged.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    pub fn is_out_of_stock(&self) -> bool {
        matches!(self, ServiceError::Allocation(AllocationError::OutOfStock { .. }))
    }
}

/// Allocation use cases over a [`BatchRepository`].
#[derive(Debug)]
pub struct AllocationService<R> {
    repository: R,
}

impl<R> AllocationService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

impl<R> AllocationService<R>
where
    R: BatchRepository,
{
    /// Register a new batch of stock.
    #[instrument(skip(self, reference, sku), fields(reference = %reference, sku = %sku), err)]
    pub fn add_batch(
        &self,
        reference: BatchReference,
        sku: Sku,
        quantity: u64,
        eta: Option<NaiveDate>,
    ) -> Result<Batch, ServiceError> {
        let batch = Batch::new(reference, sku, quantity, eta);
        self.repository.add(&batch)?;
        info!("batch added");
        Ok(batch)
    }

    /// Allocate a line to the best batch of its SKU and persist that batch.
    ///
    /// On `OutOfStock` nothing is written.
    #[instrument(
        skip(self, line),
        fields(order = %line.reference(), sku = %line.sku(), quantity = line.quantity()),
        err
    )]
    pub fn allocate(&self, line: OrderLine) -> Result<BatchReference, ServiceError> {
        if line.quantity() == 0 {
            return Err(DomainError::validation("order line quantity must be positive").into());
        }

        let mut batches = self.repository.list_for_sku(line.sku())?;
        let chosen = match allocate(&line, &mut batches) {
            Ok(reference) => reference,
            Err(err) => {
                warn!(candidates = batches.len(), "no batch can take the line");
                return Err(err.into());
            }
        };

        let batch = batches
            .iter()
            .find(|batch| batch.reference() == &chosen)
            .ok_or_else(|| RepositoryError::NotFound(chosen.clone()))?;
        self.repository.add(batch)?;

        info!(batch = %chosen, available = batch.available_quantity(), "line allocated");
        Ok(chosen)
    }

    /// Release a line from a batch and persist the batch.
    ///
    /// Releasing a line the batch does not hold is not an error.
    #[instrument(
        skip(self, reference, line),
        fields(batch = %reference, order = %line.reference()),
        err
    )]
    pub fn deallocate(
        &self,
        reference: &BatchReference,
        line: &OrderLine,
    ) -> Result<Batch, ServiceError> {
        let mut batch = self.repository.get(reference)?;
        if !batch.is_allocated(line) {
            info!("line not allocated to batch; nothing to release");
            return Ok(batch);
        }

        batch.deallocate(line);
        self.repository.add(&batch)?;
        info!(available = batch.available_quantity(), "line deallocated");
        Ok(batch)
    }

    /// Look up a batch by reference.
    pub fn batch(&self, reference: &BatchReference) -> Result<Batch, ServiceError> {
        Ok(self.repository.get(reference)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use batchalloc_core::OrderReference;
    use chrono::Days;

    use crate::repository::InMemoryBatchRepository;

    fn service() -> AllocationService<Arc<InMemoryBatchRepository>> {
        AllocationService::new(Arc::new(InMemoryBatchRepository::new()))
    }

    fn line(order: &str, sku: &str, qty: u64) -> OrderLine {
        OrderLine::new(OrderReference::new(order), Sku::new(sku), qty)
    }

    fn tomorrow() -> NaiveDate {
        chrono::Utc::now().date_naive() + Days::new(1)
    }

    #[test]
    fn allocate_persists_the_chosen_batch() {
        let svc = service();
        svc.add_batch(BatchReference::new("b1"), Sku::new("LAMP"), 20, None)
            .unwrap();

        let chosen = svc.allocate(line("o1", "LAMP", 5)).unwrap();

        assert_eq!(chosen, BatchReference::new("b1"));
        let stored = svc.batch(&chosen).unwrap();
        assert_eq!(stored.available_quantity(), 15);
        assert!(stored.is_allocated(&line("o1", "LAMP", 5)));
    }

    #[test]
    fn allocate_prefers_warehouse_stock_across_calls() {
        let svc = service();
        svc.add_batch(BatchReference::new("shipment"), Sku::new("LAMP"), 100, Some(tomorrow()))
            .unwrap();
        svc.add_batch(BatchReference::new("warehouse"), Sku::new("LAMP"), 10, None)
            .unwrap();

        assert_eq!(
            svc.allocate(line("o1", "LAMP", 6)).unwrap(),
            BatchReference::new("warehouse")
        );
        // Only 4 left on hand, so the next line goes to the shipment.
        assert_eq!(
            svc.allocate(line("o2", "LAMP", 6)).unwrap(),
            BatchReference::new("shipment")
        );

        let shipment = svc.batch(&BatchReference::new("shipment")).unwrap();
        assert_eq!(shipment.available_quantity(), 94);
    }

    #[test]
    fn out_of_stock_persists_nothing() {
        let svc = service();
        svc.add_batch(BatchReference::new("b1"), Sku::new("LAMP"), 5, None)
            .unwrap();

        let err = svc.allocate(line("o1", "LAMP", 6)).unwrap_err();

        assert!(err.is_out_of_stock());
        assert_eq!(err.to_string(), "Out of stock for sku: LAMP");
        assert_eq!(
            svc.batch(&BatchReference::new("b1")).unwrap().available_quantity(),
            5
        );
    }

    #[test]
    fn unknown_sku_is_out_of_stock() {
        let svc = service();
        let err = svc.allocate(line("o1", "NOTHING", 1)).unwrap_err();
        assert!(err.is_out_of_stock());
    }

    #[test]
    fn zero_quantity_lines_are_rejected() {
        let svc = service();
        svc.add_batch(BatchReference::new("b1"), Sku::new("LAMP"), 5, None)
            .unwrap();

        let err = svc.allocate(line("o1", "LAMP", 0)).unwrap_err();

        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn deallocate_restores_availability() {
        let svc = service();
        svc.add_batch(BatchReference::new("b1"), Sku::new("LAMP"), 20, None)
            .unwrap();
        let order_line = line("o1", "LAMP", 5);
        let chosen = svc.allocate(order_line.clone()).unwrap();

        let batch = svc.deallocate(&chosen, &order_line).unwrap();

        assert_eq!(batch.available_quantity(), 20);
        assert_eq!(svc.batch(&chosen).unwrap().available_quantity(), 20);
    }

    #[test]
    fn deallocating_an_unallocated_line_is_a_no_op() {
        let svc = service();
        svc.add_batch(BatchReference::new("b1"), Sku::new("LAMP"), 20, None)
            .unwrap();

        let batch = svc
            .deallocate(&BatchReference::new("b1"), &line("o1", "LAMP", 5))
            .unwrap();

        assert_eq!(batch.available_quantity(), 20);
    }

    #[test]
    fn deallocate_on_missing_batch_surfaces_not_found() {
        let svc = service();
        let err = svc
            .deallocate(&BatchReference::new("nope"), &line("o1", "LAMP", 5))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Repository(RepositoryError::NotFound(_))));
    }
}
