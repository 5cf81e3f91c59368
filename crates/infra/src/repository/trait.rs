use std::sync::Arc;

use thiserror::Error;

use batchalloc_allocation::Batch;
use batchalloc_core::{BatchReference, Sku};

/// Batch repository operation error.
///
/// These are **infrastructure errors** (missing rows, storage failures) as
/// opposed to allocation outcomes such as `OutOfStock`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("batch not found: {0}")]
    NotFound(BatchReference),

    #[error("storage failure: {0}")]
    Storage(String),

    /// Persisted data cannot be mapped back onto the domain model
    /// (e.g. a negative quantity column).
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Durable home of batches and their allocations.
///
/// ## Contract
///
/// `add()`:
/// - persists reference, SKU, purchased quantity, eta and every allocated line
/// - replaces whatever was stored under the same reference (the same call saves
///   a freshly created batch and a batch mutated by an allocation)
///
/// `get()`:
/// - rebuilds the batch through `Batch::restore`, so stored lines are re-attached
///   with the same rules as a live allocation
/// - returns `RepositoryError::NotFound` for unknown references
///
/// Implementations do not serialize concurrent writers; callers allocate one
/// SKU at a time.
pub trait BatchRepository: Send + Sync {
    /// Persist a batch and its current allocation set.
    fn add(&self, batch: &Batch) -> Result<(), RepositoryError>;

    /// Load a batch by reference, with its allocations.
    fn get(&self, reference: &BatchReference) -> Result<Batch, RepositoryError>;

    /// Load every batch supplying `sku`. Empty when there are none.
    fn list_for_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError>;
}

impl<R> BatchRepository for Arc<R>
where
    R: BatchRepository + ?Sized,
{
    fn add(&self, batch: &Batch) -> Result<(), RepositoryError> {
        (**self).add(batch)
    }

    fn get(&self, reference: &BatchReference) -> Result<Batch, RepositoryError> {
        (**self).get(reference)
    }

    fn list_for_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        (**self).list_for_sku(sku)
    }
}
