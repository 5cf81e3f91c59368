//! Batch selection: which batch satisfies an order line.

use thiserror::Error;

use batchalloc_core::{BatchReference, Sku};

use crate::batch::Batch;
use crate::order_line::OrderLine;

/// Allocation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// No candidate batch can take the line. Nothing was mutated.
    #[error("Out of stock for sku: {sku}")]
    OutOfStock { sku: Sku },
}

/// Allocate `line` to the most preferred batch that can take it.
///
/// Candidates are ranked with [`Batch::preference_cmp`] (on-hand stock first,
/// then shipments by earliest `eta`); the sort is stable, so equally ranked
/// batches keep the caller's order. The caller's collection itself is not
/// reordered, and only the chosen batch is mutated.
///
/// Returns the reference of the batch that received the line, or
/// [`AllocationError::OutOfStock`] when none can (including when there are no
/// candidates at all).
pub fn allocate<'a, I>(line: &OrderLine, batches: I) -> Result<BatchReference, AllocationError>
where
    I: IntoIterator<Item = &'a mut Batch>,
{
    let mut candidates: Vec<&mut Batch> = batches.into_iter().collect();
    candidates.sort_by(|a, b| a.preference_cmp(b));

    let chosen = candidates
        .into_iter()
        .find(|batch| batch.can_be_allocated(line))
        .ok_or_else(|| AllocationError::OutOfStock {
            sku: line.sku().clone(),
        })?;

    chosen.allocate(line.clone());
    Ok(chosen.reference().clone())
}
