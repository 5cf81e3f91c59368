use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use batchalloc_core::{BatchReference, Entity, Sku};

use crate::order_line::OrderLine;

/// Entity: Batch.
///
/// A lot of stock for one SKU. Without an `eta` the stock is on hand; with an
/// `eta` it is in transit and expected on that date.
///
/// Quantities are derived from the allocation set on every read, never cached.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    purchased_quantity: u64,
    eta: Option<NaiveDate>,
    allocations: HashSet<OrderLine>,
}

impl Batch {
    /// Create a batch with no allocations.
    pub fn new(
        reference: BatchReference,
        sku: Sku,
        purchased_quantity: u64,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference,
            sku,
            purchased_quantity,
            eta,
            allocations: HashSet::new(),
        }
    }

    /// Rebuild a batch from persisted state.
    ///
    /// Lines go through [`Batch::allocate`], so duplicates collapse and lines
    /// that no longer fit are dropped exactly as they would be at runtime.
    pub fn restore(
        reference: BatchReference,
        sku: Sku,
        purchased_quantity: u64,
        eta: Option<NaiveDate>,
        lines: impl IntoIterator<Item = OrderLine>,
    ) -> Self {
        let mut batch = Self::new(reference, sku, purchased_quantity, eta);
        for line in lines {
            batch.allocate(line);
        }
        batch
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn purchased_quantity(&self) -> u64 {
        self.purchased_quantity
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn allocated_quantity(&self) -> u64 {
        self.allocations.iter().map(OrderLine::quantity).sum()
    }

    pub fn available_quantity(&self) -> u64 {
        // allocate() never lets allocations exceed the purchased quantity.
        let allocated = self.allocated_quantity();
        self.purchased_quantity.saturating_sub(allocated)
    }

    /// True when the line is for this batch's SKU and fits in what is left.
    pub fn can_be_allocated(&self, line: &OrderLine) -> bool {
        self.sku == *line.sku() && self.available_quantity() >= line.quantity()
    }

    /// Allocate a line to this batch.
    ///
    /// Silently does nothing when the line cannot be allocated or is already
    /// allocated. Callers that need to know use [`Batch::can_be_allocated`] first,
    /// or go through [`crate::allocate`], which reports `OutOfStock`.
    pub fn allocate(&mut self, line: OrderLine) {
        if self.is_allocated(&line) {
            return;
        }
        if self.can_be_allocated(&line) {
            self.allocations.insert(line);
        }
    }

    /// Release a line. Lines that were never allocated are ignored.
    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.remove(line);
    }

    /// Allocation preference between two batches.
    ///
    /// On-hand stock (no `eta`) comes before anything in transit; shipments are
    /// ordered by arrival date. Two on-hand batches compare equal.
    pub fn preference_cmp(&self, other: &Self) -> Ordering {
        self.preference_key().cmp(&other.preference_key())
    }

    fn preference_key(&self) -> (bool, Option<NaiveDate>) {
        (self.eta.is_some(), self.eta)
    }

    /// Plain-data view of the batch, with allocations in a stable order.
    pub fn snapshot(&self) -> BatchSnapshot {
        let mut allocations: Vec<OrderLine> = self.allocations.iter().cloned().collect();
        allocations.sort_by(|a, b| {
            a.reference()
                .cmp(b.reference())
                .then_with(|| a.sku().cmp(b.sku()))
                .then_with(|| a.quantity().cmp(&b.quantity()))
        });

        BatchSnapshot {
            reference: self.reference.clone(),
            sku: self.sku.clone(),
            purchased_quantity: self.purchased_quantity,
            eta: self.eta,
            allocated_quantity: self.allocated_quantity(),
            available_quantity: self.available_quantity(),
            allocations,
        }
    }
}

impl Entity for Batch {
    type Id = BatchReference;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity_as(other)
    }
}

impl Eq for Batch {}

impl core::hash::Hash for Batch {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

/// Serializable view of a batch.
///
/// The derived quantities are informational; restoring a batch recomputes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub reference: BatchReference,
    pub sku: Sku,
    pub purchased_quantity: u64,
    pub eta: Option<NaiveDate>,
    pub allocated_quantity: u64,
    pub available_quantity: u64,
    pub allocations: Vec<OrderLine>,
}

impl From<BatchSnapshot> for Batch {
    fn from(snapshot: BatchSnapshot) -> Self {
        Batch::restore(
            snapshot.reference,
            snapshot.sku,
            snapshot.purchased_quantity,
            snapshot.eta,
            snapshot.allocations,
        )
    }
}

impl From<&Batch> for BatchSnapshot {
    fn from(batch: &Batch) -> Self {
        batch.snapshot()
    }
}
