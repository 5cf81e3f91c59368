use serde::{Deserialize, Serialize};

use batchalloc_core::{OrderReference, Sku, ValueObject};

/// Order line: demand for `quantity` units of `sku` on behalf of an order.
///
/// Compared structurally: two lines with the same order, SKU and quantity are
/// the same line, so a batch never counts such a pair twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    reference: OrderReference,
    sku: Sku,
    quantity: u64,
}

impl OrderLine {
    pub fn new(reference: OrderReference, sku: Sku, quantity: u64) -> Self {
        Self {
            reference,
            sku,
            quantity,
        }
    }

    pub fn reference(&self) -> &OrderReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }
}

impl ValueObject for OrderLine {}
