//! Allocation domain module.
//!
//! This crate contains the business rules for allocating order lines to stock
//! batches, implemented purely as deterministic domain logic (no IO, no storage).

pub mod allocator;
pub mod batch;
pub mod order_line;

pub use allocator::{AllocationError, allocate};
pub use batch::{Batch, BatchSnapshot};
pub use order_line::OrderLine;
