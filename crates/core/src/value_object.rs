//! Value object trait: equality by value, not identity.
//!
//! Value objects are defined entirely by their attribute values. Two value
//! objects with the same values are interchangeable.

/// Marker trait for value objects.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: no identity; `OrderLine { order, sku, qty }` equals any other
///   line with the same three fields
/// - **Entity**: has identity; a batch stays the same batch while its allocations change
///
/// ## Design Constraints
///
/// The trait requires:
/// - **Clone**: values are copied, never shared mutably
/// - **Eq + Hash**: values are deduplicated when collected into sets
/// - **Debug**: values show up in logs and test failures
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// struct Quantity(u64);
///
/// impl ValueObject for Quantity {}
///
/// let mut set = std::collections::HashSet::new();
/// set.insert(Quantity(5));
/// set.insert(Quantity(5));
/// assert_eq!(set.len(), 1);
/// ```
pub trait ValueObject: Clone + Eq + core::hash::Hash + core::fmt::Debug {}
