//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Two entities are the same entity when their identifiers match, even if the
/// rest of their state differs (e.g. a batch before and after an allocation).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Identity comparison, ignoring mutable state.
    fn same_identity_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
