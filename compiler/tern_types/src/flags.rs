//! Pre-computed type metadata flags.
//!
//! Computed once at interning time and cached per pool entry, so property
//! queries never traverse the type graph.

use bitflags::bitflags;

bitflags! {
    /// Pre-computed type properties for O(1) queries.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u16 {
        // === Category flags ===

        /// Built-in primitive type (void, any, int, ...).
        const IS_PRIMITIVE = 1 << 0;
        /// Union, intersection or negation node.
        const IS_CONNECTIVE = 1 << 1;
        /// Structural composite (record, tuple, list, set, map,
        /// reference, meta).
        const IS_COMPOSITE = 1 << 2;
        /// Function or method type.
        const IS_CALLABLE = 1 << 3;

        // === Presence flags (propagated from children) ===

        /// Contains a nominal node somewhere; a subtype query over this
        /// type may need nominal expansion.
        const HAS_NOMINAL = 1 << 8;
        /// Contains a negation node somewhere.
        const HAS_NEGATION = 1 << 9;
    }
}

impl TypeFlags {
    /// Flags inherited by a compound type from its children.
    pub const PROPAGATE_MASK: Self =
        Self::from_bits_truncate(Self::HAS_NOMINAL.bits() | Self::HAS_NEGATION.bits());

    /// The subset of `child` that propagates to a parent.
    #[inline]
    pub fn propagate_from(child: Self) -> Self {
        child & Self::PROPAGATE_MASK
    }
}
