//! Type node kinds.

/// The kind of a type pool entry.
///
/// The numeric order of connectives vs atoms is not significant; the
/// subtype engine dispatches on classification predicates, not ordering.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum Tag {
    // === Primitives (fixed pool indices) ===
    /// Bottom: no values.
    Void,
    /// Top: all values.
    Any,
    Null,
    Bool,
    Byte,
    Int,
    Real,
    Char,
    String,

    // === Simple containers (data = child index) ===
    /// Homogeneous list.
    List,
    /// Homogeneous set.
    Set,
    /// Mutable reference cell.
    Reference,
    /// A type treated as a value (`type(T)`).
    Meta,
    /// Negation `!T`. Never wraps a connective after canonicalization.
    Negation,

    // === Complex (data = extra index) ===
    /// Named type, expanded on demand through a resolver.
    Nominal,
    /// Record with sorted fields and an open flag.
    Record,
    Tuple,
    Map,
    Function,
    Method,
    Union,
    Intersection,
}

impl Tag {
    /// True for the pre-interned primitive kinds.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Tag::Void
                | Tag::Any
                | Tag::Null
                | Tag::Bool
                | Tag::Byte
                | Tag::Int
                | Tag::Real
                | Tag::Char
                | Tag::String
        )
    }

    /// True for union, intersection and negation nodes.
    pub fn is_connective(self) -> bool {
        matches!(self, Tag::Union | Tag::Intersection | Tag::Negation)
    }

    /// True for the one-child containers whose `data` field is the child.
    pub fn is_simple_container(self) -> bool {
        matches!(self, Tag::List | Tag::Set | Tag::Reference | Tag::Meta)
    }

    /// True for function and method types.
    pub fn is_callable(self) -> bool {
        matches!(self, Tag::Function | Tag::Method)
    }
}
