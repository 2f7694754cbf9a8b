//! Unified type index handle.
//!
//! `TypeId` is the canonical type representation: a 32-bit index into the
//! type pool (owned by the types crate). Primitive types occupy fixed
//! indices so the AST and bytecode can name them without a pool in hand;
//! everything else is allocated dynamically at interning time.
//!
//! Type equality is O(1) index comparison — the pool canonicalizes on
//! construction, so structurally equal types share an index.

use std::fmt;

/// A 32-bit index into the type pool.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Primitive Types (indices 0-8) ===
    // Pre-interned at pool creation for O(1) access.

    /// The `void` type (bottom, no values).
    pub const VOID: Self = Self(0);
    /// The `any` type (top, all values).
    pub const ANY: Self = Self(1);
    /// The `null` type (single value `null`).
    pub const NULL: Self = Self(2);
    /// The `bool` type.
    pub const BOOL: Self = Self(3);
    /// The `byte` type (8-bit unsigned integer).
    pub const BYTE: Self = Self(4);
    /// The `int` type (signed integer).
    pub const INT: Self = Self(5);
    /// The `real` type (floating point).
    pub const REAL: Self = Self(6);
    /// The `char` type (Unicode scalar value).
    pub const CHAR: Self = Self(7);
    /// The `string` type (UTF-8 string).
    pub const STRING: Self = Self(8);

    // === Reserved Range (9-31) ===
    // Reserved for future primitive types.

    /// First index for dynamically allocated types.
    pub const FIRST_DYNAMIC: u32 = 32;

    /// Sentinel value indicating no type / not yet resolved.
    pub const NONE: Self = Self(u32::MAX);

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 9;

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a pre-interned primitive type.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    /// Check if this is the NONE sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// Check if this is the VOID type.
    #[inline]
    pub const fn is_void(self) -> bool {
        self.0 == Self::VOID.0
    }

    /// Check if this is the ANY type.
    #[inline]
    pub const fn is_any(self) -> bool {
        self.0 == Self::ANY.0
    }

    /// Human-readable name for primitive types.
    ///
    /// Returns `None` for dynamic types, which need a pool to render.
    #[inline]
    pub const fn primitive_name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("void"),
            1 => Some("any"),
            2 => Some("null"),
            3 => Some("bool"),
            4 => Some("byte"),
            5 => Some("int"),
            6 => Some("real"),
            7 => Some("char"),
            8 => Some("string"),
            _ => None,
        }
    }
}

// Debug and Display agree: primitive name, `?` for NONE, `t<idx>` for
// dynamic types.
impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "?")
        } else if let Some(name) = self.primitive_name() {
            f.write_str(name)
        } else {
            write!(f, "t{}", self.0)
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_names() {
        assert_eq!(TypeId::VOID.primitive_name(), Some("void"));
        assert_eq!(TypeId::STRING.primitive_name(), Some("string"));
        assert_eq!(TypeId::from_raw(100).primitive_name(), None);
    }

    #[test]
    fn none_sentinel() {
        assert!(TypeId::NONE.is_none());
        assert!(!TypeId::INT.is_none());
    }

    #[test]
    fn display_forms() {
        assert_eq!(TypeId::INT.to_string(), "int");
        assert_eq!(TypeId::NONE.to_string(), "?");
        assert_eq!(TypeId::from_raw(40).to_string(), "t40");
    }
}
