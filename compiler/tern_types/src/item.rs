//! Pool entry representation.

use crate::Tag;

/// One type pool entry: a tag plus a 32-bit data word.
///
/// For simple containers and negation, `data` is the child's index; for
/// nominal types it is the interned name; for complex kinds it is an
/// offset into the pool's extra array. Primitives ignore it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Item {
    pub tag: Tag,
    pub data: u32,
}

impl Item {
    /// Entry for a primitive type.
    pub const fn primitive(tag: Tag) -> Self {
        Item { tag, data: 0 }
    }

    /// Entry with an inline data word.
    pub const fn new(tag: Tag, data: u32) -> Self {
        Item { tag, data }
    }
}
