//! Unified type pool — single source of truth for all types.
//!
//! Types are stored as `(tag, data)` items referenced by [`TypeId`];
//! variable-length children live in a side `extra` array. Construction
//! canonicalizes (flattening, sorting, De Morgan lifting) and hash-conses,
//! so structural equality is index equality and every unique type exists
//! exactly once.
//!
//! Cycles enter the graph only through `Nominal` indirection, which keeps
//! construction terminating; the subtype engine breaks expansion cycles
//! with its assumption cache.

mod construct;
mod format;

#[cfg(test)]
mod tests;

use rustc_hash::FxHashMap;

use tern_ir::{Name, TypeId};

use crate::{Item, Tag, TypeFlags};

/// Content key for deduplication.
///
/// Keyed by full content rather than a raw hash so distinct types can
/// never alias on a hash collision.
#[derive(PartialEq, Eq, Hash)]
struct InternKey {
    tag: Tag,
    data: u32,
    extra: Box<[u32]>,
}

/// The unified type pool.
pub struct Pool {
    /// All type items (tag + data).
    items: Vec<Item>,
    /// Pre-computed flags; `flags[i]` corresponds to `items[i]`.
    flags: Vec<TypeFlags>,
    /// Variable-length data for complex types. Layout depends on tag; see
    /// the accessor methods.
    extra: Vec<u32>,
    /// Content -> index mapping for deduplication.
    intern_map: FxHashMap<InternKey, TypeId>,
}

impl Pool {
    /// Create a new pool with pre-interned primitives.
    pub fn new() -> Self {
        let mut pool = Pool {
            items: Vec::with_capacity(256),
            flags: Vec::with_capacity(256),
            extra: Vec::with_capacity(1024),
            intern_map: FxHashMap::default(),
        };
        pool.intern_primitives();
        pool
    }

    /// Pre-intern all primitive types at their fixed indices.
    fn intern_primitives(&mut self) {
        // Order must match the TypeId constants.
        self.intern_primitive_at(Tag::Void, TypeId::VOID);
        self.intern_primitive_at(Tag::Any, TypeId::ANY);
        self.intern_primitive_at(Tag::Null, TypeId::NULL);
        self.intern_primitive_at(Tag::Bool, TypeId::BOOL);
        self.intern_primitive_at(Tag::Byte, TypeId::BYTE);
        self.intern_primitive_at(Tag::Int, TypeId::INT);
        self.intern_primitive_at(Tag::Real, TypeId::REAL);
        self.intern_primitive_at(Tag::Char, TypeId::CHAR);
        self.intern_primitive_at(Tag::String, TypeId::STRING);

        // Pad the reserved range with void placeholders; nothing ever
        // references these indices.
        while (self.items.len() as u32) < TypeId::FIRST_DYNAMIC {
            self.items.push(Item::primitive(Tag::Void));
            self.flags.push(TypeFlags::IS_PRIMITIVE);
        }

        debug_assert_eq!(self.items.len() as u32, TypeId::FIRST_DYNAMIC);
    }

    fn intern_primitive_at(&mut self, tag: Tag, expected: TypeId) {
        let idx = TypeId::from_raw(self.items.len() as u32);
        debug_assert_eq!(idx, expected, "primitive index mismatch for {tag:?}");

        self.items.push(Item::primitive(tag));
        self.flags.push(TypeFlags::IS_PRIMITIVE);
        self.intern_map.insert(
            InternKey {
                tag,
                data: 0,
                extra: Box::new([]),
            },
            idx,
        );
    }

    // === Query Methods ===

    /// Get the tag for a type index.
    #[inline]
    pub fn tag(&self, idx: TypeId) -> Tag {
        self.items[idx.raw() as usize].tag
    }

    /// Get the data word for a type index.
    #[inline]
    pub fn data(&self, idx: TypeId) -> u32 {
        self.items[idx.raw() as usize].data
    }

    /// Get the flags for a type index.
    #[inline]
    pub fn flags(&self, idx: TypeId) -> TypeFlags {
        self.flags[idx.raw() as usize]
    }

    /// Number of entries, including the reserved primitive range.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing beyond the primitives has been interned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.len() <= TypeId::FIRST_DYNAMIC as usize
    }

    // === Interning ===

    /// Intern a type with an inline data word and no extra data.
    pub(crate) fn intern(&mut self, tag: Tag, data: u32) -> TypeId {
        self.intern_with(tag, data, &[])
    }

    /// Intern a type with extra data (`data` becomes the extra offset).
    pub(crate) fn intern_complex(&mut self, tag: Tag, extra_data: &[u32]) -> TypeId {
        self.intern_with(tag, 0, extra_data)
    }

    fn intern_with(&mut self, tag: Tag, data: u32, extra_data: &[u32]) -> TypeId {
        let key = InternKey {
            tag,
            data,
            extra: extra_data.into(),
        };
        if let Some(&idx) = self.intern_map.get(&key) {
            return idx;
        }

        let stored_data = if extra_data.is_empty() {
            data
        } else {
            let extra_idx = self.extra.len() as u32;
            self.extra.extend_from_slice(extra_data);
            extra_idx
        };

        let idx = TypeId::from_raw(self.items.len() as u32);
        let flags = self.compute_flags(tag, stored_data, extra_data);
        self.items.push(Item::new(tag, stored_data));
        self.flags.push(flags);
        self.intern_map.insert(key, idx);
        idx
    }

    /// Compute flags for a new entry.
    fn compute_flags(&self, tag: Tag, data: u32, extra: &[u32]) -> TypeFlags {
        let mut flags = match tag {
            t if t.is_primitive() => TypeFlags::IS_PRIMITIVE,
            Tag::Union | Tag::Intersection => TypeFlags::IS_CONNECTIVE,
            Tag::Negation => TypeFlags::IS_CONNECTIVE | TypeFlags::HAS_NEGATION,
            Tag::Nominal => TypeFlags::HAS_NOMINAL,
            Tag::Function | Tag::Method => TypeFlags::IS_CALLABLE,
            _ => TypeFlags::IS_COMPOSITE,
        };

        match tag {
            // data is the child index
            Tag::List | Tag::Set | Tag::Reference | Tag::Meta | Tag::Negation => {
                flags |= TypeFlags::propagate_from(self.flags[data as usize]);
            }
            // every extra word that is a type index propagates
            Tag::Map | Tag::Tuple | Tag::Union | Tag::Intersection | Tag::Function
            | Tag::Method => {
                for &child in Self::extra_type_words(tag, extra) {
                    flags |= TypeFlags::propagate_from(self.flags[child as usize]);
                }
            }
            Tag::Record => {
                // extra layout: [open, field_count, (name, ty)*]
                let field_count = extra[1] as usize;
                for i in 0..field_count {
                    let ty = extra[2 + i * 2 + 1] as usize;
                    flags |= TypeFlags::propagate_from(self.flags[ty]);
                }
            }
            _ => {}
        }

        flags
    }

    /// The sub-slice of `extra` holding type indices, per tag layout.
    fn extra_type_words<'e>(tag: Tag, extra: &'e [u32]) -> &'e [u32] {
        match tag {
            // [key, value]
            Tag::Map => extra,
            // [count, children*]
            Tag::Tuple | Tag::Union | Tag::Intersection => &extra[1..],
            // [param_count, params*, ret, throws]
            Tag::Function | Tag::Method => &extra[1..],
            _ => &[],
        }
    }

    // === Accessors ===

    /// Child of a simple container or negation.
    ///
    /// # Panics
    /// Panics if `idx` is not a list, set, reference, meta or negation.
    pub fn element(&self, idx: TypeId) -> TypeId {
        let tag = self.tag(idx);
        debug_assert!(
            tag.is_simple_container() || tag == Tag::Negation,
            "element() on {tag:?}"
        );
        TypeId::from_raw(self.data(idx))
    }

    /// Name of a nominal type.
    ///
    /// # Panics
    /// Panics if `idx` is not a nominal type.
    pub fn nominal_name(&self, idx: TypeId) -> Name {
        debug_assert_eq!(self.tag(idx), Tag::Nominal);
        Name::from_raw(self.data(idx))
    }

    /// Key type of a map.
    pub fn map_key(&self, idx: TypeId) -> TypeId {
        debug_assert_eq!(self.tag(idx), Tag::Map);
        let e = self.data(idx) as usize;
        TypeId::from_raw(self.extra[e])
    }

    /// Value type of a map.
    pub fn map_value(&self, idx: TypeId) -> TypeId {
        debug_assert_eq!(self.tag(idx), Tag::Map);
        let e = self.data(idx) as usize;
        TypeId::from_raw(self.extra[e + 1])
    }

    /// Children of a tuple, union or intersection.
    pub fn children(&self, idx: TypeId) -> Vec<TypeId> {
        debug_assert!(matches!(
            self.tag(idx),
            Tag::Tuple | Tag::Union | Tag::Intersection
        ));
        let e = self.data(idx) as usize;
        let count = self.extra[e] as usize;
        (0..count)
            .map(|i| TypeId::from_raw(self.extra[e + 1 + i]))
            .collect()
    }

    /// Child count of a tuple, union or intersection.
    pub fn child_count(&self, idx: TypeId) -> usize {
        debug_assert!(matches!(
            self.tag(idx),
            Tag::Tuple | Tag::Union | Tag::Intersection
        ));
        self.extra[self.data(idx) as usize] as usize
    }

    /// One child of a tuple, union or intersection.
    pub fn child(&self, idx: TypeId, i: usize) -> TypeId {
        let e = self.data(idx) as usize;
        debug_assert!(i < self.extra[e] as usize);
        TypeId::from_raw(self.extra[e + 1 + i])
    }

    /// Open flag of a record.
    pub fn record_is_open(&self, idx: TypeId) -> bool {
        debug_assert_eq!(self.tag(idx), Tag::Record);
        self.extra[self.data(idx) as usize] != 0
    }

    /// Field count of a record.
    pub fn record_field_count(&self, idx: TypeId) -> usize {
        debug_assert_eq!(self.tag(idx), Tag::Record);
        self.extra[self.data(idx) as usize + 1] as usize
    }

    /// One record field, `(name, type)`, in sorted order.
    pub fn record_field(&self, idx: TypeId, i: usize) -> (Name, TypeId) {
        debug_assert_eq!(self.tag(idx), Tag::Record);
        let e = self.data(idx) as usize;
        debug_assert!(i < self.extra[e + 1] as usize);
        let off = e + 2 + i * 2;
        (
            Name::from_raw(self.extra[off]),
            TypeId::from_raw(self.extra[off + 1]),
        )
    }

    /// All record fields in sorted order.
    pub fn record_fields(&self, idx: TypeId) -> Vec<(Name, TypeId)> {
        (0..self.record_field_count(idx))
            .map(|i| self.record_field(idx, i))
            .collect()
    }

    /// Type of a record field by name, if present.
    pub fn record_field_type(&self, idx: TypeId, name: Name) -> Option<TypeId> {
        (0..self.record_field_count(idx)).find_map(|i| {
            let (n, t) = self.record_field(idx, i);
            (n == name).then_some(t)
        })
    }

    /// Parameter count of a function or method.
    pub fn callable_param_count(&self, idx: TypeId) -> usize {
        debug_assert!(self.tag(idx).is_callable());
        self.extra[self.data(idx) as usize] as usize
    }

    /// One parameter type of a function or method.
    pub fn callable_param(&self, idx: TypeId, i: usize) -> TypeId {
        debug_assert!(self.tag(idx).is_callable());
        let e = self.data(idx) as usize;
        debug_assert!(i < self.extra[e] as usize);
        TypeId::from_raw(self.extra[e + 1 + i])
    }

    /// Parameter types of a function or method.
    pub fn callable_params(&self, idx: TypeId) -> Vec<TypeId> {
        (0..self.callable_param_count(idx))
            .map(|i| self.callable_param(idx, i))
            .collect()
    }

    /// Return type of a function or method.
    pub fn callable_return(&self, idx: TypeId) -> TypeId {
        debug_assert!(self.tag(idx).is_callable());
        let e = self.data(idx) as usize;
        let count = self.extra[e] as usize;
        TypeId::from_raw(self.extra[e + 1 + count])
    }

    /// Throws type of a function or method.
    pub fn callable_throws(&self, idx: TypeId) -> TypeId {
        debug_assert!(self.tag(idx).is_callable());
        let e = self.data(idx) as usize;
        let count = self.extra[e] as usize;
        TypeId::from_raw(self.extra[e + 2 + count])
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
