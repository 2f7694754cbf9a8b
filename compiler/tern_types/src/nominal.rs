//! Nominal type resolution.
//!
//! Nominal nodes carry only a name; expansion to the underlying
//! structural type goes through a [`NominalResolver`] supplied by the
//! host. The subtype engine and the resolver are the only consumers.

use rustc_hash::{FxHashMap, FxHashSet};
use tern_ir::{Name, TypeId};

use crate::Pool;

/// Failure to resolve a name to a declaration.
///
/// The resolver re-wraps this as a user-facing diagnostic at the point of
/// use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown type name")]
    UnknownName(Name),
}

/// Expands nominal type names to their structural definitions.
pub trait NominalResolver {
    /// The structural type behind `name`. Implementations memoize; the
    /// pool argument lets lazy implementations intern on first expansion.
    fn expand(&self, pool: &mut Pool, name: Name) -> Result<TypeId, ResolveError>;

    /// Whether the record definition behind `name` is open.
    fn is_open(&self, name: Name) -> bool;
}

/// Table-backed resolver: the host registers each named type's structural
/// definition up front. Expansion is a lookup, which makes memoization
/// trivial.
#[derive(Default)]
pub struct NominalTable {
    defs: FxHashMap<Name, TypeId>,
    open: FxHashSet<Name>,
}

impl NominalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named type.
    pub fn insert(&mut self, name: Name, ty: TypeId) {
        self.defs.insert(name, ty);
    }

    /// Register a named type whose record definition is open.
    pub fn insert_open(&mut self, name: Name, ty: TypeId) {
        self.defs.insert(name, ty);
        self.open.insert(name);
    }

    /// True if `name` has a registered definition.
    pub fn contains(&self, name: Name) -> bool {
        self.defs.contains_key(&name)
    }
}

impl NominalResolver for NominalTable {
    fn expand(&self, _pool: &mut Pool, name: Name) -> Result<TypeId, ResolveError> {
        self.defs
            .get(&name)
            .copied()
            .ok_or(ResolveError::UnknownName(name))
    }

    fn is_open(&self, name: Name) -> bool {
        self.open.contains(&name)
    }
}

/// Resolver with no definitions; every expansion fails. Useful where a
/// query is known to involve no nominal types.
pub struct NoNominals;

impl NominalResolver for NoNominals {
    fn expand(&self, _pool: &mut Pool, name: Name) -> Result<TypeId, ResolveError> {
        Err(ResolveError::UnknownName(name))
    }

    fn is_open(&self, _name: Name) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_and_open_flag() {
        let mut pool = Pool::new();
        let name = Name::from_raw(7);
        let other = Name::from_raw(8);

        let mut table = NominalTable::new();
        table.insert_open(name, TypeId::INT);

        assert_eq!(table.expand(&mut pool, name), Ok(TypeId::INT));
        assert!(table.is_open(name));
        assert_eq!(
            table.expand(&mut pool, other),
            Err(ResolveError::UnknownName(other))
        );
    }
}
