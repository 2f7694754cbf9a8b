//! Flow-sensitive typing environment.
//!
//! Environments are values: refinement produces a new environment, and
//! control-flow merge points join per-key. Each variable carries two
//! types — the type it was *declared* with (stable across assignments,
//! checked on every write) and its *current* flow-refined type.

use rustc_hash::FxHashMap;
use tern_ir::Name;
use tern_types::{Pool, TypeId};

#[derive(Clone, Debug, Default)]
pub struct Env {
    /// Current flow-refined type per variable.
    current: FxHashMap<Name, TypeId>,
    /// Declared type per variable; assignment targets check against this.
    declared: FxHashMap<Name, TypeId>,
    /// Bottom marks an unreachable branch; join absorbs it.
    bottom: bool,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// The distinguished unreachable environment.
    pub fn unreachable() -> Self {
        Env {
            current: FxHashMap::default(),
            declared: FxHashMap::default(),
            bottom: true,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.bottom
    }

    /// Current type of a variable.
    pub fn lookup(&self, name: Name) -> Option<TypeId> {
        self.current.get(&name).copied()
    }

    /// Declared type of a variable.
    pub fn declared(&self, name: Name) -> Option<TypeId> {
        self.declared.get(&name).copied()
    }

    /// Declare a variable: sets both declared and current type.
    pub fn bind(&mut self, name: Name, ty: TypeId) {
        self.declared.insert(name, ty);
        self.current.insert(name, ty);
    }

    /// Rebind the current type, returning a new environment. The declared
    /// type is untouched.
    #[must_use]
    pub fn put(&self, name: Name, ty: TypeId) -> Env {
        let mut next = self.clone();
        next.current.insert(name, ty);
        next
    }

    /// Names with a current binding.
    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.current.keys().copied()
    }

    /// Join at a control-flow merge: per-key union of current types for
    /// keys present in both sides; one-sided keys drop. An unreachable
    /// side is absorbed by the other.
    pub fn join(pool: &mut Pool, a: &Env, b: &Env) -> Env {
        if a.bottom {
            return b.clone();
        }
        if b.bottom {
            return a.clone();
        }
        let mut current = FxHashMap::default();
        let mut declared = FxHashMap::default();
        for (&name, &ta) in &a.current {
            if let Some(&tb) = b.current.get(&name) {
                current.insert(name, pool.union_of(ta, tb));
                // Declared types agree on shared names; prefer a's.
                if let Some(&d) = a.declared.get(&name).or_else(|| b.declared.get(&name)) {
                    declared.insert(name, d);
                }
            }
        }
        Env {
            current,
            declared,
            bottom: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn join_unions_common_and_drops_one_sided() {
        let mut pool = Pool::new();
        let x = Name::from_raw(1);
        let y = Name::from_raw(2);
        let z = Name::from_raw(3);

        let mut a = Env::new();
        a.bind(x, TypeId::INT);
        a.bind(y, TypeId::BOOL);
        let mut b = Env::new();
        b.bind(x, TypeId::NULL);
        b.bind(z, TypeId::STRING);

        let joined = Env::join(&mut pool, &a, &b);
        let int_null = pool.union_of(TypeId::INT, TypeId::NULL);
        assert_eq!(joined.lookup(x), Some(int_null));
        assert_eq!(joined.lookup(y), None);
        assert_eq!(joined.lookup(z), None);
    }

    #[test]
    fn unreachable_is_absorbed() {
        let mut pool = Pool::new();
        let x = Name::from_raw(1);
        let mut a = Env::new();
        a.bind(x, TypeId::INT);

        let joined = Env::join(&mut pool, &a, &Env::unreachable());
        assert_eq!(joined.lookup(x), Some(TypeId::INT));
        assert!(!joined.is_unreachable());

        let joined = Env::join(&mut pool, &Env::unreachable(), &a);
        assert_eq!(joined.lookup(x), Some(TypeId::INT));
    }

    #[test]
    fn put_refines_without_touching_declared() {
        let x = Name::from_raw(1);
        let mut env = Env::new();
        env.bind(x, TypeId::ANY);

        let refined = env.put(x, TypeId::INT);
        assert_eq!(refined.lookup(x), Some(TypeId::INT));
        assert_eq!(refined.declared(x), Some(TypeId::ANY));
        assert_eq!(env.lookup(x), Some(TypeId::ANY));
    }
}
