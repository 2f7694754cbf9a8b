//! Canonical type constructors.
//!
//! Every constructor maintains the representation invariants:
//! - unions/intersections are flat, sorted, deduplicated, and have at
//!   least two distinct children;
//! - `!!T` is never represented; negation is lifted through connectives
//!   via De Morgan, so a stored `Negation` only wraps an atom;
//! - record field lists are strictly sorted by name.

use tern_ir::{Name, TypeId};

use super::Pool;
use crate::Tag;

impl Pool {
    // === Simple containers ===

    /// List type `[elem]`.
    pub fn list(&mut self, elem: TypeId) -> TypeId {
        self.intern(Tag::List, elem.raw())
    }

    /// Set type `{elem}`.
    pub fn set(&mut self, elem: TypeId) -> TypeId {
        self.intern(Tag::Set, elem.raw())
    }

    /// Reference type `&elem`.
    pub fn reference(&mut self, elem: TypeId) -> TypeId {
        self.intern(Tag::Reference, elem.raw())
    }

    /// Meta type `type(elem)`.
    pub fn meta(&mut self, elem: TypeId) -> TypeId {
        self.intern(Tag::Meta, elem.raw())
    }

    /// Nominal type reference.
    pub fn nominal(&mut self, name: Name) -> TypeId {
        self.intern(Tag::Nominal, name.raw())
    }

    // === Two-child and variable-arity composites ===

    /// Map type `{key=>value}`.
    pub fn map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern_complex(Tag::Map, &[key.raw(), value.raw()])
    }

    /// Tuple type `(elems...)`.
    pub fn tuple(&mut self, elems: &[TypeId]) -> TypeId {
        let mut extra = Vec::with_capacity(elems.len() + 1);
        extra.push(elems.len() as u32);
        extra.extend(elems.iter().map(|e| e.raw()));
        self.intern_complex(Tag::Tuple, &extra)
    }

    /// Record type with sorted fields.
    ///
    /// # Panics
    /// Panics in debug builds on duplicate field names.
    pub fn record(&mut self, fields: &[(Name, TypeId)], open: bool) -> TypeId {
        let mut sorted: Vec<(Name, TypeId)> = fields.to_vec();
        sorted.sort_by_key(|&(name, _)| name);
        debug_assert!(
            sorted.windows(2).all(|w| w[0].0 < w[1].0),
            "duplicate record field"
        );

        let mut extra = Vec::with_capacity(sorted.len() * 2 + 2);
        extra.push(u32::from(open));
        extra.push(sorted.len() as u32);
        for (name, ty) in sorted {
            extra.push(name.raw());
            extra.push(ty.raw());
        }
        self.intern_complex(Tag::Record, &extra)
    }

    /// Function type `(params...) => ret [throws]`.
    pub fn function(&mut self, params: &[TypeId], ret: TypeId, throws: TypeId) -> TypeId {
        self.callable(Tag::Function, params, ret, throws)
    }

    /// Method type `::(params...) => ret [throws]`.
    pub fn method(&mut self, params: &[TypeId], ret: TypeId, throws: TypeId) -> TypeId {
        self.callable(Tag::Method, params, ret, throws)
    }

    fn callable(&mut self, tag: Tag, params: &[TypeId], ret: TypeId, throws: TypeId) -> TypeId {
        let mut extra = Vec::with_capacity(params.len() + 3);
        extra.push(params.len() as u32);
        extra.extend(params.iter().map(|p| p.raw()));
        extra.push(ret.raw());
        extra.push(throws.raw());
        self.intern_complex(tag, &extra)
    }

    // === Connectives ===

    /// Least upper bound `a ∪ b`.
    pub fn union_of(&mut self, a: TypeId, b: TypeId) -> TypeId {
        self.union(&[a, b])
    }

    /// Greatest lower bound `a ∩ b`.
    pub fn intersect_of(&mut self, a: TypeId, b: TypeId) -> TypeId {
        self.intersect(&[a, b])
    }

    /// Canonical union of the given types.
    ///
    /// Flattens nested unions, drops `void`, absorbs on `any`, sorts and
    /// deduplicates. An empty result is `void`; a singleton collapses.
    pub fn union(&mut self, types: &[TypeId]) -> TypeId {
        let mut children = Vec::with_capacity(types.len());
        if self.flatten_into(types, Tag::Union, &mut children) {
            return TypeId::ANY;
        }
        children.sort_unstable();
        children.dedup();
        match children.len() {
            0 => TypeId::VOID,
            1 => children[0],
            _ => {
                let mut extra = Vec::with_capacity(children.len() + 1);
                extra.push(children.len() as u32);
                extra.extend(children.iter().map(|c| c.raw()));
                self.intern_complex(Tag::Union, &extra)
            }
        }
    }

    /// Canonical intersection of the given types.
    ///
    /// Flattens nested intersections, drops `any`, annihilates on `void`,
    /// and minimizes: the intersection distributes over union children
    /// into disjunctive form, and conjunctions of atoms cancel
    /// (`int ∩ null = void`, `int ∩ !null = int`, `T ∩ !T = void`). The
    /// cancellation rules are what make flow refinements like
    /// `(int|null) ∩ !null = int` come out as plain types.
    pub fn intersect(&mut self, types: &[TypeId]) -> TypeId {
        let mut children = Vec::with_capacity(types.len());
        if self.flatten_into(types, Tag::Intersection, &mut children) {
            return TypeId::VOID;
        }

        // Distribute over the first union child, if any.
        if let Some(pos) = children.iter().position(|&c| self.tag(c) == Tag::Union) {
            let arms = self.children(children[pos]);
            let rest: Vec<TypeId> = children
                .iter()
                .enumerate()
                .filter_map(|(i, &c)| (i != pos).then_some(c))
                .collect();
            let mut distributed = Vec::with_capacity(arms.len());
            for arm in arms {
                let mut conj = Vec::with_capacity(rest.len() + 1);
                conj.push(arm);
                conj.extend_from_slice(&rest);
                distributed.push(self.intersect(&conj));
            }
            return self.union(&distributed);
        }

        // All children are atoms or negated atoms now.
        let positives: Vec<TypeId> = children
            .iter()
            .copied()
            .filter(|&c| self.tag(c) != Tag::Negation)
            .collect();
        let negated: Vec<TypeId> = children
            .iter()
            .copied()
            .filter(|&c| self.tag(c) == Tag::Negation)
            .collect();

        // Disjoint positive atoms annihilate the conjunction.
        for (i, &p) in positives.iter().enumerate() {
            for &q in &positives[i + 1..] {
                if self.atoms_disjoint(p, q) {
                    return TypeId::VOID;
                }
            }
        }

        // A negated atom annihilates on a positive twin, and is
        // redundant against a disjoint positive atom.
        let mut kept = positives.clone();
        for n in negated {
            let inner = self.element(n);
            if positives.contains(&inner) {
                return TypeId::VOID;
            }
            if !positives.iter().any(|&p| self.atoms_disjoint(p, inner)) {
                kept.push(n);
            }
        }

        kept.sort_unstable();
        kept.dedup();
        match kept.len() {
            0 => TypeId::ANY,
            1 => kept[0],
            _ => {
                let mut extra = Vec::with_capacity(kept.len() + 1);
                extra.push(kept.len() as u32);
                extra.extend(kept.iter().map(|c| c.raw()));
                self.intern_complex(Tag::Intersection, &extra)
            }
        }
    }

    /// Conservative disjointness of two non-connective atoms: true only
    /// when the value sets provably share nothing. Nominal atoms are
    /// never claimed disjoint here (expansion is the subtype engine's
    /// business), and a list/set pair shares the empty collection.
    fn atoms_disjoint(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return false;
        }
        let ta = self.tag(a);
        let tb = self.tag(b);
        if ta == Tag::Nominal || tb == Tag::Nominal || ta == Tag::Any || tb == Tag::Any {
            return false;
        }
        if ta == Tag::Void || tb == Tag::Void {
            // Void is disjoint from everything, itself included.
            return true;
        }
        if ta == tb {
            // Same-kind composites can overlap (e.g. the empty list);
            // same-kind primitives are equal and were handled above.
            return false;
        }
        // The one cross-kind overlap: lists and sets share the empty
        // collection.
        !matches!(
            (ta, tb),
            (Tag::List, Tag::Set) | (Tag::Set, Tag::List)
        )
    }

    /// Flatten `types` into `out`, recursing through nested nodes of
    /// `kind`. Drops the identity element; returns true on the
    /// annihilator (`any` for unions, `void` for intersections).
    fn flatten_into(&self, types: &[TypeId], kind: Tag, out: &mut Vec<TypeId>) -> bool {
        let (identity, annihilator) = match kind {
            Tag::Union => (TypeId::VOID, TypeId::ANY),
            Tag::Intersection => (TypeId::ANY, TypeId::VOID),
            _ => unreachable!("flatten_into on non-connective"),
        };
        for &t in types {
            if t == annihilator {
                return true;
            }
            if t == identity {
                continue;
            }
            if self.tag(t) == kind {
                let nested = self.children(t);
                if self.flatten_into(&nested, kind, out) {
                    return true;
                }
            } else {
                out.push(t);
            }
        }
        false
    }

    /// Canonical negation `!t`.
    ///
    /// `!!T` collapses, `!any`/`!void` swap, and De Morgan pushes the
    /// negation below unions and intersections.
    pub fn negation(&mut self, t: TypeId) -> TypeId {
        match self.tag(t) {
            Tag::Negation => self.element(t),
            Tag::Any => TypeId::VOID,
            Tag::Void => TypeId::ANY,
            Tag::Union => {
                let negated: Vec<TypeId> = self
                    .children(t)
                    .into_iter()
                    .map(|c| self.negation(c))
                    .collect();
                self.intersect(&negated)
            }
            Tag::Intersection => {
                let negated: Vec<TypeId> = self
                    .children(t)
                    .into_iter()
                    .map(|c| self.negation(c))
                    .collect();
                self.union(&negated)
            }
            _ => self.intern(Tag::Negation, t.raw()),
        }
    }
}
