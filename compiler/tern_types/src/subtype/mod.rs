//! Subtype engine.
//!
//! `A <: B` is decided by reduction to emptiness of the intersection
//! `A ∩ ¬B`: the engine's core predicate is `inhabited(A, sA, B, sB)` over
//! signed type pairs, where a negative sign complements its side.
//!
//! Recursive types (through nominal expansion) terminate via an assumption
//! cache: a query re-entering an in-progress `(A, sA, B, sB)` tuple
//! answers *not inhabited*, which is sound under the coinductive reading
//! of recursive types. The cache lives per query and is reset between
//! queries.
//!
//! The engine is sound but deliberately incomplete: connectives decompose
//! into pairwise tests (existential over unions, universal over
//! intersections after De Morgan), which can answer *inhabited* for an
//! intersection that is in fact empty. A `false` from `inhabited` is
//! always exact, so every claimed subtype relation holds.

#[cfg(test)]
mod tests;

use rustc_hash::FxHashSet;
use tern_ir::TypeId;

use crate::{NominalResolver, Pool, Tag};

/// Decide `a <: b`.
pub fn is_subtype(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    a: TypeId,
    b: TypeId,
) -> bool {
    SubtypeQuery::new(pool, nominals).is_subtype(a, b)
}

/// Decide `a :> b`.
pub fn is_supertype(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    a: TypeId,
    b: TypeId,
) -> bool {
    SubtypeQuery::new(pool, nominals).is_subtype(b, a)
}

/// One subtype query; holds the assumption cache.
pub struct SubtypeQuery<'a> {
    pool: &'a mut Pool,
    nominals: &'a dyn NominalResolver,
    /// In-progress `(idxA, signA, idxB, signB)` tuples.
    assumptions: FxHashSet<(u32, bool, u32, bool)>,
}

impl<'a> SubtypeQuery<'a> {
    pub fn new(pool: &'a mut Pool, nominals: &'a dyn NominalResolver) -> Self {
        SubtypeQuery {
            pool,
            nominals,
            assumptions: FxHashSet::default(),
        }
    }

    /// Decide `a <: b`. Resets the assumption cache.
    pub fn is_subtype(&mut self, a: TypeId, b: TypeId) -> bool {
        self.assumptions.clear();
        let result = !self.inhabited(a, true, b, false);
        tracing::trace!(?a, ?b, result, "subtype query");
        result
    }

    /// Decide whether `(a under sa) ∩ (b under sb)` is inhabited, where a
    /// `false` sign complements its side. Resets the assumption cache.
    pub fn is_inhabited(&mut self, a: TypeId, sa: bool, b: TypeId, sb: bool) -> bool {
        self.assumptions.clear();
        self.inhabited(a, sa, b, sb)
    }

    fn inhabited(&mut self, a: TypeId, sa: bool, b: TypeId, sb: bool) -> bool {
        let key = (a.raw(), sa, b.raw(), sb);
        if !self.assumptions.insert(key) {
            // Coinductive assumption: an in-progress query is not
            // inhabited unless something else proves it is.
            return false;
        }
        let result = self.decompose(a, sa, b, sb);
        self.assumptions.remove(&key);
        result
    }

    /// Sign normalization and connective decomposition.
    fn decompose(&mut self, a: TypeId, sa: bool, b: TypeId, sb: bool) -> bool {
        // Negation flips the sign of its side.
        if self.pool.tag(a) == Tag::Negation {
            let inner = self.pool.element(a);
            return self.inhabited(inner, !sa, b, sb);
        }
        if self.pool.tag(b) == Tag::Negation {
            let inner = self.pool.element(b);
            return self.inhabited(a, sa, inner, !sb);
        }

        // Nominal atoms with equal names answer from signs alone; this
        // also short-circuits the trivial expansion cycle.
        if self.pool.tag(a) == Tag::Nominal
            && self.pool.tag(b) == Tag::Nominal
            && self.pool.nominal_name(a) == self.pool.nominal_name(b)
        {
            return sa == sb;
        }

        // Expand nominal indirection before any connective split, so a
        // nominal that names a union decomposes on the correct side.
        // Expansion cycles bottom out in the assumption cache.
        if self.pool.tag(a) == Tag::Nominal {
            let name = self.pool.nominal_name(a);
            if let Ok(expansion) = self.nominals.expand(self.pool, name) {
                return self.inhabited(expansion, sa, b, sb);
            }
        }
        if self.pool.tag(b) == Tag::Nominal {
            let name = self.pool.nominal_name(b);
            if let Ok(expansion) = self.nominals.expand(self.pool, name) {
                return self.inhabited(a, sa, expansion, sb);
            }
        }

        // Existential splits (union under positive sign, intersection
        // under negative sign) run before universal ones: splitting the
        // positive union first keeps e.g. `int|string <: int|string|real`
        // decidable by pairwise tests.
        if is_existential(self.pool.tag(a), sa) {
            let children = self.pool.children(a);
            return children.into_iter().any(|c| self.inhabited(c, sa, b, sb));
        }
        if is_existential(self.pool.tag(b), sb) {
            let children = self.pool.children(b);
            return children.into_iter().any(|c| self.inhabited(a, sa, c, sb));
        }
        if is_universal(self.pool.tag(a), sa) {
            let children = self.pool.children(a);
            return children.into_iter().all(|c| self.inhabited(c, sa, b, sb));
        }
        if is_universal(self.pool.tag(b), sb) {
            let children = self.pool.children(b);
            return children.into_iter().all(|c| self.inhabited(a, sa, c, sb));
        }

        self.atoms(a, sa, b, sb)
    }

    /// Per-kind rules once both sides are non-connective.
    fn atoms(&mut self, a: TypeId, sa: bool, b: TypeId, sb: bool) -> bool {
        let ta = self.pool.tag(a);
        let tb = self.pool.tag(b);

        // void/any under signs: an empty side empties the intersection, a
        // universe side imposes no constraint.
        if side_is_empty(ta, sa) || side_is_empty(tb, sb) {
            return false;
        }
        if side_is_universe(ta, sa) {
            return self.solo(b, sb);
        }
        if side_is_universe(tb, sb) {
            return self.solo(a, sa);
        }

        // Only unexpandable nominals reach the atom rules (equal names
        // and expansion were handled during decomposition): nominal-only
        // reasoning treats them as disjoint from every other atom.
        if ta == Tag::Nominal || tb == Tag::Nominal {
            return !(sa && sb);
        }

        // Two complements always overlap: each excludes only one
        // non-universal set of values.
        if !sa && !sb {
            return true;
        }

        // Cross-kind atoms.
        if ta != tb {
            // The empty collection inhabits the intersection of a
            // list-type and a set-type.
            if (ta == Tag::List && tb == Tag::Set) || (ta == Tag::Set && tb == Tag::List) {
                return true;
            }
            return !(sa && sb);
        }

        // Same-kind atoms.
        match ta {
            t if t.is_primitive() => sa == sb,

            // A nonempty witness needs an element in the (signed)
            // element intersection; both positive has the empty witness.
            Tag::List | Tag::Set => {
                if sa && sb {
                    true
                } else {
                    let ea = self.pool.element(a);
                    let eb = self.pool.element(b);
                    self.inhabited(ea, sa, eb, sb)
                }
            }

            Tag::Reference | Tag::Meta => {
                let ea = self.pool.element(a);
                let eb = self.pool.element(b);
                self.inhabited(ea, sa, eb, sb)
            }

            Tag::Tuple => {
                let ca = self.pool.children(a);
                let cb = self.pool.children(b);
                if ca.len() != cb.len() {
                    return !(sa && sb);
                }
                self.combine_children(ca.into_iter().zip(cb), sa, sb)
            }

            Tag::Map => {
                let pairs = [
                    (self.pool.map_key(a), self.pool.map_key(b)),
                    (self.pool.map_value(a), self.pool.map_value(b)),
                ];
                self.combine_children(pairs.into_iter(), sa, sb)
            }

            Tag::Record => self.record_atoms(a, sa, b, sb),

            Tag::Function | Tag::Method => self.callable_atoms(a, sa, b, sb),

            // Connectives, void/any and nominal were handled above.
            _ => unreachable!("connective reached atom rules"),
        }
    }

    /// Conjunction of child tests when both signs are positive,
    /// disjunction otherwise.
    fn combine_children(
        &mut self,
        pairs: impl Iterator<Item = (TypeId, TypeId)>,
        sa: bool,
        sb: bool,
    ) -> bool {
        if sa && sb {
            for (ca, cb) in pairs {
                if !self.inhabited(ca, sa, cb, sb) {
                    return false;
                }
            }
            true
        } else {
            for (ca, cb) in pairs {
                if self.inhabited(ca, sa, cb, sb) {
                    return true;
                }
            }
            false
        }
    }

    /// Record intersection: lockstep walk of the two sorted field lists.
    ///
    /// Under both-positive signs the per-field tests conjoin; under mixed
    /// signs the walk hunts for a single distinguishing witness.
    fn record_atoms(&mut self, a: TypeId, sa: bool, b: TypeId, sb: bool) -> bool {
        let conj = sa && sb;
        let a_open = self.pool.record_is_open(a);
        let b_open = self.pool.record_is_open(b);

        // Under mixed signs an open positive side against a closed
        // negative side always has an extra-field witness.
        if !conj {
            let (pos_open, neg_open) = if sa { (a_open, b_open) } else { (b_open, a_open) };
            if pos_open && !neg_open {
                return true;
            }
        }

        let fa = self.pool.record_fields(a);
        let fb = self.pool.record_fields(b);
        let mut i = 0;
        let mut j = 0;

        while i < fa.len() || j < fb.len() {
            let step = match (fa.get(i), fb.get(j)) {
                (Some(&(na, _)), Some(&(nb, _))) => na.cmp(&nb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => unreachable!(),
            };
            let field_result = match step {
                std::cmp::Ordering::Equal => {
                    let r = self.inhabited(fa[i].1, sa, fb[j].1, sb);
                    i += 1;
                    j += 1;
                    r
                }
                std::cmp::Ordering::Less => {
                    let r = self.one_sided_field(fa[i].1, sa, b_open, conj, sb);
                    i += 1;
                    r
                }
                std::cmp::Ordering::Greater => {
                    let r = self.one_sided_field(fb[j].1, sb, a_open, conj, sa);
                    j += 1;
                    r
                }
            };
            if conj && !field_result {
                return false;
            }
            if !conj && field_result {
                return true;
            }
        }

        // A conjunction with no failures is inhabited; a mixed-sign walk
        // that never found a witness is not.
        conj
    }

    /// Contribution of a field present on only one side.
    ///
    /// `owner_sign` is the sign of the side that has the field,
    /// `other_open` the openness of the side lacking it.
    fn one_sided_field(
        &mut self,
        field_ty: TypeId,
        owner_sign: bool,
        other_open: bool,
        conj: bool,
        other_sign: bool,
    ) -> bool {
        if conj {
            // Missing relative to a closed record empties the
            // intersection; an open record acts as `any` for the field.
            return if other_open {
                self.inhabited(field_ty, owner_sign, TypeId::ANY, other_sign)
            } else {
                false
            };
        }
        if owner_sign {
            // Field on the positive side: a closed negative side cannot
            // carry it, so its presence distinguishes; an open one
            // tolerates it.
            !other_open
        } else {
            // Field required by the negative side only: the positive side
            // never requires it, so a record lacking it is a witness.
            true
        }
    }

    /// Function/method intersection: parameters contravariant, return and
    /// throws covariant.
    fn callable_atoms(&mut self, a: TypeId, sa: bool, b: TypeId, sb: bool) -> bool {
        let pa = self.pool.callable_params(a);
        let pb = self.pool.callable_params(b);
        if pa.len() != pb.len() {
            return !(sa && sb);
        }
        if sa && sb {
            // Some callable satisfies both signatures.
            return true;
        }

        // Mixed signs: a witness distinguishing the signatures exists iff
        // some position's signed intersection is inhabited. Contravariant
        // positions swap operand order, flipping the variance.
        for (ca, cb) in pa.into_iter().zip(pb) {
            if self.inhabited(cb, sa, ca, sb) {
                return true;
            }
        }
        let ra = self.pool.callable_return(a);
        let rb = self.pool.callable_return(b);
        if self.inhabited(ra, sa, rb, sb) {
            return true;
        }
        let ea = self.pool.callable_throws(a);
        let eb = self.pool.callable_throws(b);
        self.inhabited(ea, sa, eb, sb)
    }

    /// Inhabitance of one signed side on its own.
    fn solo(&mut self, t: TypeId, s: bool) -> bool {
        match self.pool.tag(t) {
            Tag::Nominal => {
                let name = self.pool.nominal_name(t);
                match self.nominals.expand(self.pool, name) {
                    // Route through the cache so expansion cycles stop.
                    Ok(expansion) => self.inhabited(expansion, s, TypeId::ANY, true),
                    Err(_) => true,
                }
            }
            Tag::Void => !s,
            Tag::Any => s,
            // Composites and primitives are assumed inhabited, as are
            // their complements.
            _ => true,
        }
    }
}

/// Union under a positive sign, or intersection under a negative sign
/// (De Morgan), decomposes existentially.
fn is_existential(tag: Tag, sign: bool) -> bool {
    (tag == Tag::Union && sign) || (tag == Tag::Intersection && !sign)
}

/// Intersection under a positive sign, or union under a negative sign,
/// decomposes universally over pairwise tests.
fn is_universal(tag: Tag, sign: bool) -> bool {
    (tag == Tag::Intersection && sign) || (tag == Tag::Union && !sign)
}

/// A side whose signed denotation is the empty set.
fn side_is_empty(tag: Tag, sign: bool) -> bool {
    (tag == Tag::Void && sign) || (tag == Tag::Any && !sign)
}

/// A side whose signed denotation is every value.
fn side_is_universe(tag: Tag, sign: bool) -> bool {
    (tag == Tag::Any && sign) || (tag == Tag::Void && !sign)
}

// ── Implicit coercive subtyping ─────────────────────────────────────

/// Decide `a ≤ b` under the implicit coercions the language applies
/// transparently: `byte ≤ int`, `char ≤ int`, `int ≤ real`, lifted
/// covariantly through collections, tuples and records, plus the
/// list-to-set promotion.
pub fn is_coercive_subtype(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    a: TypeId,
    b: TypeId,
) -> bool {
    let mut seen = FxHashSet::default();
    coercive(pool, nominals, a, b, &mut seen)
}

fn coercive(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    a: TypeId,
    b: TypeId,
    seen: &mut FxHashSet<(u32, u32)>,
) -> bool {
    if a == b {
        return true;
    }
    // Coinductive guard for nominal cycles.
    if !seen.insert((a.raw(), b.raw())) {
        return true;
    }

    if is_subtype(pool, nominals, a, b) {
        return true;
    }

    match (pool.tag(a), pool.tag(b)) {
        // Numeric promotions.
        (Tag::Byte | Tag::Char, Tag::Int) => true,
        (Tag::Byte | Tag::Char | Tag::Int, Tag::Real) => true,

        (Tag::Nominal, _) => {
            let name = pool.nominal_name(a);
            match nominals.expand(pool, name) {
                Ok(e) => coercive(pool, nominals, e, b, seen),
                Err(_) => false,
            }
        }
        (_, Tag::Nominal) => {
            let name = pool.nominal_name(b);
            match nominals.expand(pool, name) {
                Ok(e) => coercive(pool, nominals, a, e, seen),
                Err(_) => false,
            }
        }

        (Tag::Union, _) => pool
            .children(a)
            .into_iter()
            .all(|c| coercive(pool, nominals, c, b, seen)),
        (_, Tag::Union) => pool
            .children(b)
            .into_iter()
            .any(|c| coercive(pool, nominals, a, c, seen)),

        (Tag::List, Tag::List) | (Tag::Set, Tag::Set) | (Tag::List, Tag::Set) => {
            let ea = pool.element(a);
            let eb = pool.element(b);
            coercive(pool, nominals, ea, eb, seen)
        }

        (Tag::Map, Tag::Map) => {
            let (ka, va) = (pool.map_key(a), pool.map_value(a));
            let (kb, vb) = (pool.map_key(b), pool.map_value(b));
            coercive(pool, nominals, ka, kb, seen) && coercive(pool, nominals, va, vb, seen)
        }

        (Tag::Tuple, Tag::Tuple) => {
            let ca = pool.children(a);
            let cb = pool.children(b);
            ca.len() == cb.len()
                && ca
                    .into_iter()
                    .zip(cb)
                    .all(|(x, y)| coercive(pool, nominals, x, y, seen))
        }

        (Tag::Record, Tag::Record) => {
            // Every field b requires must coerce from a's field; a closed
            // target admits no extras.
            let fb = pool.record_fields(b);
            if !pool.record_is_open(b)
                && (pool.record_is_open(a) || pool.record_field_count(a) != fb.len())
            {
                return false;
            }
            fb.into_iter().all(|(name, tb)| {
                pool.record_field_type(a, name)
                    .is_some_and(|ta| coercive(pool, nominals, ta, tb, seen))
            })
        }

        _ => false,
    }
}
