//! Effective-type queries.
//!
//! An *effective X* is a type structurally usable as an `X` after all
//! nominal expansions: a nominal naming a list is an effective list, and
//! a union of lists is an effective list whose element is the union of
//! the member elements. The resolver and the code generator use these
//! queries to pick concrete operations for abstract AST nodes.

use rustc_hash::FxHashSet;
use tern_ir::TypeId;

use crate::{NominalResolver, Pool, Tag};

/// Structural shape of a collection type, with its element layout.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Collection {
    List(TypeId),
    Set(TypeId),
    Map(TypeId, TypeId),
    /// Strings iterate and index as chars.
    String,
}

/// Element type of an effective list, if any.
pub fn as_list(pool: &mut Pool, nominals: &dyn NominalResolver, t: TypeId) -> Option<TypeId> {
    shape(pool, nominals, t, Tag::List)
}

/// Element type of an effective set, if any.
pub fn as_set(pool: &mut Pool, nominals: &dyn NominalResolver, t: TypeId) -> Option<TypeId> {
    shape(pool, nominals, t, Tag::Set)
}

/// Referent type of an effective reference, if any.
pub fn as_reference(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    t: TypeId,
) -> Option<TypeId> {
    shape(pool, nominals, t, Tag::Reference)
}

/// Key/value types of an effective map, if any.
pub fn as_map(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    t: TypeId,
) -> Option<(TypeId, TypeId)> {
    let mut seen = FxHashSet::default();
    as_map_inner(pool, nominals, t, &mut seen)
}

/// True if `t` expands to exactly `string`.
pub fn is_string(pool: &mut Pool, nominals: &dyn NominalResolver, t: TypeId) -> bool {
    expand_atom(pool, nominals, t) == TypeId::STRING
}

/// The callable signature behind `t`, if any.
pub fn as_callable(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    t: TypeId,
) -> Option<TypeId> {
    let e = expand_atom(pool, nominals, t);
    pool.tag(e).is_callable().then_some(e)
}

/// The record behind `t`, if any.
///
/// A union of records is an effective record carrying the fields common
/// to every member, each typed as the union across members.
pub fn as_record(pool: &mut Pool, nominals: &dyn NominalResolver, t: TypeId) -> Option<TypeId> {
    let e = expand_atom(pool, nominals, t);
    match pool.tag(e) {
        Tag::Record => Some(e),
        Tag::Union => {
            let members: Option<Vec<TypeId>> = pool
                .children(e)
                .into_iter()
                .map(|c| {
                    let c = expand_atom(pool, nominals, c);
                    (pool.tag(c) == Tag::Record).then_some(c)
                })
                .collect();
            let members = members?;
            let first = *members.first()?;

            let mut fields = Vec::new();
            for (name, ty) in pool.record_fields(first) {
                let mut arms = vec![ty];
                let mut in_all = true;
                for &m in &members[1..] {
                    match pool.record_field_type(m, name) {
                        Some(other) => arms.push(other),
                        None => {
                            in_all = false;
                            break;
                        }
                    }
                }
                if in_all {
                    let joined = pool.union(&arms);
                    fields.push((name, joined));
                }
            }
            let open = members.iter().any(|&m| pool.record_is_open(m));
            Some(pool.record(&fields, open))
        }
        _ => None,
    }
}

/// The tuple behind `t`, if any.
pub fn as_tuple(pool: &mut Pool, nominals: &dyn NominalResolver, t: TypeId) -> Option<TypeId> {
    let e = expand_atom(pool, nominals, t);
    (pool.tag(e) == Tag::Tuple).then_some(e)
}

/// Collection shape used by iteration and indexing dispatch.
pub fn as_collection(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    t: TypeId,
) -> Option<Collection> {
    if is_string(pool, nominals, t) {
        return Some(Collection::String);
    }
    if let Some(elem) = as_list(pool, nominals, t) {
        return Some(Collection::List(elem));
    }
    if let Some(elem) = as_set(pool, nominals, t) {
        return Some(Collection::Set(elem));
    }
    if let Some((k, v)) = as_map(pool, nominals, t) {
        return Some(Collection::Map(k, v));
    }
    None
}

/// Expand nominal indirection (but not unions) to the underlying type.
pub fn expand_atom(pool: &mut Pool, nominals: &dyn NominalResolver, t: TypeId) -> TypeId {
    let mut seen = FxHashSet::default();
    let mut current = t;
    while pool.tag(current) == Tag::Nominal {
        if !seen.insert(current) {
            return current;
        }
        let name = pool.nominal_name(current);
        match nominals.expand(pool, name) {
            Ok(e) => current = e,
            Err(_) => return current,
        }
    }
    current
}

/// Single-child shape query for list/set/reference, merging across
/// unions.
fn shape(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    t: TypeId,
    want: Tag,
) -> Option<TypeId> {
    let e = expand_atom(pool, nominals, t);
    let tag = pool.tag(e);
    if tag == want {
        return Some(pool.element(e));
    }
    if tag == Tag::Union {
        let elems: Option<Vec<TypeId>> = pool
            .children(e)
            .into_iter()
            .map(|c| shape(pool, nominals, c, want))
            .collect();
        return elems.map(|elems| pool.union(&elems));
    }
    None
}

fn as_map_inner(
    pool: &mut Pool,
    nominals: &dyn NominalResolver,
    t: TypeId,
    seen: &mut FxHashSet<TypeId>,
) -> Option<(TypeId, TypeId)> {
    if !seen.insert(t) {
        return None;
    }
    let e = expand_atom(pool, nominals, t);
    match pool.tag(e) {
        Tag::Map => Some((pool.map_key(e), pool.map_value(e))),
        Tag::Union => {
            let parts: Option<Vec<(TypeId, TypeId)>> = pool
                .children(e)
                .into_iter()
                .map(|c| as_map_inner(pool, nominals, c, seen))
                .collect();
            let parts = parts?;
            let keys: Vec<TypeId> = parts.iter().map(|&(k, _)| k).collect();
            let values: Vec<TypeId> = parts.iter().map(|&(_, v)| v).collect();
            let k = pool.union(&keys);
            let v = pool.union(&values);
            Some((k, v))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NominalTable;
    use tern_ir::StringInterner;

    #[test]
    fn union_of_lists_is_effective_list() {
        let mut pool = Pool::new();
        let li = pool.list(TypeId::INT);
        let ln = pool.list(TypeId::NULL);
        let u = pool.union_of(li, ln);

        let elem = as_list(&mut pool, &crate::NoNominals, u).unwrap();
        let expected = pool.union_of(TypeId::INT, TypeId::NULL);
        assert_eq!(elem, expected);
    }

    #[test]
    fn nominal_expands_to_shape() {
        let interner = StringInterner::new();
        let mut pool = Pool::new();
        let name = interner.intern("IntList");
        let li = pool.list(TypeId::INT);
        let nom = pool.nominal(name);
        let mut table = NominalTable::new();
        table.insert(name, li);

        assert_eq!(as_list(&mut pool, &table, nom), Some(TypeId::INT));
        assert_eq!(
            as_collection(&mut pool, &table, nom),
            Some(Collection::List(TypeId::INT))
        );
    }

    #[test]
    fn string_is_not_an_effective_list() {
        let mut pool = Pool::new();
        assert!(as_list(&mut pool, &crate::NoNominals, TypeId::STRING).is_none());
        assert_eq!(
            as_collection(&mut pool, &crate::NoNominals, TypeId::STRING),
            Some(Collection::String)
        );
    }

    #[test]
    fn union_of_records_keeps_common_fields() {
        let interner = StringInterner::new();
        let mut pool = Pool::new();
        let x = interner.intern("x");
        let y = interner.intern("y");

        let a = pool.record(&[(x, TypeId::INT), (y, TypeId::BOOL)], false);
        let b = pool.record(&[(x, TypeId::NULL)], false);
        let u = pool.union_of(a, b);

        let eff = as_record(&mut pool, &crate::NoNominals, u).unwrap();
        let expected_x = pool.union_of(TypeId::INT, TypeId::NULL);
        assert_eq!(pool.record_field_type(eff, x), Some(expected_x));
        assert_eq!(pool.record_field_type(eff, y), None);
    }
}
