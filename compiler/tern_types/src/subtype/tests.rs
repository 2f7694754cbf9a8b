use pretty_assertions::assert_eq;
use proptest::prelude::*;

use tern_ir::{Name, StringInterner, TypeId};

use super::{is_coercive_subtype, is_subtype, SubtypeQuery};
use crate::{NominalTable, NoNominals, Pool};

fn subtype(pool: &mut Pool, a: TypeId, b: TypeId) -> bool {
    is_subtype(pool, &NoNominals, a, b)
}

#[test]
fn primitives_are_reflexive_and_disjoint() {
    let mut pool = Pool::new();
    for t in [
        TypeId::NULL,
        TypeId::BOOL,
        TypeId::BYTE,
        TypeId::INT,
        TypeId::REAL,
        TypeId::CHAR,
        TypeId::STRING,
    ] {
        assert!(subtype(&mut pool, t, t), "{t} <: {t}");
    }
    assert!(!subtype(&mut pool, TypeId::INT, TypeId::BOOL));
    // No implicit numeric widening at the engine level.
    assert!(!subtype(&mut pool, TypeId::INT, TypeId::REAL));
}

#[test]
fn any_is_top_and_void_is_bottom() {
    let mut pool = Pool::new();
    let list = pool.list(TypeId::INT);
    let union = pool.union(&[TypeId::INT, TypeId::NULL]);
    for t in [TypeId::INT, TypeId::VOID, TypeId::ANY, list, union] {
        assert!(subtype(&mut pool, t, TypeId::ANY), "{t} <: any");
        assert!(subtype(&mut pool, TypeId::VOID, t), "void <: {t}");
    }
    assert!(!subtype(&mut pool, TypeId::ANY, TypeId::INT));
    assert!(!subtype(&mut pool, TypeId::INT, TypeId::VOID));
}

#[test]
fn union_subtyping() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);
    let int_null_bool = pool.union(&[TypeId::INT, TypeId::NULL, TypeId::BOOL]);

    assert!(subtype(&mut pool, TypeId::INT, int_null));
    assert!(subtype(&mut pool, int_null, int_null_bool));
    assert!(!subtype(&mut pool, int_null, TypeId::INT));
    assert!(!subtype(&mut pool, int_null_bool, int_null));
}

#[test]
fn negation_subtyping() {
    let mut pool = Pool::new();
    let not_int = pool.negation(TypeId::INT);

    // bool excludes no bools, so bool <: !int but int is not.
    assert!(subtype(&mut pool, TypeId::BOOL, not_int));
    assert!(!subtype(&mut pool, TypeId::INT, not_int));
    assert!(!subtype(&mut pool, not_int, TypeId::BOOL));
}

#[test]
fn intersection_refinement_narrows() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);

    // (int|null) & int = the canonical refinement of a non-null test
    let not_null = pool.negation(TypeId::NULL);
    let refined = pool.intersect_of(int_null, not_null);
    assert!(subtype(&mut pool, refined, TypeId::INT));
    assert!(subtype(&mut pool, TypeId::INT, refined));
}

#[test]
fn list_and_set_covariance() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);
    let li = pool.list(TypeId::INT);
    let ln = pool.list(int_null);
    let si = pool.set(TypeId::INT);

    assert!(subtype(&mut pool, li, ln));
    assert!(!subtype(&mut pool, ln, li));
    // Lists and sets only share the empty collection, so neither
    // includes the other.
    assert!(!subtype(&mut pool, li, si));
    assert!(!subtype(&mut pool, si, li));
}

#[test]
fn empty_collection_inhabits_list_and_set_intersection() {
    let mut pool = Pool::new();
    let li = pool.list(TypeId::INT);
    let sb = pool.set(TypeId::BOOL);
    let mut q = SubtypeQuery::new(&mut pool, &NoNominals);
    assert!(q.is_inhabited(li, true, sb, true));
}

#[test]
fn tuple_subtyping_is_pointwise_and_arity_strict() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);
    let t2 = pool.tuple(&[TypeId::INT, TypeId::INT]);
    let t2_wide = pool.tuple(&[TypeId::INT, int_null]);
    let t3 = pool.tuple(&[TypeId::INT, TypeId::INT, TypeId::INT]);

    assert!(subtype(&mut pool, t2, t2_wide));
    assert!(!subtype(&mut pool, t2_wide, t2));
    assert!(!subtype(&mut pool, t2, t3));
    assert!(!subtype(&mut pool, t3, t2));
}

#[test]
fn map_subtyping_is_pointwise() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);
    let m = pool.map(TypeId::STRING, TypeId::INT);
    let m_wide = pool.map(TypeId::STRING, int_null);
    assert!(subtype(&mut pool, m, m_wide));
    assert!(!subtype(&mut pool, m_wide, m));
}

#[test]
fn function_variance() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);

    // (int|null) => int  <:  int => int|null
    let f_wide_params = pool.function(&[int_null], TypeId::INT, TypeId::VOID);
    let f_narrow = pool.function(&[TypeId::INT], int_null, TypeId::VOID);
    assert!(subtype(&mut pool, f_wide_params, f_narrow));
    assert!(!subtype(&mut pool, f_narrow, f_wide_params));

    // Arity must match.
    let f2 = pool.function(&[TypeId::INT, TypeId::INT], TypeId::INT, TypeId::VOID);
    assert!(!subtype(&mut pool, f_narrow, f2));

    // Throws is covariant.
    let t_int = pool.function(&[TypeId::INT], TypeId::INT, TypeId::INT);
    let t_wide = pool.function(&[TypeId::INT], TypeId::INT, int_null);
    assert!(subtype(&mut pool, t_int, t_wide));
    assert!(!subtype(&mut pool, t_wide, t_int));

    // Methods and functions are distinct kinds.
    let m = pool.method(&[TypeId::INT], TypeId::INT, TypeId::VOID);
    let f = pool.function(&[TypeId::INT], TypeId::INT, TypeId::VOID);
    assert!(!subtype(&mut pool, m, f));
}

#[test]
fn record_width_and_depth_subtyping() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let x = interner.intern("x");
    let y = interner.intern("y");

    let closed_xy = pool.record(&[(x, TypeId::INT), (y, TypeId::INT)], false);
    let open_x = pool.record(&[(x, TypeId::INT)], true);
    let closed_x = pool.record(&[(x, TypeId::INT)], false);

    // Width: a closed record with more fields flows into an open one.
    assert!(subtype(&mut pool, closed_xy, open_x));
    assert!(!subtype(&mut pool, open_x, closed_xy));

    // A closed record with extra fields is not a closed smaller record.
    assert!(!subtype(&mut pool, closed_xy, closed_x));
    assert!(!subtype(&mut pool, closed_x, closed_xy));

    // An open record is not a closed record: it may carry extras.
    assert!(!subtype(&mut pool, open_x, closed_x));
    assert!(subtype(&mut pool, closed_x, open_x));

    // Depth.
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);
    let closed_x_wide = pool.record(&[(x, int_null)], false);
    assert!(subtype(&mut pool, closed_x, closed_x_wide));
    assert!(!subtype(&mut pool, closed_x_wide, closed_x));
}

#[test]
fn nominal_same_name_and_expansion() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let point = interner.intern("Point");
    let n = pool.nominal(point);

    // Same name answers from signs alone, even with no resolver.
    assert!(subtype(&mut pool, n, n));

    // Expansion bridges nominal and structural reasoning.
    let x = interner.intern("x");
    let rec = pool.record(&[(x, TypeId::INT)], false);
    let mut table = NominalTable::new();
    table.insert(point, rec);
    assert!(is_subtype(&mut pool, &table, n, rec));
    assert!(is_subtype(&mut pool, &table, rec, n));

    // Unknown names fall back to nominal-only disjointness.
    let ghost = pool.nominal(interner.intern("Ghost"));
    assert!(!is_subtype(&mut pool, &table, ghost, rec));
}

#[test]
fn recursive_nominal_terminates() {
    // LinkedList = null | {int data, LinkedList next}
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let list_name = interner.intern("LinkedList");
    let data = interner.intern("data");
    let next = interner.intern("next");

    let nom = pool.nominal(list_name);
    let node = pool.record(&[(data, TypeId::INT), (next, nom)], false);
    let expansion = pool.union(&[TypeId::NULL, node]);
    let mut table = NominalTable::new();
    table.insert(list_name, expansion);

    // Terminates and is reflexive through the cycle.
    assert!(is_subtype(&mut pool, &table, nom, nom));
    assert!(is_subtype(&mut pool, &table, expansion, nom));
    assert!(is_subtype(&mut pool, &table, nom, expansion));
    assert!(is_subtype(&mut pool, &table, TypeId::NULL, nom));
    assert!(!is_subtype(&mut pool, &table, TypeId::INT, nom));

    // Two mutually recursive names with identical shape also terminate.
    let other_name = interner.intern("OtherList");
    let other_nom = pool.nominal(other_name);
    let other_node = pool.record(&[(data, TypeId::INT), (next, other_nom)], false);
    let other_expansion = pool.union(&[TypeId::NULL, other_node]);
    table.insert(other_name, other_expansion);
    assert!(is_subtype(&mut pool, &table, nom, other_nom));
}

#[test]
fn coercive_numeric_promotions() {
    let mut pool = Pool::new();
    assert!(is_coercive_subtype(&mut pool, &NoNominals, TypeId::INT, TypeId::REAL));
    assert!(is_coercive_subtype(&mut pool, &NoNominals, TypeId::CHAR, TypeId::INT));
    assert!(is_coercive_subtype(&mut pool, &NoNominals, TypeId::BYTE, TypeId::INT));
    assert!(!is_coercive_subtype(&mut pool, &NoNominals, TypeId::REAL, TypeId::INT));
    assert!(!is_coercive_subtype(&mut pool, &NoNominals, TypeId::INT, TypeId::CHAR));
}

#[test]
fn coercive_lifts_through_collections() {
    let mut pool = Pool::new();
    let li = pool.list(TypeId::INT);
    let lr = pool.list(TypeId::REAL);
    let si = pool.set(TypeId::INT);
    let sr = pool.set(TypeId::REAL);

    assert!(is_coercive_subtype(&mut pool, &NoNominals, li, lr));
    assert!(is_coercive_subtype(&mut pool, &NoNominals, li, si));
    assert!(is_coercive_subtype(&mut pool, &NoNominals, li, sr));
    assert!(!is_coercive_subtype(&mut pool, &NoNominals, si, li));
}

// ── Property tests ──────────────────────────────────────────────────

/// A small, negation-free slice of the algebra: enough structure to
/// exercise every atom rule while staying in the engine's exact fragment.
fn arb_type() -> impl Strategy<Value = TypeGen> {
    let leaf = prop_oneof![
        Just(TypeGen::Prim(TypeId::VOID)),
        Just(TypeGen::Prim(TypeId::ANY)),
        Just(TypeGen::Prim(TypeId::NULL)),
        Just(TypeGen::Prim(TypeId::BOOL)),
        Just(TypeGen::Prim(TypeId::INT)),
        Just(TypeGen::Prim(TypeId::REAL)),
        Just(TypeGen::Prim(TypeId::STRING)),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| TypeGen::List(Box::new(t))),
            inner.clone().prop_map(|t| TypeGen::Set(Box::new(t))),
            prop::collection::vec(inner.clone(), 1..3).prop_map(TypeGen::Tuple),
            prop::collection::vec(inner.clone(), 2..4).prop_map(TypeGen::Union),
            (prop::collection::vec(inner.clone(), 1..3), any::<bool>())
                .prop_map(|(fields, open)| TypeGen::Record(fields, open)),
            (prop::collection::vec(inner.clone(), 0..3), inner)
                .prop_map(|(params, ret)| TypeGen::Function(params, Box::new(ret))),
        ]
    })
}

#[derive(Clone, Debug)]
enum TypeGen {
    Prim(TypeId),
    List(Box<TypeGen>),
    Set(Box<TypeGen>),
    Tuple(Vec<TypeGen>),
    Union(Vec<TypeGen>),
    Record(Vec<TypeGen>, bool),
    Function(Vec<TypeGen>, Box<TypeGen>),
}

impl TypeGen {
    fn build(&self, pool: &mut Pool) -> TypeId {
        match self {
            TypeGen::Prim(t) => *t,
            TypeGen::List(e) => {
                let e = e.build(pool);
                pool.list(e)
            }
            TypeGen::Set(e) => {
                let e = e.build(pool);
                pool.set(e)
            }
            TypeGen::Tuple(elems) => {
                let elems: Vec<TypeId> = elems.iter().map(|e| e.build(pool)).collect();
                pool.tuple(&elems)
            }
            TypeGen::Union(elems) => {
                let elems: Vec<TypeId> = elems.iter().map(|e| e.build(pool)).collect();
                pool.union(&elems)
            }
            TypeGen::Record(fields, open) => {
                let fields: Vec<(Name, TypeId)> = fields
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (Name::from_raw(i as u32 + 1), t.build(pool)))
                    .collect();
                pool.record(&fields, *open)
            }
            TypeGen::Function(params, ret) => {
                let params: Vec<TypeId> = params.iter().map(|p| p.build(pool)).collect();
                let ret = ret.build(pool);
                pool.function(&params, ret, TypeId::VOID)
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_top_bottom(gen in arb_type()) {
        let mut pool = Pool::new();
        let t = gen.build(&mut pool);
        prop_assert!(subtype(&mut pool, t, TypeId::ANY));
        prop_assert!(subtype(&mut pool, TypeId::VOID, t));
    }

    #[test]
    fn prop_reflexive(gen in arb_type()) {
        let mut pool = Pool::new();
        let t = gen.build(&mut pool);
        prop_assert!(subtype(&mut pool, t, t));
    }

    #[test]
    fn prop_antisymmetry(a in arb_type(), b in arb_type()) {
        let mut pool = Pool::new();
        let ta = a.build(&mut pool);
        let tb = b.build(&mut pool);
        if subtype(&mut pool, ta, tb) && subtype(&mut pool, tb, ta) {
            prop_assert_eq!(ta, tb);
        }
    }

    #[test]
    fn prop_transitivity(a in arb_type(), b in arb_type(), c in arb_type()) {
        let mut pool = Pool::new();
        let ta = a.build(&mut pool);
        let tb = b.build(&mut pool);
        let tc = c.build(&mut pool);
        if subtype(&mut pool, ta, tb) && subtype(&mut pool, tb, tc) {
            prop_assert!(subtype(&mut pool, ta, tc));
        }
    }

    #[test]
    fn prop_function_variance(p1 in arb_type(), r1 in arb_type(), p2 in arb_type(), r2 in arb_type()) {
        let mut pool = Pool::new();
        let (p1, r1) = (p1.build(&mut pool), r1.build(&mut pool));
        let (p2, r2) = (p2.build(&mut pool), r2.build(&mut pool));
        let f1 = pool.function(&[p1], r1, TypeId::VOID);
        let f2 = pool.function(&[p2], r2, TypeId::VOID);
        let expected = subtype(&mut pool, p2, p1) && subtype(&mut pool, r1, r2);
        prop_assert_eq!(subtype(&mut pool, f1, f2), expected);
    }

    // Union introduction: every member flows into the union.
    #[test]
    fn prop_union_upper_bound(a in arb_type(), b in arb_type()) {
        let mut pool = Pool::new();
        let ta = a.build(&mut pool);
        let tb = b.build(&mut pool);
        let u = pool.union_of(ta, tb);
        prop_assert!(subtype(&mut pool, ta, u));
        prop_assert!(subtype(&mut pool, tb, u));
    }
}
