use pretty_assertions::assert_eq;

use tern_ir::{StringInterner, TypeId};

use super::Pool;
use crate::{Tag, TypeFlags};

#[test]
fn primitives_at_fixed_indices() {
    let pool = Pool::new();
    assert_eq!(pool.tag(TypeId::VOID), Tag::Void);
    assert_eq!(pool.tag(TypeId::ANY), Tag::Any);
    assert_eq!(pool.tag(TypeId::NULL), Tag::Null);
    assert_eq!(pool.tag(TypeId::BOOL), Tag::Bool);
    assert_eq!(pool.tag(TypeId::BYTE), Tag::Byte);
    assert_eq!(pool.tag(TypeId::INT), Tag::Int);
    assert_eq!(pool.tag(TypeId::REAL), Tag::Real);
    assert_eq!(pool.tag(TypeId::CHAR), Tag::Char);
    assert_eq!(pool.tag(TypeId::STRING), Tag::String);
    assert_eq!(pool.len() as u32, TypeId::FIRST_DYNAMIC);
}

#[test]
fn interning_deduplicates() {
    let mut pool = Pool::new();
    let a = pool.list(TypeId::INT);
    let b = pool.list(TypeId::INT);
    assert_eq!(a, b);

    let c = pool.list(TypeId::REAL);
    assert_ne!(a, c);
}

#[test]
fn union_flattens_sorts_and_dedups() {
    let mut pool = Pool::new();
    let ab = pool.union(&[TypeId::INT, TypeId::NULL]);
    let ba = pool.union(&[TypeId::NULL, TypeId::INT]);
    assert_eq!(ab, ba);

    // nested union flattens into one level
    let nested = pool.union(&[ab, TypeId::BOOL]);
    let flat = pool.union(&[TypeId::INT, TypeId::NULL, TypeId::BOOL]);
    assert_eq!(nested, flat);
    assert_eq!(pool.child_count(nested), 3);

    // duplicates collapse
    let dup = pool.union(&[TypeId::INT, TypeId::INT]);
    assert_eq!(dup, TypeId::INT);
}

#[test]
fn union_identity_and_annihilator() {
    let mut pool = Pool::new();
    assert_eq!(pool.union(&[TypeId::VOID, TypeId::INT]), TypeId::INT);
    assert_eq!(pool.union(&[TypeId::ANY, TypeId::INT]), TypeId::ANY);
    assert_eq!(pool.union(&[]), TypeId::VOID);
}

#[test]
fn intersect_identity_and_annihilator() {
    let mut pool = Pool::new();
    assert_eq!(pool.intersect(&[TypeId::ANY, TypeId::INT]), TypeId::INT);
    assert_eq!(pool.intersect(&[TypeId::VOID, TypeId::INT]), TypeId::VOID);
    assert_eq!(pool.intersect(&[]), TypeId::ANY);
}

#[test]
fn intersect_distributes_and_cancels() {
    let mut pool = Pool::new();
    let int_null = pool.union(&[TypeId::INT, TypeId::NULL]);

    // (int|null) & !null = int — the flow-refinement shape.
    let not_null = pool.negation(TypeId::NULL);
    assert_eq!(pool.intersect_of(int_null, not_null), TypeId::INT);

    // (int|null) & null = null.
    assert_eq!(pool.intersect_of(int_null, TypeId::NULL), TypeId::NULL);

    // Disjoint primitives annihilate.
    assert_eq!(pool.intersect_of(TypeId::INT, TypeId::NULL), TypeId::VOID);

    // T & !T = void.
    let not_int = pool.negation(TypeId::INT);
    assert_eq!(pool.intersect_of(TypeId::INT, not_int), TypeId::VOID);

    // Same-kind composites keep the conjunction.
    let li = pool.list(TypeId::INT);
    let lb = pool.list(TypeId::BOOL);
    let conj = pool.intersect_of(li, lb);
    assert_eq!(pool.tag(conj), Tag::Intersection);
}

#[test]
fn double_negation_collapses() {
    let mut pool = Pool::new();
    let not_int = pool.negation(TypeId::INT);
    assert_eq!(pool.tag(not_int), Tag::Negation);
    assert_eq!(pool.negation(not_int), TypeId::INT);
}

#[test]
fn negation_of_top_and_bottom() {
    let mut pool = Pool::new();
    assert_eq!(pool.negation(TypeId::ANY), TypeId::VOID);
    assert_eq!(pool.negation(TypeId::VOID), TypeId::ANY);
}

#[test]
fn de_morgan_lifts_negation_through_union() {
    let mut pool = Pool::new();
    let u = pool.union(&[TypeId::INT, TypeId::NULL]);
    let n = pool.negation(u);

    // !(int|null) = !int & !null
    assert_eq!(pool.tag(n), Tag::Intersection);
    for child in pool.children(n) {
        assert_eq!(pool.tag(child), Tag::Negation);
    }
}

#[test]
fn record_fields_are_sorted() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let f = interner.intern("f");
    let g = interner.intern("g");

    let a = pool.record(&[(g, TypeId::BOOL), (f, TypeId::INT)], false);
    let b = pool.record(&[(f, TypeId::INT), (g, TypeId::BOOL)], false);
    assert_eq!(a, b);

    let fields = pool.record_fields(a);
    assert!(fields.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(pool.record_field_type(a, f), Some(TypeId::INT));
    assert_eq!(pool.record_field_type(a, g), Some(TypeId::BOOL));
}

#[test]
fn open_flag_distinguishes_records() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let f = interner.intern("f");

    let closed = pool.record(&[(f, TypeId::INT)], false);
    let open = pool.record(&[(f, TypeId::INT)], true);
    assert_ne!(closed, open);
    assert!(pool.record_is_open(open));
    assert!(!pool.record_is_open(closed));
}

#[test]
fn callable_layout_round_trips() {
    let mut pool = Pool::new();
    let f = pool.function(&[TypeId::INT, TypeId::REAL], TypeId::BOOL, TypeId::VOID);
    assert_eq!(pool.callable_param_count(f), 2);
    assert_eq!(pool.callable_param(f, 0), TypeId::INT);
    assert_eq!(pool.callable_param(f, 1), TypeId::REAL);
    assert_eq!(pool.callable_return(f), TypeId::BOOL);
    assert_eq!(pool.callable_throws(f), TypeId::VOID);

    let m = pool.method(&[TypeId::INT, TypeId::REAL], TypeId::BOOL, TypeId::VOID);
    assert_ne!(f, m);
}

#[test]
fn nominal_flag_propagates() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let n = pool.nominal(interner.intern("List"));
    let l = pool.list(n);
    assert!(pool.flags(l).contains(TypeFlags::HAS_NOMINAL));
    assert!(!pool.flags(TypeId::INT).contains(TypeFlags::HAS_NOMINAL));
}

#[test]
fn format_renders_source_like_text() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let f = interner.intern("f");
    let g = interner.intern("g");

    let list = pool.list(TypeId::INT);
    assert_eq!(pool.format(list, &interner), "[int]");

    let u = pool.union(&[TypeId::INT, TypeId::NULL]);
    assert_eq!(pool.format(u, &interner), "null|int");

    let rec = pool.record(&[(f, TypeId::INT), (g, TypeId::BOOL)], false);
    assert_eq!(pool.format(rec, &interner), "{int f, bool g}");

    let open = pool.record(&[(f, TypeId::INT)], true);
    assert_eq!(pool.format(open, &interner), "{int f, ...}");

    let func = pool.function(&[TypeId::INT], TypeId::BOOL, TypeId::VOID);
    assert_eq!(pool.format(func, &interner), "(int)=>bool");
}
