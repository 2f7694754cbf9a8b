use pretty_assertions::assert_eq;
use smallvec::smallvec;

use super::*;
use crate::{Span, TypeId};

#[test]
fn register_display() {
    assert_eq!(Reg::from_raw(3).to_string(), "%3");
    assert_eq!(Reg::NULL.to_string(), "%_");
}

#[test]
fn cmp_inversion_round_trips() {
    for cmp in [Cmp::Eq, Cmp::Neq, Cmp::Lt, Cmp::LtEq, Cmp::Gt, Cmp::GtEq] {
        assert!(cmp.has_inverse());
        assert_eq!(cmp.inverted().inverted(), cmp);
    }
    assert!(!Cmp::ElemOf.has_inverse());
}

#[test]
fn const_and_binop_render() {
    let c = Insn::Const {
        target: Reg::from_raw(3),
        value: Value::Int(1),
    };
    assert_eq!(c.to_string(), "Const %3, 1");

    let add = Insn::BinArithOp {
        ty: TypeId::INT,
        kind: BinArith::Add,
        target: Reg::from_raw(4),
        left: Reg::from_raw(0),
        right: Reg::from_raw(3),
    };
    assert_eq!(add.to_string(), "BinArithOp ADD int %4, %0, %3");
}

#[test]
fn insert_splices_dispatch_before_bodies() {
    let mut block = CodeBlock::new();
    block.push(Insn::Label(LabelId::from_raw(0)), Span::DUMMY);
    block.push(Insn::Nop, Span::DUMMY);
    block.insert(
        0,
        Insn::Switch {
            ty: TypeId::INT,
            operand: Reg::from_raw(1),
            default: LabelId::from_raw(2),
            branches: vec![(Value::Int(0), LabelId::from_raw(0))],
        },
        Span::DUMMY,
    );

    assert!(matches!(block.entry(0).insn, Insn::Switch { .. }));
    assert!(matches!(block.entry(1).insn, Insn::Label(_)));
}

#[test]
fn max_register_scans_operands() {
    let mut block = CodeBlock::new();
    block.push(
        Insn::BinArithOp {
            ty: TypeId::INT,
            kind: BinArith::Add,
            target: Reg::from_raw(2),
            left: Reg::from_raw(7),
            right: Reg::from_raw(1),
        },
        Span::DUMMY,
    );
    assert_eq!(block.max_register(), Some(Reg::from_raw(7)));
    assert_eq!(block.max_label(), None);
}

#[test]
fn map_regs_skips_null_sentinel() {
    let insn = Insn::Invoke {
        ty: TypeId::NONE,
        target: Reg::NULL,
        operands: smallvec![Reg::from_raw(0), Reg::from_raw(1)],
        name: crate::Name::EMPTY,
    };
    let shifted = insn.map_regs(|r| Reg::from_raw(r.raw() + 10));
    match shifted {
        Insn::Invoke {
            target, operands, ..
        } => {
            assert!(target.is_null());
            assert_eq!(operands[0], Reg::from_raw(10));
            assert_eq!(operands[1], Reg::from_raw(11));
        }
        other => panic!("unexpected rewrite: {other:?}"),
    }
}

#[test]
fn defined_reg_for_all_is_loop_var() {
    let insn = Insn::ForAll {
        ty: TypeId::NONE,
        src: Reg::from_raw(0),
        var: Reg::from_raw(5),
        modified: Regs::new(),
        head: LabelId::from_raw(1),
    };
    assert_eq!(insn.defined_reg(), Some(Reg::from_raw(5)));
}
