//! Declaration pattern destructuring.
//!
//! `destructure` walks a pattern against the root register, loading each
//! component into a freshly allocated register and binding names as it
//! goes. A leaf with a binding aliases the root register itself.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{AstArena, PatternId, PatternKind};
use tern_ir::{Insn, Reg, UnArith};
use tern_types::{effective, TypeId};

use crate::generator::{FnBuilder, Generator};

impl Generator<'_> {
    /// Destructure `pattern` from the value in `root` of type `ty`.
    pub(crate) fn destructure(
        &mut self,
        b: &mut FnBuilder,
        arena: &AstArena,
        root: Reg,
        pattern: PatternId,
        ty: TypeId,
    ) -> DiagResult<()> {
        let p = arena.pattern(pattern).clone();
        let span = p.span;
        match p.kind {
            PatternKind::Leaf(None) => Ok(()),
            PatternKind::Leaf(Some(name)) => {
                b.env.bind(name, root);
                Ok(())
            }
            PatternKind::Record(fields) => {
                let record = effective::as_record(self.pool, &self.module.nominals, ty)
                    .ok_or_else(|| {
                        Diagnostic::bug(
                            ErrorCode::E9002,
                            "record pattern over a non-record survived resolution",
                            span,
                        )
                    })?;
                for (field, sub) in fields {
                    let field_ty =
                        self.pool.record_field_type(record, field).ok_or_else(|| {
                            Diagnostic::bug(
                                ErrorCode::E9002,
                                "record pattern field survived resolution unmatched",
                                span,
                            )
                        })?;
                    let target = b.env.alloc(field_ty);
                    b.push(
                        Insn::FieldLoad {
                            ty,
                            target,
                            src: root,
                            field,
                        },
                        span,
                    );
                    self.destructure(b, arena, target, sub, field_ty)?;
                }
                Ok(())
            }
            PatternKind::Tuple(elems) => {
                let tuple = effective::as_tuple(self.pool, &self.module.nominals, ty)
                    .ok_or_else(|| {
                        Diagnostic::bug(
                            ErrorCode::E9002,
                            "tuple pattern over a non-tuple survived resolution",
                            span,
                        )
                    })?;
                let components = self.pool.children(tuple);
                for (i, (&sub, &component)) in elems.iter().zip(&components).enumerate() {
                    let target = b.env.alloc(component);
                    b.push(
                        Insn::TupleLoad {
                            ty,
                            target,
                            src: root,
                            index: i as u32,
                        },
                        span,
                    );
                    self.destructure(b, arena, target, sub, component)?;
                }
                Ok(())
            }
            PatternKind::Rational { num, den } => {
                let num_reg = b.env.alloc(TypeId::INT);
                b.push(
                    Insn::UnArithOp {
                        ty,
                        kind: UnArith::Numerator,
                        target: num_reg,
                        operand: root,
                    },
                    span,
                );
                self.destructure(b, arena, num_reg, num, TypeId::INT)?;
                let den_reg = b.env.alloc(TypeId::INT);
                b.push(
                    Insn::UnArithOp {
                        ty,
                        kind: UnArith::Denominator,
                        target: den_reg,
                        operand: root,
                    },
                    span,
                );
                self.destructure(b, arena, den_reg, den, TypeId::INT)
            }
        }
    }

    /// Declaration without an initializer: allocate registers and record
    /// the names, but emit no code. The observable bytecode is identical
    /// to never having declared.
    pub(crate) fn declare_silent(
        &mut self,
        b: &mut FnBuilder,
        arena: &AstArena,
        pattern: PatternId,
        ty: TypeId,
    ) -> DiagResult<()> {
        let p = arena.pattern(pattern).clone();
        let span = p.span;
        match p.kind {
            PatternKind::Leaf(None) => Ok(()),
            PatternKind::Leaf(Some(name)) => {
                b.env.declare(name, ty);
                Ok(())
            }
            PatternKind::Record(fields) => {
                let record = effective::as_record(self.pool, &self.module.nominals, ty)
                    .ok_or_else(|| {
                        Diagnostic::bug(
                            ErrorCode::E9002,
                            "record pattern over a non-record survived resolution",
                            span,
                        )
                    })?;
                for (field, sub) in fields {
                    let field_ty =
                        self.pool.record_field_type(record, field).ok_or_else(|| {
                            Diagnostic::bug(
                                ErrorCode::E9002,
                                "record pattern field survived resolution unmatched",
                                span,
                            )
                        })?;
                    self.declare_silent(b, arena, sub, field_ty)?;
                }
                Ok(())
            }
            PatternKind::Tuple(elems) => {
                let tuple = effective::as_tuple(self.pool, &self.module.nominals, ty)
                    .ok_or_else(|| {
                        Diagnostic::bug(
                            ErrorCode::E9002,
                            "tuple pattern over a non-tuple survived resolution",
                            span,
                        )
                    })?;
                let components = self.pool.children(tuple);
                for (&sub, &component) in elems.iter().zip(&components) {
                    self.declare_silent(b, arena, sub, component)?;
                }
                Ok(())
            }
            PatternKind::Rational { num, den } => {
                self.declare_silent(b, arena, num, TypeId::INT)?;
                self.declare_silent(b, arena, den, TypeId::INT)
            }
        }
    }
}
