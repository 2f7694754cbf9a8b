//! Short-circuit condition lowering.
//!
//! `generate_condition(target, cond)` emits instructions such that
//! control transfers to `target` iff `cond` is true, falling through
//! otherwise. Conjunctions invert their left operand around a local exit
//! label; disjunctions chain; `is` tests lower to `IfIs` on the
//! variable's own register so the branch preserves the refinement.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{
    AstArena, BinaryOp, CompBinding, CompSource, ComprehensionKind, ExprId, ExprKind, ForBinding,
    UnaryOp,
};
use tern_ir::{Cmp, Insn, LabelId, Span, Value};
use tern_types::TypeId;

use crate::generator::{FnBuilder, Generator};

/// The branch comparison for a comparison operator, if it is one.
pub(crate) fn comparison_op(op: BinaryOp) -> Option<Cmp> {
    match op {
        BinaryOp::Eq => Some(Cmp::Eq),
        BinaryOp::Neq => Some(Cmp::Neq),
        BinaryOp::Lt => Some(Cmp::Lt),
        BinaryOp::LtEq => Some(Cmp::LtEq),
        BinaryOp::Gt => Some(Cmp::Gt),
        BinaryOp::GtEq => Some(Cmp::GtEq),
        BinaryOp::ElemOf => Some(Cmp::ElemOf),
        BinaryOp::Subset => Some(Cmp::Subset),
        BinaryOp::SubsetEq => Some(Cmp::SubsetEq),
        _ => None,
    }
}

fn flipped(op: BinaryOp) -> Option<BinaryOp> {
    match op {
        BinaryOp::Eq => Some(BinaryOp::Neq),
        BinaryOp::Neq => Some(BinaryOp::Eq),
        BinaryOp::Lt => Some(BinaryOp::GtEq),
        BinaryOp::LtEq => Some(BinaryOp::Gt),
        BinaryOp::Gt => Some(BinaryOp::LtEq),
        BinaryOp::GtEq => Some(BinaryOp::Lt),
        _ => None,
    }
}

impl Generator<'_> {
    /// Syntactic negation: De Morgan over `&&`/`||`, comparison
    /// flipping, `!` peeling; anything else wraps in `NOT`. New nodes
    /// keep the original's source attributes.
    pub(crate) fn invert(&mut self, arena: &mut AstArena, id: ExprId) -> ExprId {
        let span = arena.expr(id).span;
        let kind = arena.expr(id).kind.clone();
        let inverted = match kind {
            ExprKind::Constant(Value::Bool(v)) => {
                arena.alloc_expr(ExprKind::Constant(Value::Bool(!v)), span)
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => return operand,
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let left = self.invert(arena, left);
                let right = self.invert(arena, right);
                arena.alloc_expr(
                    ExprKind::Binary {
                        op: BinaryOp::Or,
                        left,
                        right,
                    },
                    span,
                )
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let left = self.invert(arena, left);
                let right = self.invert(arena, right);
                arena.alloc_expr(
                    ExprKind::Binary {
                        op: BinaryOp::And,
                        left,
                        right,
                    },
                    span,
                )
            }
            ExprKind::Binary { op, left, right } => match flipped(op) {
                Some(flip) => arena.alloc_expr(
                    ExprKind::Binary {
                        op: flip,
                        left,
                        right,
                    },
                    span,
                ),
                None => arena.alloc_expr(ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: id,
                }, span),
            },
            _ => arena.alloc_expr(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: id,
                },
                span,
            ),
        };
        arena.set_expr_type(inverted, TypeId::BOOL);
        inverted
    }

    /// Emit instructions branching to `target` iff `cond` holds.
    pub(crate) fn generate_condition(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        target: LabelId,
        cond: ExprId,
    ) -> DiagResult<()> {
        let span = arena.expr(cond).span;
        let kind = arena.expr(cond).kind.clone();
        match kind {
            ExprKind::Constant(Value::Bool(true)) => {
                b.push(Insn::Goto(target), span);
                Ok(())
            }
            ExprKind::Constant(Value::Bool(false)) => Ok(()),

            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                self.generate_condition(b, arena, target, left)?;
                self.generate_condition(b, arena, target, right)
            }

            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let exit = b.fresh_label();
                let inverted_left = self.invert(arena, left);
                self.generate_condition(b, arena, exit, inverted_left)?;
                self.generate_condition(b, arena, target, right)?;
                b.push(Insn::Label(exit), span);
                Ok(())
            }

            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                // Branch to target iff the operand is false: skip over
                // the goto when the operand holds.
                let skip = b.fresh_label();
                self.generate_condition(b, arena, skip, operand)?;
                b.push(Insn::Goto(target), span);
                b.push(Insn::Label(skip), span);
                Ok(())
            }

            ExprKind::Binary {
                op: BinaryOp::Is,
                left,
                right,
            } => {
                let test_ty = match arena.expr(right).kind {
                    ExprKind::TypeValue(t) => t,
                    _ => {
                        return Err(Diagnostic::bug(
                            ErrorCode::E9002,
                            "`is` without a type operand survived resolution",
                            span,
                        ));
                    }
                };
                self.generate_type_test(b, arena, target, left, test_ty, span)
            }

            // `x == null` / `x != null` on a variable lower to IfIs.
            ExprKind::Binary {
                op: op @ (BinaryOp::Eq | BinaryOp::Neq),
                left,
                right,
            } if null_test_operand(arena, left, right).is_some() => {
                let operand = null_test_operand(arena, left, right)
                    .unwrap_or(left);
                if op == BinaryOp::Eq {
                    self.generate_type_test(b, arena, target, operand, TypeId::NULL, span)
                } else {
                    // Inverse via a small two-branch scheme.
                    let skip = b.fresh_label();
                    self.generate_type_test(b, arena, skip, operand, TypeId::NULL, span)?;
                    b.push(Insn::Goto(target), span);
                    b.push(Insn::Label(skip), span);
                    Ok(())
                }
            }

            ExprKind::Binary { op, left, right } if comparison_op(op).is_some() => {
                let cmp = comparison_op(op).unwrap_or(Cmp::Eq);
                let lt = arena.expr_type(left);
                let rt = arena.expr_type(right);
                let left_reg = self.generate_expr(b, arena, left)?;
                let right_reg = self.generate_expr(b, arena, right)?;
                let ty = self.pool.union_of(lt, rt);
                b.push(
                    Insn::If {
                        ty,
                        left: left_reg,
                        right: right_reg,
                        cmp,
                        target,
                    },
                    span,
                );
                Ok(())
            }

            ExprKind::Comprehension {
                kind: quant @ (ComprehensionKind::Some | ComprehensionKind::None | ComprehensionKind::All),
                sources,
                condition,
                ..
            } => {
                let cond = condition.ok_or_else(|| {
                    Diagnostic::bug(ErrorCode::E9002, "quantifier without condition", span)
                })?;
                self.generate_quantifier(b, arena, target, quant, &sources, cond, span)
            }

            _ => {
                // Any other boolean-typed expression: materialize and
                // compare with true.
                let ty = arena.expr_type(cond);
                if ty != TypeId::BOOL {
                    return Err(Diagnostic::error(
                        ErrorCode::E2005,
                        "condition is not boolean",
                        span,
                    ));
                }
                let cond_reg = self.generate_expr(b, arena, cond)?;
                let true_reg = b.env.alloc(TypeId::BOOL);
                b.push(
                    Insn::Const {
                        target: true_reg,
                        value: Value::Bool(true),
                    },
                    span,
                );
                b.push(
                    Insn::If {
                        ty: TypeId::BOOL,
                        left: cond_reg,
                        right: true_reg,
                        cmp: Cmp::Eq,
                        target,
                    },
                    span,
                );
                Ok(())
            }
        }
    }

    /// Lower `operand is test_ty` into an `IfIs` branch. A local
    /// variable tests on its own register, preserving the refinement in
    /// the emitted code; other operands evaluate into a temporary.
    fn generate_type_test(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        target: LabelId,
        operand: ExprId,
        test_ty: TypeId,
        span: Span,
    ) -> DiagResult<()> {
        let src_ty = arena.expr_type(operand);
        let reg = match arena.expr(operand).kind {
            ExprKind::Variable(name) => match b.env.lookup(name) {
                Some(reg) => reg,
                None => self.generate_expr(b, arena, operand)?,
            },
            _ => self.generate_expr(b, arena, operand)?,
        };
        b.push(
            Insn::IfIs {
                ty: src_ty,
                operand: reg,
                test: test_ty,
                target,
            },
            span,
        );
        Ok(())
    }

    /// Quantifier lowering: nested `ForAll` loops with the appropriate
    /// branch sense inside.
    #[allow(clippy::too_many_arguments)]
    fn generate_quantifier(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        target: LabelId,
        quant: ComprehensionKind,
        sources: &[CompSource],
        cond: ExprId,
        span: Span,
    ) -> DiagResult<()> {
        let mut heads = Vec::with_capacity(sources.len());
        for source in sources {
            let src_reg = self.generate_expr(b, arena, source.source)?;
            let coll_ty = arena.expr_type(source.source);
            let head = b.fresh_label();
            let binding = match source.binding {
                CompBinding::Single(n) => ForBinding::Single(n),
                CompBinding::KeyValue(k, v) => ForBinding::KeyValue(k, v),
            };
            self.open_iteration(b, binding, coll_ty, src_reg, head, span)?;
            heads.push(head);
        }

        match quant {
            ComprehensionKind::Some => {
                // Branch out on the first hit.
                self.generate_condition(b, arena, target, cond)?;
            }
            ComprehensionKind::None => {
                // A hit means the quantifier is false: fall through to
                // the non-target path via a label past the final goto.
                let fail = b.fresh_label();
                self.generate_condition(b, arena, fail, cond)?;
                self.close_loops(b, &heads, span);
                b.push(Insn::Goto(target), span);
                b.push(Insn::Label(fail), span);
                return Ok(());
            }
            ComprehensionKind::All => {
                // A counterexample branches away; exhausting the loops
                // means every binding held.
                let fail = b.fresh_label();
                let inverted = self.invert(arena, cond);
                self.generate_condition(b, arena, fail, inverted)?;
                self.close_loops(b, &heads, span);
                b.push(Insn::Goto(target), span);
                b.push(Insn::Label(fail), span);
                return Ok(());
            }
            _ => {
                return Err(Diagnostic::bug(
                    ErrorCode::E9002,
                    "non-boolean comprehension in condition position",
                    span,
                ));
            }
        }

        self.close_loops(b, &heads, span);
        Ok(())
    }

    fn close_loops(&mut self, b: &mut FnBuilder, heads: &[tern_ir::LabelId], span: Span) {
        for &head in heads.iter().rev() {
            b.push(Insn::Nop, span);
            b.push(Insn::LoopEnd(head), span);
        }
    }
}

/// If one side is a variable and the other the `null` literal, the
/// variable side.
fn null_test_operand(arena: &AstArena, left: ExprId, right: ExprId) -> Option<ExprId> {
    let is_null = |id: ExprId| matches!(arena.expr(id).kind, ExprKind::Constant(Value::Null));
    let is_var = |id: ExprId| matches!(arena.expr(id).kind, ExprKind::Variable(_));
    if is_var(left) && is_null(right) {
        Some(left)
    } else if is_var(right) && is_null(left) {
        Some(right)
    } else {
        None
    }
}
