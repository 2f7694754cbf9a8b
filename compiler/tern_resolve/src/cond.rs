//! Flow-sensitive condition resolution.
//!
//! `resolve_condition(expr, sign, env)` types a boolean expression and
//! returns the environment refined under the assumption that the
//! condition evaluates to `sign`. Short-circuit operators thread
//! refinements into their right operand; `is` tests (and the `== null`
//! sugar) narrow local variable types by intersection.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{AstArena, BinaryOp, ExprId, ExprKind, UnaryOp};
use tern_ir::Value;
use tern_types::TypeId;

use crate::{Env, Resolver};

impl Resolver<'_> {
    /// Resolve a condition under `sign`, returning the refined
    /// environment.
    pub fn resolve_condition(
        &mut self,
        arena: &mut AstArena,
        id: ExprId,
        sign: bool,
        env: &Env,
    ) -> DiagResult<Env> {
        let span = arena.expr(id).span;
        let kind = arena.expr(id).kind.clone();
        let refined = match kind {
            ExprKind::Constant(Value::Bool(_)) => {
                arena.set_expr_type(id, TypeId::BOOL);
                env.clone()
            }

            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let out = self.resolve_condition(arena, operand, !sign, env)?;
                arena.set_expr_type(id, TypeId::BOOL);
                out
            }

            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let out = if sign {
                    // a && b: b is evaluated under a's truth.
                    let left_env = self.resolve_condition(arena, left, true, env)?;
                    self.resolve_condition(arena, right, true, &left_env)?
                } else {
                    // !(a && b) = !a || (a && !b): join the two ways out.
                    let not_a = self.resolve_condition(arena, left, false, env)?;
                    let a_true = self.resolve_condition(arena, left, true, env)?;
                    let a_not_b = self.resolve_condition(arena, right, false, &a_true)?;
                    Env::join(self.pool, &not_a, &a_not_b)
                };
                arena.set_expr_type(id, TypeId::BOOL);
                out
            }

            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let out = if sign {
                    // a || b: true via a, or via b under a's falsity.
                    let a_true = self.resolve_condition(arena, left, true, env)?;
                    let not_a = self.resolve_condition(arena, left, false, env)?;
                    let b_true = self.resolve_condition(arena, right, true, &not_a)?;
                    Env::join(self.pool, &a_true, &b_true)
                } else {
                    // !(a || b) = !a && !b.
                    let not_a = self.resolve_condition(arena, left, false, env)?;
                    self.resolve_condition(arena, right, false, &not_a)?
                };
                arena.set_expr_type(id, TypeId::BOOL);
                out
            }

            ExprKind::Binary {
                op: BinaryOp::Is,
                left,
                right,
            } => {
                let test_ty = match arena.expr(right).kind {
                    ExprKind::TypeValue(t) => t,
                    _ => {
                        return Err(Diagnostic::error(
                            ErrorCode::E2005,
                            "`is` expects a type on its right-hand side",
                            arena.expr(right).span,
                        ));
                    }
                };
                let meta = self.pool.meta(test_ty);
                arena.set_expr_type(right, meta);
                arena.set_expr_type(id, TypeId::BOOL);
                self.refine_type_test(arena, left, test_ty, sign, env)?
            }

            // `x == null` / `x != null` are sugar for `x is null`.
            ExprKind::Binary {
                op: op @ (BinaryOp::Eq | BinaryOp::Neq),
                left,
                right,
            } if is_null_constant(arena, right) || is_null_constant(arena, left) => {
                let (var_side, null_side) = if is_null_constant(arena, right) {
                    (left, right)
                } else {
                    (right, left)
                };
                arena.set_expr_type(null_side, TypeId::NULL);
                arena.set_expr_type(id, TypeId::BOOL);
                let positive = (op == BinaryOp::Eq) == sign;
                self.refine_type_test(arena, var_side, TypeId::NULL, positive, env)?
            }

            // Other comparisons type-check but refine nothing.
            ExprKind::Binary { op, .. } if op.is_comparison() => {
                let t = self.resolve_expr(arena, id, env)?;
                debug_assert_eq!(t, TypeId::BOOL);
                env.clone()
            }

            // Quantifiers are boolean expressions in condition position.
            ExprKind::Comprehension { ref kind, .. } if kind.is_boolean() => {
                self.resolve_expr(arena, id, env)?;
                env.clone()
            }

            // Any other expression must simply have boolean type.
            _ => {
                let t = self.resolve_expr(arena, id, env)?;
                if !self.coercive(t, TypeId::BOOL) {
                    return Err(Diagnostic::error(
                        ErrorCode::E2005,
                        format!("expected a boolean condition, found `{}`", self.fmt(t)),
                        span,
                    ));
                }
                env.clone()
            }
        };
        Ok(refined)
    }

    /// Refine a `x is T` test: a local variable's type narrows to
    /// `x ∩ T` (positive) or `x ∩ !T` (negative); any other operand is
    /// type-checked without refinement.
    fn refine_type_test(
        &mut self,
        arena: &mut AstArena,
        operand: ExprId,
        test_ty: TypeId,
        positive: bool,
        env: &Env,
    ) -> DiagResult<Env> {
        let operand_ty = self.resolve_expr(arena, operand, env)?;
        if let ExprKind::Variable(name) = arena.expr(operand).kind {
            if env.lookup(name).is_some() {
                let refined = if positive {
                    self.pool.intersect_of(operand_ty, test_ty)
                } else {
                    let negated = self.pool.negation(test_ty);
                    self.pool.intersect_of(operand_ty, negated)
                };
                tracing::debug!(
                    var = self.interner.resolve(name),
                    from = %self.fmt(operand_ty),
                    to = %self.fmt(refined),
                    "flow refinement"
                );
                return Ok(env.put(name, refined));
            }
        }
        Ok(env.clone())
    }
}

fn is_null_constant(arena: &AstArena, id: ExprId) -> bool {
    matches!(arena.expr(id).kind, ExprKind::Constant(Value::Null))
}
