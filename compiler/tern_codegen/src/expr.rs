//! Expression lowering.
//!
//! Every generator returns the register holding its result. Local
//! variable reads copy into a fresh register rather than returning the
//! variable's own register, keeping the block in an SSA-like discipline
//! for everything except variable assignment and loop accumulators.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{
    AstArena, BinaryOp, CompBinding, CompSource, ComprehensionKind, ExprId, ExprKind, ForBinding,
    UnaryOp,
};
use tern_ir::{BinArith, Insn, Reg, Regs, Span, Value};
use tern_types::{Tag, TypeId};

use crate::generator::{FnBuilder, Generator};

impl Generator<'_> {
    /// Lower an expression, returning the result register.
    pub(crate) fn generate_expr(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        id: ExprId,
    ) -> DiagResult<Reg> {
        let span = arena.expr(id).span;
        let ty = arena.expr(id).ty;
        let kind = arena.expr(id).kind.clone();
        match kind {
            ExprKind::Constant(value) => {
                let target = b.env.alloc(ty);
                b.push(Insn::Const { target, value }, span);
                Ok(target)
            }

            ExprKind::Variable(name) => {
                let src = b
                    .env
                    .lookup(name)
                    .ok_or_else(|| self.bug_unknown_var(name, span))?;
                let target = b.env.alloc(ty);
                b.push(Insn::Assign { ty, target, src }, span);
                Ok(target)
            }

            // Constants without an inlined value call their accessor.
            ExprKind::ConstantRef(name) => {
                let target = b.env.alloc(ty);
                let accessor_ty = self.pool.function(&[], ty, TypeId::VOID);
                b.push(
                    Insn::Invoke {
                        ty: accessor_ty,
                        target,
                        operands: Regs::new(),
                        name,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::Unary { op, operand } => self.generate_unary(b, arena, id, op, operand, ty, span),

            ExprKind::Binary { op, left, right } => {
                self.generate_binary(b, arena, id, op, left, right, ty, span)
            }

            ExprKind::RecordLit(fields) => {
                // Fields evaluate in sorted name order, matching the
                // canonical record layout.
                let mut sorted = fields;
                sorted.sort_by_key(|&(name, _)| name);
                let mut operands = Regs::new();
                for (_, value) in sorted {
                    operands.push(self.generate_expr(b, arena, value)?);
                }
                let target = b.env.alloc(ty);
                b.push(
                    Insn::NewRecord {
                        ty,
                        target,
                        operands,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::TupleLit(elems) => {
                let operands = self.generate_operands(b, arena, &elems)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::NewTuple {
                        ty,
                        target,
                        operands,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::ListLit(elems) => {
                let operands = self.generate_operands(b, arena, &elems)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::NewList {
                        ty,
                        target,
                        operands,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::SetLit(elems) => {
                let operands = self.generate_operands(b, arena, &elems)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::NewSet {
                        ty,
                        target,
                        operands,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::MapLit(pairs) => {
                // Operand layout alternates key, value, key, value.
                let mut operands = Regs::new();
                for (k, v) in pairs {
                    operands.push(self.generate_expr(b, arena, k)?);
                    operands.push(self.generate_expr(b, arena, v)?);
                }
                let target = b.env.alloc(ty);
                b.push(
                    Insn::NewMap {
                        ty,
                        target,
                        operands,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::FieldAccess { src, field } => {
                let src_ty = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::FieldLoad {
                        ty: src_ty,
                        target,
                        src: src_reg,
                        field,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::ListAccess { src, index } | ExprKind::StringAccess { src, index } => {
                let src_ty = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let index_reg = self.generate_expr(b, arena, index)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::IndexOf {
                        ty: src_ty,
                        target,
                        src: src_reg,
                        index: index_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::MapAccess { src, key } => {
                let src_ty = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let key_reg = self.generate_expr(b, arena, key)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::IndexOf {
                        ty: src_ty,
                        target,
                        src: src_reg,
                        index: key_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::SubList { src, start, end } => {
                let src_ty = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let start_reg = self.generate_expr(b, arena, start)?;
                let end_reg = self.generate_expr(b, arena, end)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::SubList {
                        ty: src_ty,
                        target,
                        src: src_reg,
                        start: start_reg,
                        end: end_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::SubString { src, start, end } => {
                let src_reg = self.generate_expr(b, arena, src)?;
                let start_reg = self.generate_expr(b, arena, start)?;
                let end_reg = self.generate_expr(b, arena, end)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::SubString {
                        target,
                        src: src_reg,
                        start: start_reg,
                        end: end_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::ListLength(src)
            | ExprKind::StringLength(src)
            | ExprKind::SetLength(src)
            | ExprKind::MapLength(src) => {
                let src_ty = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::LengthOf {
                        ty: src_ty,
                        target,
                        src: src_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::Cast { ty: to, operand } => {
                let from = arena.expr_type(operand);
                let operand_reg = self.generate_expr(b, arena, operand)?;
                let target = b.env.alloc(to);
                b.push(
                    Insn::Convert {
                        from,
                        to,
                        target,
                        operand: operand_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::New(operand) => {
                let operand_reg = self.generate_expr(b, arena, operand)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::NewObject {
                        ty,
                        target,
                        operand: operand_reg,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::Dereference(operand) => {
                let ref_ty = arena.expr_type(operand);
                let operand_reg = self.generate_expr(b, arena, operand)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::Dereference {
                        ty: ref_ty,
                        target,
                        operand: operand_reg,
                    },
                    span,
                );
                Ok(target)
            }

            // A function reference is a closure with no bound operands;
            // every parameter position is supplied at call time.
            ExprKind::FunctionRef(name) => {
                let target = b.env.alloc(ty);
                let arity = self.pool.callable_param_count(ty);
                let operands: Regs = (0..arity).map(|_| Reg::NULL).collect();
                b.push(
                    Insn::Lambda {
                        ty,
                        target,
                        operands,
                        name,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::FunctionCall { name, args } => {
                let info = self
                    .module
                    .function(name)
                    .ok_or_else(|| Diagnostic::bug(ErrorCode::E9003, "unresolved callee", span))?;
                let operands = self.generate_operands(b, arena, &args)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::Invoke {
                        ty: info.ty,
                        target,
                        operands,
                        name,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::MethodSend {
                receiver,
                name,
                args,
            } => {
                let info = self
                    .module
                    .function(name)
                    .ok_or_else(|| Diagnostic::bug(ErrorCode::E9003, "unresolved callee", span))?;
                let mut operands = Regs::new();
                operands.push(self.generate_expr(b, arena, receiver)?);
                for &arg in &args {
                    operands.push(self.generate_expr(b, arena, arg)?);
                }
                let target = b.env.alloc(ty);
                b.push(
                    Insn::Invoke {
                        ty: info.ty,
                        target,
                        operands,
                        name,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::IndirectCall { src, args } => {
                let sig = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let operands = self.generate_operands(b, arena, &args)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::IndirectInvoke {
                        ty: sig,
                        target,
                        src: src_reg,
                        operands,
                    },
                    span,
                );
                Ok(target)
            }

            ExprKind::Lambda { params, body } => {
                self.generate_lambda(b, arena, id, &params, body, ty, span)
            }

            ExprKind::Comprehension {
                kind,
                sources,
                condition,
                value,
            } => {
                if kind.is_boolean() {
                    return self.materialize_condition(b, arena, id, span);
                }
                self.generate_builder_comprehension(
                    b, arena, kind, &sources, condition, value, ty, span,
                )
            }

            // Abstract nodes must have been rewritten by the resolver;
            // a surviving one is a compiler bug.
            ExprKind::Index { .. }
            | ExprKind::SubRange { .. }
            | ExprKind::Length(_)
            | ExprKind::Invoke { .. }
            | ExprKind::ModuleRef(_)
            | ExprKind::TypeValue(_) => Err(Diagnostic::bug(
                ErrorCode::E9001,
                format!("unexpected node in code generation: {:?}", arena.expr(id).kind),
                span,
            )),
        }
    }

    /// Lower an expression for effect, discarding the result. Calls emit
    /// with the null target register.
    pub(crate) fn generate_expr_stmt(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        id: ExprId,
        span: Span,
    ) -> DiagResult<()> {
        let kind = arena.expr(id).kind.clone();
        match kind {
            ExprKind::FunctionCall { name, args } => {
                let info = self
                    .module
                    .function(name)
                    .ok_or_else(|| Diagnostic::bug(ErrorCode::E9003, "unresolved callee", span))?;
                let operands = self.generate_operands(b, arena, &args)?;
                b.push(
                    Insn::Invoke {
                        ty: info.ty,
                        target: Reg::NULL,
                        operands,
                        name,
                    },
                    span,
                );
                Ok(())
            }
            ExprKind::MethodSend {
                receiver,
                name,
                args,
            } => {
                let info = self
                    .module
                    .function(name)
                    .ok_or_else(|| Diagnostic::bug(ErrorCode::E9003, "unresolved callee", span))?;
                let mut operands = Regs::new();
                operands.push(self.generate_expr(b, arena, receiver)?);
                for &arg in &args {
                    operands.push(self.generate_expr(b, arena, arg)?);
                }
                b.push(
                    Insn::Invoke {
                        ty: info.ty,
                        target: Reg::NULL,
                        operands,
                        name,
                    },
                    span,
                );
                Ok(())
            }
            ExprKind::IndirectCall { src, args } => {
                let sig = arena.expr_type(src);
                let src_reg = self.generate_expr(b, arena, src)?;
                let operands = self.generate_operands(b, arena, &args)?;
                b.push(
                    Insn::IndirectInvoke {
                        ty: sig,
                        target: Reg::NULL,
                        src: src_reg,
                        operands,
                    },
                    span,
                );
                Ok(())
            }
            _ => {
                self.generate_expr(b, arena, id)?;
                Ok(())
            }
        }
    }

    fn generate_operands(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        args: &[ExprId],
    ) -> DiagResult<Regs> {
        let mut operands = Regs::new();
        for &arg in args {
            operands.push(self.generate_expr(b, arena, arg)?);
        }
        Ok(operands)
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_unary(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        id: ExprId,
        op: UnaryOp,
        operand: ExprId,
        ty: TypeId,
        span: Span,
    ) -> DiagResult<Reg> {
        match op {
            UnaryOp::Neg => {
                let operand_reg = self.generate_expr(b, arena, operand)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::UnArithOp {
                        ty,
                        kind: tern_ir::UnArith::Neg,
                        target,
                        operand: operand_reg,
                    },
                    span,
                );
                Ok(target)
            }
            UnaryOp::Invert => {
                let operand_reg = self.generate_expr(b, arena, operand)?;
                let target = b.env.alloc(ty);
                b.push(
                    Insn::Invert {
                        ty,
                        target,
                        operand: operand_reg,
                    },
                    span,
                );
                Ok(target)
            }
            UnaryOp::Not => self.materialize_condition(b, arena, id, span),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_binary(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        id: ExprId,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        ty: TypeId,
        span: Span,
    ) -> DiagResult<Reg> {
        if op.is_boolean() {
            return self.materialize_condition(b, arena, id, span);
        }

        let kind = self.arith_op(op, arena.expr_type(left), arena.expr_type(right), ty);
        let left_reg = self.generate_expr(b, arena, left)?;
        let right_reg = self.generate_expr(b, arena, right)?;
        let target = b.env.alloc(ty);
        b.push(
            Insn::BinArithOp {
                ty,
                kind,
                target,
                left: left_reg,
                right: right_reg,
            },
            span,
        );
        Ok(target)
    }

    /// Map a resolved binary operator onto its bytecode operation, using
    /// the operand types to split `+` into its overloads.
    fn arith_op(&mut self, op: BinaryOp, lt: TypeId, rt: TypeId, result: TypeId) -> BinArith {
        match op {
            BinaryOp::Add => {
                // The resolver already picked the overload through the
                // result type; the operand types only split the string
                // appends by char position.
                if result == TypeId::STRING {
                    if self.pool.tag(lt) == Tag::Char {
                        BinArith::StrAppendLeft
                    } else if self.pool.tag(rt) == Tag::Char {
                        BinArith::StrAppendRight
                    } else {
                        BinArith::StrAppend
                    }
                } else {
                    match self.pool.tag(result) {
                        Tag::List => BinArith::ListAppend,
                        Tag::Set => BinArith::Union,
                        _ => BinArith::Add,
                    }
                }
            }
            BinaryOp::Sub => BinArith::Sub,
            BinaryOp::Mul => BinArith::Mul,
            BinaryOp::Div => BinArith::Div,
            BinaryOp::Rem => BinArith::Rem,
            BinaryOp::Union => BinArith::Union,
            BinaryOp::Intersect => BinArith::Intersect,
            BinaryOp::Difference => BinArith::Difference,
            // Boolean operators were routed to materialization.
            _ => BinArith::Add,
        }
    }

    /// Materialize a boolean expression into a register via the
    /// two-label scheme: branch to the true arm, constants on both arms.
    pub(crate) fn materialize_condition(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        cond: ExprId,
        span: Span,
    ) -> DiagResult<Reg> {
        let true_label = b.fresh_label();
        let exit = b.fresh_label();
        let target = b.env.alloc(TypeId::BOOL);
        self.generate_condition(b, arena, true_label, cond)?;
        b.push(
            Insn::Const {
                target,
                value: Value::Bool(false),
            },
            span,
        );
        b.push(Insn::Goto(exit), span);
        b.push(Insn::Label(true_label), span);
        b.push(
            Insn::Const {
                target,
                value: Value::Bool(true),
            },
            span,
        );
        b.push(Insn::Label(exit), span);
        Ok(target)
    }

    /// List/set builder comprehension: accumulate into an initially
    /// empty collection.
    #[allow(clippy::too_many_arguments)]
    fn generate_builder_comprehension(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        kind: ComprehensionKind,
        sources: &[CompSource],
        condition: Option<ExprId>,
        value: Option<ExprId>,
        ty: TypeId,
        span: Span,
    ) -> DiagResult<Reg> {
        let value = value.ok_or_else(|| {
            Diagnostic::bug(ErrorCode::E9002, "builder comprehension without value", span)
        })?;

        let target = b.env.alloc(ty);
        let empty = match kind {
            ComprehensionKind::List => Insn::NewList {
                ty,
                target,
                operands: Regs::new(),
            },
            ComprehensionKind::Set => Insn::NewSet {
                ty,
                target,
                operands: Regs::new(),
            },
            _ => {
                return Err(Diagnostic::bug(
                    ErrorCode::E9002,
                    "boolean comprehension in builder lowering",
                    span,
                ));
            }
        };
        b.push(empty, span);

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

        // Optional filter: skip the append when the condition fails.
        let skip = condition.map(|cond| {
            let label = b.fresh_label();
            (cond, label)
        });
        if let Some((cond, label)) = skip {
            let inverted = self.invert(arena, cond);
            self.generate_condition(b, arena, label, inverted)?;
            self.append_element(b, arena, kind, target, value, ty, span)?;
            b.push(Insn::Label(label), span);
        } else {
            self.append_element(b, arena, kind, target, value, ty, span)?;
        }

        for &head in heads.iter().rev() {
            b.push(Insn::Nop, span);
            b.push(Insn::LoopEnd(head), span);
        }
        Ok(target)
    }

    #[allow(clippy::too_many_arguments)]
    fn append_element(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        kind: ComprehensionKind,
        target: Reg,
        value: ExprId,
        ty: TypeId,
        span: Span,
    ) -> DiagResult<()> {
        let value_reg = self.generate_expr(b, arena, value)?;
        // Wrap the element in a singleton and append or union it in.
        let singleton = b.env.alloc(ty);
        let (wrap, combine) = match kind {
            ComprehensionKind::List => (
                Insn::NewList {
                    ty,
                    target: singleton,
                    operands: Regs::from_slice(&[value_reg]),
                },
                BinArith::ListAppend,
            ),
            _ => (
                Insn::NewSet {
                    ty,
                    target: singleton,
                    operands: Regs::from_slice(&[value_reg]),
                },
                BinArith::Union,
            ),
        };
        b.push(wrap, span);
        b.push(
            Insn::BinArithOp {
                ty,
                kind: combine,
                target,
                left: target,
                right: singleton,
            },
            span,
        );
        Ok(())
    }
}
