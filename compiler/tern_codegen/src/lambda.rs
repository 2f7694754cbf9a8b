//! Lambda lifting.
//!
//! A lambda literal becomes an anonymous top-level function whose
//! parameters are the explicit lambda parameters followed by the
//! captured free variables. The enclosing block receives a `Lambda`
//! instruction binding the captured registers; explicit parameter
//! positions carry the null register, meaning "supplied at call time".

use rustc_hash::FxHashSet;
use tern_diagnostic::DiagResult;
use tern_ir::ast::{AstArena, CompBinding, ExprId, ExprKind, Param};
use tern_ir::{Insn, IrDeclKind, IrDeclaration, Name, Reg, Regs, Span};
use tern_types::TypeId;

use crate::generator::{FnBuilder, Generator};

impl Generator<'_> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn generate_lambda(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        _id: ExprId,
        params: &[Param],
        body: ExprId,
        ty: TypeId,
        span: Span,
    ) -> DiagResult<Reg> {
        // Captured variables: free in the body, not a parameter, and
        // bound in the enclosing environment. Order follows first use.
        let param_names: FxHashSet<Name> = params.iter().map(|p| p.name).collect();
        let mut free = Vec::new();
        let mut seen = FxHashSet::default();
        collect_free_vars(arena, body, &mut FxHashSet::default(), &mut seen, &mut free);
        let captured: Vec<(Name, Reg)> = free
            .into_iter()
            .filter(|name| !param_names.contains(name))
            .filter_map(|name| b.env.lookup(name).map(|reg| (name, reg)))
            .collect();

        // Synthesize the anonymous function: explicit parameters first,
        // captures after.
        let name = self
            .interner
            .intern(&format!("lambda${}", self.lambda_counter));
        self.lambda_counter += 1;

        let mut inner = FnBuilder::new();
        let mut param_types = Vec::with_capacity(params.len() + captured.len());
        for p in params {
            inner.env.declare(p.name, p.ty);
            param_types.push(p.ty);
        }
        for &(capture_name, outer_reg) in &captured {
            let capture_ty = b.env.reg_type(outer_reg);
            inner.env.declare(capture_name, capture_ty);
            param_types.push(capture_ty);
        }

        let body_ty = arena.expr_type(body);
        let result = self.generate_expr(&mut inner, arena, body)?;
        inner.push(Insn::Return(Some((body_ty, result))), span);

        let full_ty = self.pool.function(&param_types, body_ty, TypeId::VOID);
        self.lambdas.push(IrDeclaration {
            name,
            ty: full_ty,
            kind: IrDeclKind::Function {
                num_params: param_types.len() as u32,
            },
            body: inner.code,
            precondition: None,
            postcondition: None,
            span,
        });

        // Call-site closure: null slots for the explicit parameters,
        // then the captured registers from the enclosing frame.
        let mut operands: Regs = params.iter().map(|_| Reg::NULL).collect();
        for &(_, outer_reg) in &captured {
            operands.push(outer_reg);
        }
        let target = b.env.alloc(ty);
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
}

/// Collect free variable names of an expression in first-use order.
///
/// `bound` tracks names bound by enclosing lambda parameters and
/// comprehension generators within the walk.
fn collect_free_vars(
    arena: &AstArena,
    id: ExprId,
    bound: &mut FxHashSet<Name>,
    seen: &mut FxHashSet<Name>,
    out: &mut Vec<Name>,
) {
    match &arena.expr(id).kind {
        ExprKind::Variable(name) => {
            if !bound.contains(name) && seen.insert(*name) {
                out.push(*name);
            }
        }
        ExprKind::Constant(_)
        | ExprKind::ConstantRef(_)
        | ExprKind::ModuleRef(_)
        | ExprKind::FunctionRef(_)
        | ExprKind::TypeValue(_) => {}

        ExprKind::Unary { operand, .. } => collect_free_vars(arena, *operand, bound, seen, out),
        ExprKind::Binary { left, right, .. } => {
            collect_free_vars(arena, *left, bound, seen, out);
            collect_free_vars(arena, *right, bound, seen, out);
        }
        ExprKind::RecordLit(fields) => {
            for &(_, value) in fields {
                collect_free_vars(arena, value, bound, seen, out);
            }
        }
        ExprKind::TupleLit(elems) | ExprKind::ListLit(elems) | ExprKind::SetLit(elems) => {
            for &e in elems {
                collect_free_vars(arena, e, bound, seen, out);
            }
        }
        ExprKind::MapLit(pairs) => {
            for &(k, v) in pairs {
                collect_free_vars(arena, k, bound, seen, out);
                collect_free_vars(arena, v, bound, seen, out);
            }
        }
        ExprKind::FieldAccess { src, .. }
        | ExprKind::Length(src)
        | ExprKind::ListLength(src)
        | ExprKind::StringLength(src)
        | ExprKind::SetLength(src)
        | ExprKind::MapLength(src) => collect_free_vars(arena, *src, bound, seen, out),
        ExprKind::Index { src, index }
        | ExprKind::ListAccess { src, index }
        | ExprKind::StringAccess { src, index } => {
            collect_free_vars(arena, *src, bound, seen, out);
            collect_free_vars(arena, *index, bound, seen, out);
        }
        ExprKind::MapAccess { src, key } => {
            collect_free_vars(arena, *src, bound, seen, out);
            collect_free_vars(arena, *key, bound, seen, out);
        }
        ExprKind::SubRange { src, start, end }
        | ExprKind::SubList { src, start, end }
        | ExprKind::SubString { src, start, end } => {
            collect_free_vars(arena, *src, bound, seen, out);
            collect_free_vars(arena, *start, bound, seen, out);
            collect_free_vars(arena, *end, bound, seen, out);
        }
        ExprKind::Cast { operand, .. }
        | ExprKind::New(operand)
        | ExprKind::Dereference(operand) => collect_free_vars(arena, *operand, bound, seen, out),
        ExprKind::Invoke { receiver, args, .. } => {
            if let Some(recv) = receiver {
                collect_free_vars(arena, *recv, bound, seen, out);
            }
            for &a in args {
                collect_free_vars(arena, a, bound, seen, out);
            }
        }
        ExprKind::FunctionCall { args, .. } => {
            for &a in args {
                collect_free_vars(arena, a, bound, seen, out);
            }
        }
        ExprKind::MethodSend { receiver, args, .. } => {
            collect_free_vars(arena, *receiver, bound, seen, out);
            for &a in args {
                collect_free_vars(arena, a, bound, seen, out);
            }
        }
        ExprKind::IndirectCall { src, args } => {
            collect_free_vars(arena, *src, bound, seen, out);
            for &a in args {
                collect_free_vars(arena, a, bound, seen, out);
            }
        }
        ExprKind::Lambda { params, body } => {
            // Inner lambda parameters shadow within its body.
            let added: Vec<Name> = params
                .iter()
                .map(|p| p.name)
                .filter(|n| bound.insert(*n))
                .collect();
            collect_free_vars(arena, *body, bound, seen, out);
            for n in added {
                bound.remove(&n);
            }
        }
        ExprKind::Comprehension {
            sources,
            condition,
            value,
            ..
        } => {
            let mut added = Vec::new();
            for source in sources {
                collect_free_vars(arena, source.source, bound, seen, out);
                match source.binding {
                    CompBinding::Single(n) => {
                        if bound.insert(n) {
                            added.push(n);
                        }
                    }
                    CompBinding::KeyValue(k, v) => {
                        for n in [k, v] {
                            if bound.insert(n) {
                                added.push(n);
                            }
                        }
                    }
                }
            }
            if let Some(cond) = condition {
                collect_free_vars(arena, *cond, bound, seen, out);
            }
            if let Some(value) = value {
                collect_free_vars(arena, *value, bound, seen, out);
            }
            for n in added {
                bound.remove(&n);
            }
        }
    }
}
