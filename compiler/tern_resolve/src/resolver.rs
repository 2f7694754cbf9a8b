//! Typed traversal of declarations and statements.
//!
//! Expressions are handled in `expr`, condition refinement in `cond`.
//! Statement resolution threads a flow [`Env`] through each block,
//! joining at merge points; `return`/`throw`/`break` yield the
//! distinguished unreachable environment, and a reachable statement after
//! one is a reported error.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{
    AstArena, CatchClause, Decl, ExprId, ExprKind, ForBinding, FunctionDecl, Module, PatternId,
    PatternKind, StmtId, StmtKind, SwitchCase,
};
use tern_ir::{Name, Span, StringInterner, Value};
use tern_types::effective::{self, Collection};
use tern_types::{NominalResolver, Pool, TypeId};

use crate::{Env, ModuleEnv};

/// Per-function context: the declared signature the body checks against.
#[derive(Copy, Clone, Debug)]
pub(crate) struct FnCtx {
    /// Declared return type (`TypeId::VOID` for none).
    pub ret: TypeId,
}

/// The flow-sensitive resolver.
///
/// Mutates AST nodes in place (resolved types, disambiguation rewrites),
/// so a declaration must not be resolved concurrently; distinct
/// declarations are independent.
pub struct Resolver<'a> {
    pub(crate) pool: &'a mut Pool,
    pub(crate) module: &'a ModuleEnv,
    pub(crate) interner: &'a StringInterner,
    /// Break scopes: environments observed at `break` statements, joined
    /// into the loop's exit environment.
    pub(crate) break_envs: Vec<Vec<Env>>,
}

impl<'a> Resolver<'a> {
    pub fn new(pool: &'a mut Pool, module: &'a ModuleEnv, interner: &'a StringInterner) -> Self {
        Resolver {
            pool,
            module,
            interner,
            break_envs: Vec::new(),
        }
    }

    /// Resolve every declaration of a module in place.
    pub fn resolve_module(&mut self, module: &mut Module) -> DiagResult<()> {
        let Module { decls, arena, .. } = module;
        for decl in decls.iter() {
            self.resolve_declaration(arena, decl)?;
        }
        Ok(())
    }

    /// Resolve one declaration in place.
    pub fn resolve_declaration(&mut self, arena: &mut AstArena, decl: &Decl) -> DiagResult<()> {
        match decl {
            Decl::Constant(c) => {
                let env = Env::new();
                let ty = self.resolve_expr(arena, c.init, &env)?;
                self.require_coercive(ty, c.ty, arena.expr(c.init).span)?;
                Ok(())
            }
            Decl::TypeInvariant(t) => {
                let mut env = Env::new();
                self.bind_pattern(arena, t.pattern, t.ty, &mut env)?;
                for &clause in &t.invariants {
                    self.resolve_condition(arena, clause, true, &env)?;
                }
                Ok(())
            }
            Decl::Function(f) => self.resolve_function(arena, f),
        }
    }

    fn resolve_function(&mut self, arena: &mut AstArena, f: &FunctionDecl) -> DiagResult<()> {
        let mut env = Env::new();
        for p in &f.params {
            env.bind(p.name, p.ty);
        }

        for &clause in &f.requires {
            self.resolve_condition(arena, clause, true, &env)?;
        }
        if !f.ensures.is_empty() {
            // `ensures` clauses see the parameters plus `$`, the returned
            // value.
            let mut post_env = env.clone();
            post_env.bind(self.interner.intern("$"), f.ret);
            for &clause in &f.ensures {
                self.resolve_condition(arena, clause, true, &post_env)?;
            }
        }

        let ctx = FnCtx { ret: f.ret };
        self.resolve_stmts(arena, &f.body, env, &ctx)?;
        Ok(())
    }

    // === Statements ===

    /// Resolve a statement block, returning the outgoing environment.
    pub(crate) fn resolve_stmts(
        &mut self,
        arena: &mut AstArena,
        stmts: &[StmtId],
        mut env: Env,
        ctx: &FnCtx,
    ) -> DiagResult<Env> {
        for &id in stmts {
            if env.is_unreachable() {
                return Err(Diagnostic::error(
                    ErrorCode::E2012,
                    "statement is unreachable",
                    arena.stmt(id).span,
                ));
            }
            env = self.resolve_stmt(arena, id, env, ctx)?;
        }
        Ok(env)
    }

    fn resolve_stmt(
        &mut self,
        arena: &mut AstArena,
        id: StmtId,
        env: Env,
        ctx: &FnCtx,
    ) -> DiagResult<Env> {
        let span = arena.stmt(id).span;
        // Clone the kind so the arena stays free for child resolution;
        // statement kinds are shallow (ids and small vecs).
        let kind = arena.stmt(id).kind.clone();
        match kind {
            StmtKind::VarDecl { pattern, ty, init } => {
                if let Some(init) = init {
                    let t = self.resolve_expr(arena, init, &env)?;
                    self.require_coercive(t, ty, arena.expr(init).span)?;
                }
                let mut env = env;
                self.bind_pattern(arena, pattern, ty, &mut env)?;
                Ok(env)
            }

            StmtKind::Assign { lval, rval } => {
                let rt = self.resolve_expr(arena, rval, &env)?;
                self.resolve_assign(arena, lval, rt, env, span)
            }

            StmtKind::Assert { cond } | StmtKind::Assume { cond } => {
                self.resolve_condition(arena, cond, true, &env)
            }

            StmtKind::Return(Some(e)) => {
                if ctx.ret.is_void() {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        "return with a value in a function without a return type",
                        span,
                    ));
                }
                let t = self.resolve_expr(arena, e, &env)?;
                self.require_coercive(t, ctx.ret, arena.expr(e).span)?;
                // The declared return type wins: this is the implicit
                // coercion point a later pass lowers into a Convert.
                arena.set_expr_type(e, ctx.ret);
                Ok(Env::unreachable())
            }

            StmtKind::Return(None) => {
                if !ctx.ret.is_void() {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        "missing return value",
                        span,
                    ));
                }
                Ok(Env::unreachable())
            }

            StmtKind::Debug(e) => {
                let t = self.resolve_expr(arena, e, &env)?;
                if !effective::is_string(self.pool, &self.module.nominals, t) {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        format!("debug expects a string, found `{}`", self.fmt(t)),
                        arena.expr(e).span,
                    ));
                }
                Ok(env)
            }

            StmtKind::Throw(e) => {
                self.resolve_expr(arena, e, &env)?;
                Ok(Env::unreachable())
            }

            StmtKind::IfElse {
                cond,
                then_body,
                else_body,
            } => {
                let true_env = self.resolve_condition(arena, cond, true, &env)?;
                let false_env = self.resolve_condition(arena, cond, false, &env)?;
                let then_out = self.resolve_stmts(arena, &then_body, true_env, ctx)?;
                let else_out = self.resolve_stmts(arena, &else_body, false_env, ctx)?;
                Ok(Env::join(self.pool, &then_out, &else_out))
            }

            StmtKind::Switch { operand, cases } => {
                self.resolve_switch(arena, operand, &cases, env, ctx, span)
            }

            StmtKind::TryCatch { body, catches } => {
                let body_out = self.resolve_stmts(arena, &body, env.clone(), ctx)?;
                let mut out = body_out;
                for CatchClause {
                    ty,
                    var,
                    body: catch_body,
                } in catches
                {
                    let mut catch_env = env.clone();
                    catch_env.bind(var, ty);
                    let catch_out = self.resolve_stmts(arena, &catch_body, catch_env, ctx)?;
                    out = Env::join(self.pool, &out, &catch_out);
                }
                Ok(out)
            }

            StmtKind::While { cond, body } => {
                self.break_envs.push(Vec::new());
                let head_env = self.resolve_condition(arena, cond, true, &env)?;
                self.resolve_stmts(arena, &body, head_env, ctx)?;
                let mut exit = self.resolve_condition(arena, cond, false, &env)?;
                for break_env in self.break_envs.pop().unwrap_or_default() {
                    exit = Env::join(self.pool, &exit, &break_env);
                }
                Ok(exit)
            }

            StmtKind::DoWhile { body, cond } => {
                self.break_envs.push(Vec::new());
                let body_out = self.resolve_stmts(arena, &body, env, ctx)?;
                let mut exit = self.resolve_condition(arena, cond, false, &body_out)?;
                for break_env in self.break_envs.pop().unwrap_or_default() {
                    exit = Env::join(self.pool, &exit, &break_env);
                }
                Ok(exit)
            }

            StmtKind::ForAll {
                binding,
                source,
                body,
            } => {
                let src_ty = self.resolve_expr(arena, source, &env)?;
                let src_span = arena.expr(source).span;
                let mut body_env = env.clone();
                self.bind_iteration(binding, src_ty, &mut body_env, src_span)?;

                self.break_envs.push(Vec::new());
                let body_out = self.resolve_stmts(arena, &body, body_env, ctx)?;
                // The source may be empty, so the incoming environment is
                // always one of the exit paths.
                let mut exit = Env::join(self.pool, &env, &body_out);
                for break_env in self.break_envs.pop().unwrap_or_default() {
                    exit = Env::join(self.pool, &exit, &break_env);
                }
                Ok(exit)
            }

            StmtKind::Break => {
                match self.break_envs.last_mut() {
                    Some(scope) => scope.push(env),
                    None => {
                        return Err(Diagnostic::error(
                            ErrorCode::E3001,
                            "break outside of a loop",
                            span,
                        ));
                    }
                }
                Ok(Env::unreachable())
            }

            StmtKind::Skip => Ok(env),

            StmtKind::Expr(e) => {
                self.resolve_expr(arena, e, &env)?;
                Ok(env)
            }
        }
    }

    fn resolve_switch(
        &mut self,
        arena: &mut AstArena,
        operand: ExprId,
        cases: &[SwitchCase],
        env: Env,
        ctx: &FnCtx,
        span: Span,
    ) -> DiagResult<Env> {
        let op_ty = self.resolve_expr(arena, operand, &env)?;

        let mut seen_values: rustc_hash::FxHashMap<Value, Span> = rustc_hash::FxHashMap::default();
        let mut seen_default: Option<Span> = None;
        let mut out = Env::unreachable();

        for case in cases {
            let case_span = case
                .body
                .first()
                .map_or(span, |&s| arena.stmt(s).span);
            if case.is_default {
                if let Some(first) = seen_default {
                    return Err(Diagnostic::error(
                        ErrorCode::E2007,
                        "duplicate default case",
                        case_span,
                    )
                    .with_secondary(first, "first default here"));
                }
                seen_default = Some(case_span);
            } else {
                if let Some(first) = seen_default {
                    return Err(Diagnostic::error(
                        ErrorCode::E2008,
                        "case after the default case",
                        case_span,
                    )
                    .with_secondary(first, "default here"));
                }
                for &value_expr in &case.values {
                    let vspan = arena.expr(value_expr).span;
                    let vt = self.resolve_expr(arena, value_expr, &env)?;
                    self.require_comparable(vt, op_ty, vspan)?;
                    let ExprKind::Constant(value) = &arena.expr(value_expr).kind else {
                        return Err(Diagnostic::error(
                            ErrorCode::E2006,
                            "case value must be a constant",
                            vspan,
                        ));
                    };
                    if let Some(first) = seen_values.insert(value.clone(), vspan) {
                        return Err(Diagnostic::error(
                            ErrorCode::E2007,
                            "duplicate case value",
                            vspan,
                        )
                        .with_secondary(first, "first occurrence here"));
                    }
                }
            }
            let case_out = self.resolve_stmts(arena, &case.body, env.clone(), ctx)?;
            out = Env::join(self.pool, &out, &case_out);
        }

        if seen_default.is_none() {
            // Without a default the operand can fall through unmatched.
            out = Env::join(self.pool, &out, &env);
        }
        Ok(out)
    }

    // === Assignment targets ===

    fn resolve_assign(
        &mut self,
        arena: &mut AstArena,
        lval: ExprId,
        rt: TypeId,
        env: Env,
        span: Span,
    ) -> DiagResult<Env> {
        let lkind = arena.expr(lval).kind.clone();
        match lkind {
            ExprKind::Variable(name) => {
                let Some(declared) = env.declared(name) else {
                    return Err(self.unknown_name(name, arena.expr(lval).span));
                };
                self.require_coercive(rt, declared, span)?;
                arena.set_expr_type(lval, declared);
                // Assignment rebinds the flow type.
                Ok(env.put(name, rt))
            }

            // `(a, b) = e`: tuple destructuring over a tuple value, or
            // rational destructuring (numerator, denominator) over a
            // real.
            ExprKind::TupleLit(elems) => {
                let mut names = Vec::with_capacity(elems.len());
                for &e in &elems {
                    match arena.expr(e).kind {
                        ExprKind::Variable(n) => names.push((e, n)),
                        _ => {
                            return Err(Diagnostic::error(
                                ErrorCode::E2009,
                                "destructuring assignment expects variables",
                                arena.expr(e).span,
                            ));
                        }
                    }
                }

                if self.coercive(rt, TypeId::REAL) && !self.coercive(rt, TypeId::INT) {
                    // Rational destructure: exactly numerator and
                    // denominator, both ints.
                    if names.len() != 2 {
                        return Err(Diagnostic::error(
                            ErrorCode::E2004,
                            "rational destructuring takes exactly two variables",
                            span,
                        ));
                    }
                    let mut env = env;
                    for &(e, n) in &names {
                        let Some(declared) = env.declared(n) else {
                            return Err(self.unknown_name(n, arena.expr(e).span));
                        };
                        self.require_coercive(TypeId::INT, declared, span)?;
                        arena.set_expr_type(e, TypeId::INT);
                        env = env.put(n, TypeId::INT);
                    }
                    arena.set_expr_type(lval, rt);
                    return Ok(env);
                }

                let Some(tuple) = effective::as_tuple(self.pool, &self.module.nominals, rt)
                else {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        format!("cannot destructure `{}`", self.fmt(rt)),
                        span,
                    ));
                };
                let components = self.pool.children(tuple);
                if components.len() != names.len() {
                    return Err(Diagnostic::error(
                        ErrorCode::E2004,
                        format!(
                            "tuple destructuring expects {} variables, found {}",
                            components.len(),
                            names.len()
                        ),
                        span,
                    ));
                }
                let mut env = env;
                for (&(e, n), &component) in names.iter().zip(&components) {
                    let Some(declared) = env.declared(n) else {
                        return Err(self.unknown_name(n, arena.expr(e).span));
                    };
                    self.require_coercive(component, declared, span)?;
                    arena.set_expr_type(e, component);
                    env = env.put(n, component);
                }
                arena.set_expr_type(lval, tuple);
                Ok(env)
            }

            ExprKind::FieldAccess { .. }
            | ExprKind::Index { .. }
            | ExprKind::ListAccess { .. }
            | ExprKind::StringAccess { .. }
            | ExprKind::MapAccess { .. }
            | ExprKind::Dereference(_) => {
                self.check_lval_path(arena, lval)?;
                let lt = self.resolve_expr(arena, lval, &env)?;
                self.require_coercive(rt, lt, span)?;
                Ok(env)
            }

            _ => Err(Diagnostic::error(
                ErrorCode::E2009,
                "expression is not assignable",
                arena.expr(lval).span,
            )),
        }
    }

    /// A path lval must bottom out in a variable through field, index and
    /// dereference steps only.
    fn check_lval_path(&self, arena: &AstArena, id: ExprId) -> DiagResult<()> {
        match &arena.expr(id).kind {
            ExprKind::Variable(_) => Ok(()),
            ExprKind::FieldAccess { src, .. }
            | ExprKind::Index { src, .. }
            | ExprKind::ListAccess { src, .. }
            | ExprKind::StringAccess { src, .. }
            | ExprKind::MapAccess { src, .. } => self.check_lval_path(arena, *src),
            ExprKind::Dereference(src) => self.check_lval_path(arena, *src),
            _ => Err(Diagnostic::error(
                ErrorCode::E2009,
                "expression is not assignable",
                arena.expr(id).span,
            )),
        }
    }

    // === Patterns ===

    /// Bind the variables of a declaration pattern against `ty`.
    pub(crate) fn bind_pattern(
        &mut self,
        arena: &AstArena,
        pattern: PatternId,
        ty: TypeId,
        env: &mut Env,
    ) -> DiagResult<()> {
        let p = arena.pattern(pattern).clone();
        match p.kind {
            PatternKind::Leaf(None) => Ok(()),
            PatternKind::Leaf(Some(name)) => {
                env.bind(name, ty);
                Ok(())
            }
            PatternKind::Record(fields) => {
                let Some(record) = effective::as_record(self.pool, &self.module.nominals, ty)
                else {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        format!("cannot destructure `{}` as a record", self.fmt(ty)),
                        p.span,
                    ));
                };
                for (name, sub) in fields {
                    let Some(field_ty) = self.pool.record_field_type(record, name) else {
                        return Err(Diagnostic::error(
                            ErrorCode::E2003,
                            format!(
                                "record `{}` has no field `{}`",
                                self.fmt(record),
                                self.interner.resolve(name)
                            ),
                            p.span,
                        ));
                    };
                    self.bind_pattern(arena, sub, field_ty, env)?;
                }
                Ok(())
            }
            PatternKind::Tuple(elems) => {
                let Some(tuple) = effective::as_tuple(self.pool, &self.module.nominals, ty)
                else {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        format!("cannot destructure `{}` as a tuple", self.fmt(ty)),
                        p.span,
                    ));
                };
                let components = self.pool.children(tuple);
                if components.len() != elems.len() {
                    return Err(Diagnostic::error(
                        ErrorCode::E2004,
                        format!(
                            "tuple pattern has {} elements, type has {}",
                            elems.len(),
                            components.len()
                        ),
                        p.span,
                    ));
                }
                for (&sub, &component) in elems.iter().zip(&components) {
                    self.bind_pattern(arena, sub, component, env)?;
                }
                Ok(())
            }
            PatternKind::Rational { num, den } => {
                if !self.coercive(ty, TypeId::REAL) {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        format!("rational pattern expects a real, found `{}`", self.fmt(ty)),
                        p.span,
                    ));
                }
                self.bind_pattern(arena, num, TypeId::INT, env)?;
                self.bind_pattern(arena, den, TypeId::INT, env)
            }
        }
    }

    /// Bind the loop variables of a for-all or comprehension source.
    pub(crate) fn bind_iteration(
        &mut self,
        binding: ForBinding,
        src_ty: TypeId,
        env: &mut Env,
        span: Span,
    ) -> DiagResult<()> {
        let shape = effective::as_collection(self.pool, &self.module.nominals, src_ty).ok_or_else(
            || {
                Diagnostic::error(
                    ErrorCode::E2013,
                    format!("cannot iterate `{}`", self.fmt(src_ty)),
                    span,
                )
            },
        )?;
        match binding {
            ForBinding::Single(name) => {
                let elem = match shape {
                    Collection::List(e) | Collection::Set(e) => e,
                    Collection::Map(k, v) => self.pool.tuple(&[k, v]),
                    Collection::String => TypeId::CHAR,
                };
                env.bind(name, elem);
                Ok(())
            }
            ForBinding::KeyValue(k_name, v_name) => match shape {
                // Destructuring iteration is a map-only form.
                Collection::Map(k, v) => {
                    env.bind(k_name, k);
                    env.bind(v_name, v);
                    Ok(())
                }
                _ => Err(Diagnostic::error(
                    ErrorCode::E2013,
                    format!(
                        "key/value iteration requires a map source, found `{}`",
                        self.fmt(src_ty)
                    ),
                    span,
                )),
            },
        }
    }

    // === Shared helpers ===

    pub(crate) fn fmt(&self, ty: TypeId) -> String {
        self.pool.format(ty, self.interner)
    }

    pub(crate) fn subtype(&mut self, a: TypeId, b: TypeId) -> bool {
        tern_types::is_subtype(self.pool, &self.module.nominals, a, b)
    }

    pub(crate) fn coercive(&mut self, a: TypeId, b: TypeId) -> bool {
        tern_types::is_coercive_subtype(self.pool, &self.module.nominals, a, b)
    }

    pub(crate) fn require_coercive(&mut self, a: TypeId, b: TypeId, span: Span) -> DiagResult<()> {
        if self.coercive(a, b) {
            Ok(())
        } else {
            Err(Diagnostic::error(
                ErrorCode::E2006,
                format!("`{}` is not a subtype of `{}`", self.fmt(a), self.fmt(b)),
                span,
            ))
        }
    }

    /// Equality-style comparability: the operand types must overlap.
    pub(crate) fn require_comparable(
        &mut self,
        a: TypeId,
        b: TypeId,
        span: Span,
    ) -> DiagResult<()> {
        if self.coercive(a, b) || self.coercive(b, a) {
            return Ok(());
        }
        let nominals: &dyn NominalResolver = &self.module.nominals;
        let mut query = tern_types::SubtypeQuery::new(self.pool, nominals);
        if query.is_inhabited(a, true, b, true) {
            return Ok(());
        }
        Err(Diagnostic::error(
            ErrorCode::E2002,
            format!("`{}` and `{}` are not comparable", self.fmt(a), self.fmt(b)),
            span,
        ))
    }

    pub(crate) fn unknown_name(&self, name: Name, span: Span) -> Diagnostic {
        Diagnostic::error(
            ErrorCode::E2001,
            format!("unknown name `{}`", self.interner.resolve(name)),
            span,
        )
    }
}
