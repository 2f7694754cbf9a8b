//! Bytecode generation for declarations and statements.
//!
//! Each declaration lowers into an [`IrDeclaration`]: parameters occupy
//! registers `0..n`, structured statements become labelled goto graphs,
//! and an implicit `Return` terminates every function body. Lambdas
//! synthesized along the way accumulate on the generator and are appended
//! to the module's declarations.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{
    AstArena, CatchClause, Decl, ExprId, ExprKind, ForBinding, FunctionDecl, FunctionKind, Module,
    StmtId, StmtKind, SwitchCase,
};
use tern_ir::{
    CodeBlock, Insn, IrDeclKind, IrDeclaration, IrModule, LabelId, LvalStep, Reg, Regs, Span,
    StringInterner, UnArith, Value,
};
use tern_resolve::ModuleEnv;
use tern_types::effective::{self, Collection};
use tern_types::{Pool, Tag, TypeId};

use crate::CodegenEnv;

/// Per-function lowering state: the block under construction, the
/// register environment, label allocation and the break-scope stack.
pub(crate) struct FnBuilder {
    pub env: CodegenEnv,
    pub code: CodeBlock,
    next_label: u32,
    /// Exit labels of enclosing loops; `break` targets the innermost.
    breaks: Vec<LabelId>,
}

impl FnBuilder {
    pub fn new() -> Self {
        FnBuilder {
            env: CodegenEnv::new(),
            code: CodeBlock::new(),
            next_label: 0,
            breaks: Vec::new(),
        }
    }

    pub fn fresh_label(&mut self) -> LabelId {
        let label = LabelId::from_raw(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn push(&mut self, insn: Insn, span: Span) {
        self.code.push(insn, span);
    }
}

/// Per-function context carried through statement lowering.
#[derive(Copy, Clone)]
pub(crate) struct FnCtx {
    /// Declared return type (`TypeId::VOID` for none).
    pub ret: TypeId,
}

/// The code generator.
pub struct Generator<'a> {
    pub(crate) pool: &'a mut Pool,
    pub(crate) module: &'a ModuleEnv,
    pub(crate) interner: &'a StringInterner,
    /// Synthesized lambda declarations, appended to the module.
    pub(crate) lambdas: Vec<IrDeclaration>,
    pub(crate) lambda_counter: u32,
}

impl<'a> Generator<'a> {
    pub fn new(pool: &'a mut Pool, module: &'a ModuleEnv, interner: &'a StringInterner) -> Self {
        Generator {
            pool,
            module,
            interner,
            lambdas: Vec::new(),
            lambda_counter: 0,
        }
    }

    /// Compile a resolved module: every declaration plus synthesized
    /// lambdas.
    pub fn generate_module(&mut self, module: &mut Module) -> DiagResult<IrModule> {
        let mut out = IrModule::new(module.name);
        let Module { decls, arena, .. } = module;
        for decl in decls.iter() {
            let compiled = self.generate(arena, decl)?;
            out.decls.push(compiled);
        }
        out.decls.append(&mut self.lambdas);
        Ok(out)
    }

    /// Compile one declaration.
    pub fn generate(&mut self, arena: &mut AstArena, decl: &Decl) -> DiagResult<IrDeclaration> {
        tracing::debug!(name = self.interner.resolve(decl.name()), "generating declaration");
        match decl {
            Decl::Constant(c) => {
                let mut b = FnBuilder::new();
                let reg = self.generate_expr(&mut b, arena, c.init)?;
                b.push(Insn::Return(Some((c.ty, reg))), c.span);
                Ok(IrDeclaration {
                    name: c.name,
                    ty: c.ty,
                    kind: IrDeclKind::Constant,
                    body: b.code,
                    precondition: None,
                    postcondition: None,
                    span: c.span,
                })
            }

            Decl::TypeInvariant(t) => {
                let mut b = FnBuilder::new();
                // Register 0 holds the root value under test.
                let root = b.env.alloc(t.ty);
                self.destructure(&mut b, arena, root, t.pattern, t.ty)?;
                for &clause in &t.invariants {
                    self.generate_assertion(&mut b, arena, clause, "type invariant not satisfied")?;
                }
                b.push(Insn::Return(None), t.span);
                Ok(IrDeclaration {
                    name: t.name,
                    ty: t.ty,
                    kind: IrDeclKind::TypeInvariant,
                    body: b.code,
                    precondition: None,
                    postcondition: None,
                    span: t.span,
                })
            }

            Decl::Function(f) => self.generate_function(arena, f),
        }
    }

    fn generate_function(
        &mut self,
        arena: &mut AstArena,
        f: &FunctionDecl,
    ) -> DiagResult<IrDeclaration> {
        let param_types: Vec<TypeId> = f.params.iter().map(|p| p.ty).collect();
        let signature = match f.kind {
            FunctionKind::Function => self.pool.function(&param_types, f.ret, f.throws),
            FunctionKind::Method => self.pool.method(&param_types, f.ret, f.throws),
        };

        // Contract blocks first; they use their own frames.
        let precondition = if f.requires.is_empty() {
            None
        } else {
            let mut b = FnBuilder::new();
            for p in &f.params {
                b.env.declare(p.name, p.ty);
            }
            for &clause in &f.requires {
                self.generate_assertion(&mut b, arena, clause, "precondition not satisfied")?;
            }
            Some(b.code)
        };

        let postcondition = if f.ensures.is_empty() {
            None
        } else {
            let mut b = FnBuilder::new();
            for p in &f.params {
                b.env.declare(p.name, p.ty);
            }
            // The return slot sits just past the parameters, named `$`.
            b.env.declare(self.interner.intern("$"), f.ret);
            for &clause in &f.ensures {
                self.generate_assertion(&mut b, arena, clause, "postcondition not satisfied")?;
            }
            Some(b.code)
        };

        let mut b = FnBuilder::new();
        for p in &f.params {
            b.env.declare(p.name, p.ty);
        }
        let ctx = FnCtx { ret: f.ret };
        self.generate_stmts(&mut b, arena, &f.body, ctx)?;
        // Implicit return; with a declared return type every live path
        // already returned, so this marks dead code.
        b.push(Insn::Return(None), f.span);

        let num_params = f.params.len() as u32;
        Ok(IrDeclaration {
            name: f.name,
            ty: signature,
            kind: match f.kind {
                FunctionKind::Function => IrDeclKind::Function { num_params },
                FunctionKind::Method => IrDeclKind::Method { num_params },
            },
            body: b.code,
            precondition,
            postcondition,
            span: f.span,
        })
    }

    // === Statements ===

    pub(crate) fn generate_stmts(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        stmts: &[StmtId],
        ctx: FnCtx,
    ) -> DiagResult<()> {
        for &id in stmts {
            self.generate_stmt(b, arena, id, ctx)?;
        }
        Ok(())
    }

    fn generate_stmt(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        id: StmtId,
        ctx: FnCtx,
    ) -> DiagResult<()> {
        let span = arena.stmt(id).span;
        let kind = arena.stmt(id).kind.clone();
        match kind {
            StmtKind::VarDecl { pattern, ty, init } => match init {
                Some(init) => {
                    let value = self.generate_expr(b, arena, init)?;
                    let root = b.env.alloc(ty);
                    b.push(
                        Insn::Assign {
                            ty,
                            target: root,
                            src: value,
                        },
                        span,
                    );
                    self.destructure(b, arena, root, pattern, ty)
                }
                None => {
                    // No initializer: allocate registers and record the
                    // names, but emit no code.
                    self.declare_silent(b, arena, pattern, ty)
                }
            },

            StmtKind::Assign { lval, rval } => {
                let value = self.generate_expr(b, arena, rval)?;
                self.generate_assign(b, arena, lval, value, span)
            }

            StmtKind::Assert { cond } | StmtKind::Assume { cond } => {
                self.generate_assertion(b, arena, cond, "assertion failed")
            }

            StmtKind::Return(Some(e)) => {
                let value = self.generate_expr(b, arena, e)?;
                // The declared return type forces the implicit coercion.
                b.push(Insn::Return(Some((ctx.ret, value))), span);
                Ok(())
            }

            StmtKind::Return(None) => {
                b.push(Insn::Return(None), span);
                Ok(())
            }

            StmtKind::Debug(e) => {
                let operand = self.generate_expr(b, arena, e)?;
                b.push(Insn::Debug { operand }, span);
                Ok(())
            }

            StmtKind::Throw(e) => {
                let ty = arena.expr_type(e);
                let operand = self.generate_expr(b, arena, e)?;
                b.push(Insn::Throw { ty, operand }, span);
                Ok(())
            }

            StmtKind::IfElse {
                cond,
                then_body,
                else_body,
            } => {
                let false_label = b.fresh_label();
                let inverted = self.invert(arena, cond);
                self.generate_condition(b, arena, false_label, inverted)?;
                self.generate_stmts(b, arena, &then_body, ctx)?;
                if else_body.is_empty() {
                    b.push(Insn::Label(false_label), span);
                } else {
                    let exit = b.fresh_label();
                    b.push(Insn::Goto(exit), span);
                    b.push(Insn::Label(false_label), span);
                    self.generate_stmts(b, arena, &else_body, ctx)?;
                    b.push(Insn::Label(exit), span);
                }
                Ok(())
            }

            StmtKind::While { cond, body } => {
                let head = b.fresh_label();
                let exit = b.fresh_label();
                b.push(
                    Insn::Loop {
                        head,
                        modified: Regs::new(),
                    },
                    span,
                );
                let inverted = self.invert(arena, cond);
                self.generate_condition(b, arena, exit, inverted)?;
                b.breaks.push(exit);
                self.generate_stmts(b, arena, &body, ctx)?;
                b.breaks.pop();
                b.push(Insn::Nop, span);
                b.push(Insn::LoopEnd(head), span);
                b.push(Insn::Label(exit), span);
                Ok(())
            }

            StmtKind::DoWhile { body, cond } => {
                let head = b.fresh_label();
                let exit = b.fresh_label();
                b.push(
                    Insn::Loop {
                        head,
                        modified: Regs::new(),
                    },
                    span,
                );
                b.breaks.push(exit);
                self.generate_stmts(b, arena, &body, ctx)?;
                b.breaks.pop();
                let inverted = self.invert(arena, cond);
                self.generate_condition(b, arena, exit, inverted)?;
                b.push(Insn::Nop, span);
                b.push(Insn::LoopEnd(head), span);
                b.push(Insn::Label(exit), span);
                Ok(())
            }

            StmtKind::ForAll {
                binding,
                source,
                body,
            } => {
                let head = b.fresh_label();
                let exit = b.fresh_label();
                let src = self.generate_expr(b, arena, source)?;
                let coll_ty = arena.expr_type(source);
                self.open_iteration(b, binding, coll_ty, src, head, span)?;
                b.breaks.push(exit);
                self.generate_stmts(b, arena, &body, ctx)?;
                b.breaks.pop();
                b.push(Insn::Nop, span);
                b.push(Insn::LoopEnd(head), span);
                b.push(Insn::Label(exit), span);
                Ok(())
            }

            StmtKind::Switch { operand, cases } => {
                self.generate_switch(b, arena, operand, &cases, ctx, span)
            }

            StmtKind::TryCatch { body, catches } => {
                self.generate_try_catch(b, arena, &body, &catches, ctx, span)
            }

            StmtKind::Break => match b.breaks.last() {
                Some(&exit) => {
                    b.push(Insn::Goto(exit), span);
                    Ok(())
                }
                None => Err(Diagnostic::error(
                    ErrorCode::E3001,
                    "break outside of a loop",
                    span,
                )),
            },

            StmtKind::Skip => {
                b.push(Insn::Nop, span);
                Ok(())
            }

            StmtKind::Expr(e) => self.generate_expr_stmt(b, arena, e, span),
        }
    }

    fn generate_switch(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        operand: ExprId,
        cases: &[SwitchCase],
        ctx: FnCtx,
        span: Span,
    ) -> DiagResult<()> {
        let op_ty = arena.expr_type(operand);
        let op_reg = self.generate_expr(b, arena, operand)?;

        // Reserve the dispatch slot; the instruction is inserted once all
        // case labels are known, immediately before the first body.
        let reserved = b.code.len();
        let exit = b.fresh_label();

        let mut branches: Vec<(Value, LabelId)> = Vec::new();
        let mut default_label: Option<LabelId> = None;

        for case in cases {
            let label = b.fresh_label();
            if case.is_default {
                default_label = Some(label);
            } else {
                for &value_expr in &case.values {
                    let ExprKind::Constant(value) = &arena.expr(value_expr).kind else {
                        return Err(Diagnostic::bug(
                            ErrorCode::E9002,
                            "non-constant case survived resolution",
                            arena.expr(value_expr).span,
                        ));
                    };
                    branches.push((value.clone(), label));
                }
            }
            b.push(Insn::Label(label), span);
            self.generate_stmts(b, arena, &case.body, ctx)?;
            b.push(Insn::Goto(exit), span);
        }

        b.code.insert(
            reserved,
            Insn::Switch {
                ty: op_ty,
                operand: op_reg,
                default: default_label.unwrap_or(exit),
                branches,
            },
            span,
        );
        b.push(Insn::Label(exit), span);
        Ok(())
    }

    fn generate_try_catch(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        body: &[StmtId],
        catches: &[CatchClause],
        ctx: FnCtx,
        span: Span,
    ) -> DiagResult<()> {
        // The exception register carries whichever handler type matched.
        let catch_types: Vec<TypeId> = catches.iter().map(|c| c.ty).collect();
        let exc_ty = self.pool.union(&catch_types);
        let exc = b.env.alloc(exc_ty);

        let reserved = b.code.len();
        let end = b.fresh_label();
        let exit = b.fresh_label();

        self.generate_stmts(b, arena, body, ctx)?;
        b.push(Insn::Goto(exit), span);

        let mut handler_labels: Vec<(TypeId, LabelId)> = Vec::new();
        for (i, catch) in catches.iter().enumerate() {
            // The first handler is introduced by the TryEnd marker that
            // closes the try region; later handlers get plain labels.
            let label = if i == 0 {
                b.push(Insn::TryEnd(end), span);
                end
            } else {
                let label = b.fresh_label();
                b.push(Insn::Label(label), span);
                label
            };
            handler_labels.push((catch.ty, label));
            b.env.bind(catch.var, exc);
            self.generate_stmts(b, arena, &catch.body, ctx)?;
            b.push(Insn::Goto(exit), span);
        }

        b.code.insert(
            reserved,
            Insn::TryCatch {
                exc,
                end,
                catches: handler_labels,
            },
            span,
        );
        b.push(Insn::Label(exit), span);
        Ok(())
    }

    /// Open one iteration: emit the `ForAll` header and bind the loop
    /// variables. Returns the index register.
    pub(crate) fn open_iteration(
        &mut self,
        b: &mut FnBuilder,
        binding: ForBinding,
        coll_ty: TypeId,
        src: Reg,
        head: LabelId,
        span: Span,
    ) -> DiagResult<Reg> {
        let shape = effective::as_collection(self.pool, &self.module.nominals, coll_ty)
            .ok_or_else(|| {
                Diagnostic::bug(
                    ErrorCode::E9002,
                    "non-collection iteration source survived resolution",
                    span,
                )
            })?;
        match binding {
            ForBinding::Single(name) => {
                let elem_ty = match shape {
                    Collection::List(e) | Collection::Set(e) => e,
                    Collection::Map(k, v) => self.pool.tuple(&[k, v]),
                    Collection::String => TypeId::CHAR,
                };
                let var = b.env.declare(name, elem_ty);
                b.push(
                    Insn::ForAll {
                        ty: coll_ty,
                        src,
                        var,
                        modified: Regs::new(),
                        head,
                    },
                    span,
                );
                Ok(var)
            }
            ForBinding::KeyValue(key_name, value_name) => {
                // Destructuring iteration is only defined for maps.
                let Collection::Map(k, v) = shape else {
                    return Err(Diagnostic::bug(
                        ErrorCode::E9002,
                        "key/value iteration over a non-map survived resolution",
                        span,
                    ));
                };
                let entry_ty = self.pool.tuple(&[k, v]);
                let var = b.env.alloc(entry_ty);
                b.push(
                    Insn::ForAll {
                        ty: coll_ty,
                        src,
                        var,
                        modified: Regs::new(),
                        head,
                    },
                    span,
                );
                let key_reg = b.env.declare(key_name, k);
                b.push(
                    Insn::TupleLoad {
                        ty: entry_ty,
                        target: key_reg,
                        src: var,
                        index: 0,
                    },
                    span,
                );
                let value_reg = b.env.declare(value_name, v);
                b.push(
                    Insn::TupleLoad {
                        ty: entry_ty,
                        target: value_reg,
                        src: var,
                        index: 1,
                    },
                    span,
                );
                Ok(var)
            }
        }
    }

    // === Assignment ===

    fn generate_assign(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        lval: ExprId,
        value: Reg,
        span: Span,
    ) -> DiagResult<()> {
        let kind = arena.expr(lval).kind.clone();
        match kind {
            ExprKind::Variable(name) => {
                let target = b
                    .env
                    .lookup(name)
                    .ok_or_else(|| self.bug_unknown_var(name, span))?;
                b.push(
                    Insn::Assign {
                        ty: b.env.reg_type(target),
                        target,
                        src: value,
                    },
                    span,
                );
                Ok(())
            }

            ExprKind::TupleLit(elems) => {
                let rt = arena.expr_type(lval);
                if self.pool.tag(rt) != Tag::Tuple {
                    // Rational destructuring: numerator and denominator.
                    let &[num, den] = elems.as_slice() else {
                        return Err(Diagnostic::bug(
                            ErrorCode::E9002,
                            "rational lval without two components",
                            span,
                        ));
                    };
                    let num_reg = self.lval_var_reg(b, arena, num, span)?;
                    b.push(
                        Insn::UnArithOp {
                            ty: TypeId::REAL,
                            kind: UnArith::Numerator,
                            target: num_reg,
                            operand: value,
                        },
                        span,
                    );
                    let den_reg = self.lval_var_reg(b, arena, den, span)?;
                    b.push(
                        Insn::UnArithOp {
                            ty: TypeId::REAL,
                            kind: UnArith::Denominator,
                            target: den_reg,
                            operand: value,
                        },
                        span,
                    );
                    return Ok(());
                }

                for (i, &component) in elems.iter().enumerate() {
                    let target = self.lval_var_reg(b, arena, component, span)?;
                    b.push(
                        Insn::TupleLoad {
                            ty: rt,
                            target,
                            src: value,
                            index: i as u32,
                        },
                        span,
                    );
                }
                Ok(())
            }

            ExprKind::FieldAccess { .. }
            | ExprKind::ListAccess { .. }
            | ExprKind::StringAccess { .. }
            | ExprKind::MapAccess { .. }
            | ExprKind::Dereference(_) => {
                // Path assignment: collect the base variable and the
                // ordered access path, pre-computing index registers.
                let mut path = Vec::new();
                let base = self.collect_lval_path(b, arena, lval, &mut path, span)?;
                b.push(
                    Insn::Update {
                        ty: b.env.reg_type(base),
                        target: base,
                        path,
                        value,
                    },
                    span,
                );
                Ok(())
            }

            _ => Err(Diagnostic::bug(
                ErrorCode::E9002,
                "invalid lval survived resolution",
                span,
            )),
        }
    }

    fn lval_var_reg(
        &mut self,
        b: &mut FnBuilder,
        arena: &AstArena,
        id: ExprId,
        span: Span,
    ) -> DiagResult<Reg> {
        match arena.expr(id).kind {
            ExprKind::Variable(name) => b
                .env
                .lookup(name)
                .ok_or_else(|| self.bug_unknown_var(name, span)),
            _ => Err(Diagnostic::bug(
                ErrorCode::E9002,
                "destructuring lval component is not a variable",
                span,
            )),
        }
    }

    /// Walk an lval path down to its base variable, appending steps in
    /// source order. Index expressions evaluate here, left to right.
    fn collect_lval_path(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        id: ExprId,
        path: &mut Vec<LvalStep>,
        span: Span,
    ) -> DiagResult<Reg> {
        let kind = arena.expr(id).kind.clone();
        match kind {
            ExprKind::Variable(name) => b
                .env
                .lookup(name)
                .ok_or_else(|| self.bug_unknown_var(name, span)),
            ExprKind::FieldAccess { src, field } => {
                let base = self.collect_lval_path(b, arena, src, path, span)?;
                path.push(LvalStep::Field(field));
                Ok(base)
            }
            ExprKind::ListAccess { src, index } | ExprKind::StringAccess { src, index } => {
                let base = self.collect_lval_path(b, arena, src, path, span)?;
                let index_reg = self.generate_expr(b, arena, index)?;
                path.push(LvalStep::Index(index_reg));
                Ok(base)
            }
            ExprKind::MapAccess { src, key } => {
                let base = self.collect_lval_path(b, arena, src, path, span)?;
                let key_reg = self.generate_expr(b, arena, key)?;
                path.push(LvalStep::Index(key_reg));
                Ok(base)
            }
            ExprKind::Dereference(src) => {
                let base = self.collect_lval_path(b, arena, src, path, span)?;
                path.push(LvalStep::Deref);
                Ok(base)
            }
            _ => Err(Diagnostic::bug(
                ErrorCode::E9002,
                "invalid lval path survived resolution",
                span,
            )),
        }
    }

    // === Assertions ===

    /// Lower a checked condition. Comparisons assert directly; any other
    /// boolean expression materializes and asserts equality with `true`.
    pub(crate) fn generate_assertion(
        &mut self,
        b: &mut FnBuilder,
        arena: &mut AstArena,
        cond: ExprId,
        message: &str,
    ) -> DiagResult<()> {
        let span = arena.expr(cond).span;
        if let ExprKind::Binary { op, left, right } = arena.expr(cond).kind.clone() {
            if let Some(cmp) = crate::cond::comparison_op(op) {
                let lt = arena.expr_type(left);
                let rt = arena.expr_type(right);
                let left_reg = self.generate_expr(b, arena, left)?;
                let right_reg = self.generate_expr(b, arena, right)?;
                let ty = self.pool.union_of(lt, rt);
                b.push(
                    Insn::Assert {
                        ty,
                        left: left_reg,
                        right: right_reg,
                        cmp,
                        message: message.to_owned(),
                    },
                    span,
                );
                return Ok(());
            }
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
            Insn::Assert {
                ty: TypeId::BOOL,
                left: cond_reg,
                right: true_reg,
                cmp: tern_ir::Cmp::Eq,
                message: message.to_owned(),
            },
            span,
        );
        Ok(())
    }

    // === Helpers ===

    pub(crate) fn bug_unknown_var(&self, name: tern_ir::Name, span: Span) -> Diagnostic {
        Diagnostic::bug(
            ErrorCode::E9002,
            format!(
                "variable `{}` has no register",
                self.interner.resolve(name)
            ),
            span,
        )
    }
}
