//! Expression typing and disambiguation rewrites.
//!
//! Bottom-up visit: children first, then the node's result type from the
//! language's typing rules. Abstract nodes (`Index`, `SubRange`, `Length`,
//! `Invoke`) are rewritten in place to the concrete variant the code
//! generator consumes.

use tern_diagnostic::{DiagResult, Diagnostic, ErrorCode};
use tern_ir::ast::{
    AstArena, BinaryOp, CompBinding, CompSource, ComprehensionKind, ExprId, ExprKind, ForBinding,
    Param, UnaryOp,
};
use tern_ir::{Name, Span};
use tern_types::effective;
use tern_types::TypeId;

use crate::{Env, Resolver};

impl Resolver<'_> {
    /// Resolve an expression, returning (and recording) its type.
    pub fn resolve_expr(&mut self, arena: &mut AstArena, id: ExprId, env: &Env) -> DiagResult<TypeId> {
        let span = arena.expr(id).span;
        let kind = arena.expr(id).kind.clone();
        let ty = match kind {
            ExprKind::Constant(v) => v.type_of(),

            ExprKind::Variable(name) => self.resolve_variable(arena, id, name, env, span)?,

            ExprKind::ConstantRef(name) => self
                .module
                .constant(name)
                .ok_or_else(|| self.unknown_name(name, span))?,

            // Only appears as a receiver; carries no value.
            ExprKind::ModuleRef(_) => TypeId::VOID,

            ExprKind::Unary { op, operand } => self.resolve_unary(arena, id, op, operand, env, span)?,

            ExprKind::Binary { op, left, right } => {
                self.resolve_binary(arena, id, op, left, right, env, span)?
            }

            ExprKind::RecordLit(fields) => {
                let mut typed = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    let t = self.resolve_expr(arena, value, env)?;
                    typed.push((name, t));
                }
                self.pool.record(&typed, false)
            }

            ExprKind::TupleLit(elems) => {
                let mut typed = Vec::with_capacity(elems.len());
                for e in elems {
                    typed.push(self.resolve_expr(arena, e, env)?);
                }
                self.pool.tuple(&typed)
            }

            ExprKind::ListLit(elems) => {
                let elem = self.resolve_element_union(arena, &elems, env)?;
                self.pool.list(elem)
            }

            ExprKind::SetLit(elems) => {
                let elem = self.resolve_element_union(arena, &elems, env)?;
                self.pool.set(elem)
            }

            ExprKind::MapLit(pairs) => {
                let mut keys = Vec::with_capacity(pairs.len());
                let mut values = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    keys.push(self.resolve_expr(arena, k, env)?);
                    values.push(self.resolve_expr(arena, v, env)?);
                }
                let k = self.pool.union(&keys);
                let v = self.pool.union(&values);
                self.pool.map(k, v)
            }

            ExprKind::FieldAccess { src, field } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                self.field_type(src_ty, field, span)?
            }

            ExprKind::Index { src, index } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let idx_ty = self.resolve_expr(arena, index, env)?;
                // Disambiguate: string, list or map indexing.
                if effective::is_string(self.pool, &self.module.nominals, src_ty) {
                    self.require_coercive(idx_ty, TypeId::INT, arena.expr(index).span)?;
                    arena.set_expr_kind(id, ExprKind::StringAccess { src, index });
                    TypeId::CHAR
                } else if let Some(elem) =
                    effective::as_list(self.pool, &self.module.nominals, src_ty)
                {
                    self.require_coercive(idx_ty, TypeId::INT, arena.expr(index).span)?;
                    arena.set_expr_kind(id, ExprKind::ListAccess { src, index });
                    elem
                } else if let Some((key, value)) =
                    effective::as_map(self.pool, &self.module.nominals, src_ty)
                {
                    self.require_coercive(idx_ty, key, arena.expr(index).span)?;
                    arena.set_expr_kind(id, ExprKind::MapAccess { src, key: index });
                    value
                } else {
                    return Err(Diagnostic::error(
                        ErrorCode::E2013,
                        format!("`{}` cannot be indexed", self.fmt(src_ty)),
                        span,
                    ));
                }
            }

            ExprKind::ListAccess { src, index } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let idx_ty = self.resolve_expr(arena, index, env)?;
                self.require_coercive(idx_ty, TypeId::INT, arena.expr(index).span)?;
                effective::as_list(self.pool, &self.module.nominals, src_ty).ok_or_else(|| {
                    Diagnostic::error(
                        ErrorCode::E2013,
                        format!("`{}` is not a list", self.fmt(src_ty)),
                        span,
                    )
                })?
            }

            ExprKind::StringAccess { src, index } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let idx_ty = self.resolve_expr(arena, index, env)?;
                self.require_coercive(idx_ty, TypeId::INT, arena.expr(index).span)?;
                if !effective::is_string(self.pool, &self.module.nominals, src_ty) {
                    return Err(Diagnostic::error(
                        ErrorCode::E2013,
                        format!("`{}` is not a string", self.fmt(src_ty)),
                        span,
                    ));
                }
                TypeId::CHAR
            }

            ExprKind::MapAccess { src, key } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let key_ty = self.resolve_expr(arena, key, env)?;
                let (k, v) = effective::as_map(self.pool, &self.module.nominals, src_ty)
                    .ok_or_else(|| {
                        Diagnostic::error(
                            ErrorCode::E2013,
                            format!("`{}` is not a map", self.fmt(src_ty)),
                            span,
                        )
                    })?;
                self.require_coercive(key_ty, k, arena.expr(key).span)?;
                v
            }

            ExprKind::SubRange { src, start, end } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let start_ty = self.resolve_expr(arena, start, env)?;
                let end_ty = self.resolve_expr(arena, end, env)?;
                self.require_coercive(start_ty, TypeId::INT, arena.expr(start).span)?;
                self.require_coercive(end_ty, TypeId::INT, arena.expr(end).span)?;
                if effective::is_string(self.pool, &self.module.nominals, src_ty) {
                    arena.set_expr_kind(id, ExprKind::SubString { src, start, end });
                    TypeId::STRING
                } else if let Some(elem) =
                    effective::as_list(self.pool, &self.module.nominals, src_ty)
                {
                    arena.set_expr_kind(id, ExprKind::SubList { src, start, end });
                    self.pool.list(elem)
                } else {
                    return Err(Diagnostic::error(
                        ErrorCode::E2013,
                        format!("`{}` cannot be sliced", self.fmt(src_ty)),
                        span,
                    ));
                }
            }

            ExprKind::SubList { src, .. } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let elem = effective::as_list(self.pool, &self.module.nominals, src_ty)
                    .ok_or_else(|| {
                        Diagnostic::error(
                            ErrorCode::E2013,
                            format!("`{}` is not a list", self.fmt(src_ty)),
                            span,
                        )
                    })?;
                self.pool.list(elem)
            }

            ExprKind::SubString { src, .. } => {
                self.resolve_expr(arena, src, env)?;
                TypeId::STRING
            }

            ExprKind::Length(src) => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let shape = effective::as_collection(self.pool, &self.module.nominals, src_ty)
                    .ok_or_else(|| {
                        Diagnostic::error(
                            ErrorCode::E2013,
                            format!("`{}` has no length", self.fmt(src_ty)),
                            span,
                        )
                    })?;
                let concrete = match shape {
                    effective::Collection::String => ExprKind::StringLength(src),
                    effective::Collection::List(_) => ExprKind::ListLength(src),
                    effective::Collection::Set(_) => ExprKind::SetLength(src),
                    effective::Collection::Map(..) => ExprKind::MapLength(src),
                };
                arena.set_expr_kind(id, concrete);
                TypeId::INT
            }

            ExprKind::ListLength(src)
            | ExprKind::StringLength(src)
            | ExprKind::SetLength(src)
            | ExprKind::MapLength(src) => {
                self.resolve_expr(arena, src, env)?;
                TypeId::INT
            }

            ExprKind::Cast { ty, operand } => {
                let t = self.resolve_expr(arena, operand, env)?;
                // Up- or down-cast: the value sets must be related.
                if !self.coercive(t, ty) && !self.coercive(ty, t) {
                    return Err(Diagnostic::error(
                        ErrorCode::E2006,
                        format!("cannot cast `{}` to `{}`", self.fmt(t), self.fmt(ty)),
                        span,
                    ));
                }
                ty
            }

            ExprKind::New(operand) => {
                let t = self.resolve_expr(arena, operand, env)?;
                self.pool.reference(t)
            }

            ExprKind::Dereference(operand) => {
                let t = self.resolve_expr(arena, operand, env)?;
                effective::as_reference(self.pool, &self.module.nominals, t).ok_or_else(|| {
                    Diagnostic::error(
                        ErrorCode::E2006,
                        format!("`{}` is not a reference", self.fmt(t)),
                        span,
                    )
                })?
            }

            ExprKind::FunctionRef(name) => {
                self.module
                    .function(name)
                    .ok_or_else(|| self.unknown_name(name, span))?
                    .ty
            }

            ExprKind::Invoke {
                receiver,
                name,
                args,
            } => self.resolve_invoke(arena, id, receiver, name, &args, env, span)?,

            ExprKind::FunctionCall { name, args } => {
                let info = self
                    .module
                    .function(name)
                    .ok_or_else(|| self.unknown_name(name, span))?;
                self.check_call(arena, info.ty, &args, env, span)?
            }

            ExprKind::MethodSend {
                receiver,
                name,
                args,
            } => {
                self.resolve_expr(arena, receiver, env)?;
                let info = self
                    .module
                    .function(name)
                    .ok_or_else(|| self.unknown_name(name, span))?;
                self.check_call(arena, info.ty, &args, env, span)?
            }

            ExprKind::IndirectCall { src, args } => {
                let src_ty = self.resolve_expr(arena, src, env)?;
                let callable = effective::as_callable(self.pool, &self.module.nominals, src_ty)
                    .ok_or_else(|| {
                        Diagnostic::error(
                            ErrorCode::E2010,
                            format!("`{}` is not callable", self.fmt(src_ty)),
                            span,
                        )
                    })?;
                self.check_call(arena, callable, &args, env, span)?
            }

            ExprKind::Lambda { ref params, body } => self.resolve_lambda(arena, params.clone(), body, env)?,

            ExprKind::Comprehension {
                kind,
                sources,
                condition,
                value,
            } => self.resolve_comprehension(arena, kind, &sources, condition, value, env, span)?,

            ExprKind::TypeValue(t) => self.pool.meta(t),
        };
        arena.set_expr_type(id, ty);
        Ok(ty)
    }

    fn resolve_element_union(
        &mut self,
        arena: &mut AstArena,
        elems: &[ExprId],
        env: &Env,
    ) -> DiagResult<TypeId> {
        let mut types = Vec::with_capacity(elems.len());
        for &e in elems {
            types.push(self.resolve_expr(arena, e, env)?);
        }
        Ok(self.pool.union(&types))
    }

    fn resolve_variable(
        &mut self,
        arena: &mut AstArena,
        id: ExprId,
        name: Name,
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        if let Some(ty) = env.lookup(name) {
            return Ok(ty);
        }
        // Global name lookup: constant, then function value, then module.
        if let Some(ty) = self.module.constant(name) {
            // Inline the value when the host evaluated it; otherwise keep
            // a reference for the accessor call.
            match self.module.constant_value(name) {
                Some(value) => arena.set_expr_kind(id, ExprKind::Constant(value.clone())),
                None => arena.set_expr_kind(id, ExprKind::ConstantRef(name)),
            }
            return Ok(ty);
        }
        if let Some(info) = self.module.function(name) {
            arena.set_expr_kind(id, ExprKind::FunctionRef(name));
            return Ok(info.ty);
        }
        if self.module.is_module(name) {
            arena.set_expr_kind(id, ExprKind::ModuleRef(name));
            return Ok(TypeId::VOID);
        }
        Err(self.unknown_name(name, span))
    }

    fn resolve_unary(
        &mut self,
        arena: &mut AstArena,
        _id: ExprId,
        op: UnaryOp,
        operand: ExprId,
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        let t = self.resolve_expr(arena, operand, env)?;
        match op {
            UnaryOp::Neg => {
                if !self.coercive(t, TypeId::REAL) {
                    return Err(self.not_numeric(t, span));
                }
                Ok(if self.coercive(t, TypeId::INT) {
                    TypeId::INT
                } else {
                    TypeId::REAL
                })
            }
            UnaryOp::Not => {
                self.require_coercive(t, TypeId::BOOL, span)?;
                Ok(TypeId::BOOL)
            }
            UnaryOp::Invert => {
                self.require_coercive(t, TypeId::BYTE, span)?;
                Ok(TypeId::BYTE)
            }
        }
    }

    fn resolve_binary(
        &mut self,
        arena: &mut AstArena,
        id: ExprId,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        match op {
            // Short-circuit logic routes through condition resolution so
            // the right operand sees the left's refinement.
            BinaryOp::And | BinaryOp::Or => {
                self.resolve_condition(arena, id, true, env)?;
                return Ok(TypeId::BOOL);
            }
            BinaryOp::Is => {
                self.resolve_condition(arena, id, true, env)?;
                return Ok(TypeId::BOOL);
            }
            _ => {}
        }

        let lt = self.resolve_expr(arena, left, env)?;
        let rt = self.resolve_expr(arena, right, env)?;

        match op {
            BinaryOp::Add => self.resolve_add(lt, rt, span),

            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                self.numeric_result(lt, rt, span)
            }

            BinaryOp::Union | BinaryOp::Intersect | BinaryOp::Difference => {
                let le = self.effective_set_elem(lt, span)?;
                let re = self.effective_set_elem(rt, span)?;
                let elem = match op {
                    BinaryOp::Union => self.pool.union_of(le, re),
                    BinaryOp::Intersect => self.pool.intersect_of(le, re),
                    BinaryOp::Difference => le,
                    _ => unreachable!(),
                };
                Ok(self.pool.set(elem))
            }

            BinaryOp::Eq | BinaryOp::Neq => {
                self.require_comparable(lt, rt, span)?;
                Ok(TypeId::BOOL)
            }

            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                if !self.coercive(lt, TypeId::REAL) || !self.coercive(rt, TypeId::REAL) {
                    return Err(Diagnostic::error(
                        ErrorCode::E2002,
                        format!(
                            "cannot order `{}` and `{}`",
                            self.fmt(lt),
                            self.fmt(rt)
                        ),
                        span,
                    ));
                }
                Ok(TypeId::BOOL)
            }

            BinaryOp::ElemOf => {
                let elem = effective::as_list(self.pool, &self.module.nominals, rt)
                    .or_else(|| effective::as_set(self.pool, &self.module.nominals, rt))
                    .ok_or_else(|| {
                        Diagnostic::error(
                            ErrorCode::E2013,
                            format!("`{}` is not a collection", self.fmt(rt)),
                            span,
                        )
                    })?;
                self.require_comparable(lt, elem, span)?;
                Ok(TypeId::BOOL)
            }

            BinaryOp::Subset | BinaryOp::SubsetEq => {
                let le = self.effective_set_elem(lt, span)?;
                let re = self.effective_set_elem(rt, span)?;
                self.require_comparable(le, re, span)?;
                Ok(TypeId::BOOL)
            }

            BinaryOp::And | BinaryOp::Or | BinaryOp::Is => unreachable!("handled above"),
        }
    }

    /// `+` overload resolution: string append, list append, set union or
    /// arithmetic.
    fn resolve_add(&mut self, lt: TypeId, rt: TypeId, span: Span) -> DiagResult<TypeId> {
        let l_string = effective::is_string(self.pool, &self.module.nominals, lt);
        let r_string = effective::is_string(self.pool, &self.module.nominals, rt);
        if l_string || r_string {
            // The other operand must be a string or a char.
            let other = if l_string { rt } else { lt };
            let other_is_char = self.coercive(other, TypeId::CHAR);
            if !(effective::is_string(self.pool, &self.module.nominals, other) || other_is_char) {
                return Err(Diagnostic::error(
                    ErrorCode::E2002,
                    format!(
                        "cannot append `{}` and `{}`",
                        self.fmt(lt),
                        self.fmt(rt)
                    ),
                    span,
                ));
            }
            return Ok(TypeId::STRING);
        }

        let l_list = effective::as_list(self.pool, &self.module.nominals, lt);
        let r_list = effective::as_list(self.pool, &self.module.nominals, rt);
        if let (Some(le), Some(re)) = (l_list, r_list) {
            let elem = self.pool.union_of(le, re);
            return Ok(self.pool.list(elem));
        }

        let l_set = effective::as_set(self.pool, &self.module.nominals, lt);
        let r_set = effective::as_set(self.pool, &self.module.nominals, rt);
        if let (Some(le), Some(re)) = (l_set, r_set) {
            let elem = self.pool.union_of(le, re);
            return Ok(self.pool.set(elem));
        }

        self.numeric_result(lt, rt, span)
    }

    /// Numeric operator result: `int` if both operands are int-like
    /// (char and byte promote), else `real`.
    fn numeric_result(&mut self, lt: TypeId, rt: TypeId, span: Span) -> DiagResult<TypeId> {
        if !self.coercive(lt, TypeId::REAL) {
            return Err(self.not_numeric(lt, span));
        }
        if !self.coercive(rt, TypeId::REAL) {
            return Err(self.not_numeric(rt, span));
        }
        let both_int = self.coercive(lt, TypeId::INT) && self.coercive(rt, TypeId::INT);
        Ok(if both_int { TypeId::INT } else { TypeId::REAL })
    }

    fn effective_set_elem(&mut self, t: TypeId, span: Span) -> DiagResult<TypeId> {
        effective::as_set(self.pool, &self.module.nominals, t).ok_or_else(|| {
            Diagnostic::error(
                ErrorCode::E2013,
                format!("`{}` is not a set", self.fmt(t)),
                span,
            )
        })
    }

    fn not_numeric(&self, t: TypeId, span: Span) -> Diagnostic {
        Diagnostic::error(
            ErrorCode::E2002,
            format!("`{}` is not numeric", self.fmt(t)),
            span,
        )
    }

    pub(crate) fn field_type(&mut self, src_ty: TypeId, field: Name, span: Span) -> DiagResult<TypeId> {
        let record = effective::as_record(self.pool, &self.module.nominals, src_ty).ok_or_else(
            || {
                Diagnostic::error(
                    ErrorCode::E2003,
                    format!("`{}` is not a record", self.fmt(src_ty)),
                    span,
                )
            },
        )?;
        self.pool.record_field_type(record, field).ok_or_else(|| {
            Diagnostic::error(
                ErrorCode::E2003,
                format!(
                    "record `{}` has no field `{}`",
                    self.fmt(record),
                    self.interner.resolve(field)
                ),
                span,
            )
        })
    }

    // === Invocation disambiguation ===

    #[allow(clippy::too_many_arguments)]
    fn resolve_invoke(
        &mut self,
        arena: &mut AstArena,
        id: ExprId,
        receiver: Option<ExprId>,
        name: Name,
        args: &[ExprId],
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        match receiver {
            None => {
                // Unqualified: module function, else a local variable of
                // function type (indirect call).
                if env.lookup(name).is_none() {
                    if let Some(info) = self.module.function(name) {
                        let ret = self.check_call(arena, info.ty, args, env, span)?;
                        arena.set_expr_kind(
                            id,
                            ExprKind::FunctionCall {
                                name,
                                args: args.to_vec(),
                            },
                        );
                        return Ok(ret);
                    }
                }
                if let Some(var_ty) = env.lookup(name) {
                    let callable =
                        effective::as_callable(self.pool, &self.module.nominals, var_ty)
                            .ok_or_else(|| {
                                Diagnostic::error(
                                    ErrorCode::E2010,
                                    format!("`{}` is not callable", self.fmt(var_ty)),
                                    span,
                                )
                            })?;
                    let ret = self.check_call(arena, callable, args, env, span)?;
                    let src = arena.alloc_expr(ExprKind::Variable(name), span);
                    arena.set_expr_type(src, var_ty);
                    arena.set_expr_kind(
                        id,
                        ExprKind::IndirectCall {
                            src,
                            args: args.to_vec(),
                        },
                    );
                    return Ok(ret);
                }
                Err(self.unknown_name(name, span))
            }

            Some(recv) => {
                // Module-qualified call?
                if let ExprKind::Variable(module_name) = arena.expr(recv).kind {
                    if env.lookup(module_name).is_none() && self.module.is_module(module_name) {
                        let (key, info) = self
                            .module
                            .qualified_function(module_name, name)
                            .ok_or_else(|| self.unknown_name(name, span))?;
                        arena.set_expr_kind(recv, ExprKind::ModuleRef(module_name));
                        arena.set_expr_type(recv, TypeId::VOID);
                        let ret = self.check_call(arena, info.ty, args, env, span)?;
                        arena.set_expr_kind(
                            id,
                            ExprKind::FunctionCall {
                                name: key,
                                args: args.to_vec(),
                            },
                        );
                        return Ok(ret);
                    }
                }

                let recv_ty = self.resolve_expr(arena, recv, env)?;

                // Record receiver with a function-typed field: field
                // access plus indirect call.
                if let Some(record) =
                    effective::as_record(self.pool, &self.module.nominals, recv_ty)
                {
                    if let Some(field_ty) = self.pool.record_field_type(record, name) {
                        let callable =
                            effective::as_callable(self.pool, &self.module.nominals, field_ty)
                                .ok_or_else(|| {
                                    Diagnostic::error(
                                        ErrorCode::E2010,
                                        format!("field `{}` is not callable", self.fmt(field_ty)),
                                        span,
                                    )
                                })?;
                        let ret = self.check_call(arena, callable, args, env, span)?;
                        let src = arena.alloc_expr(
                            ExprKind::FieldAccess {
                                src: recv,
                                field: name,
                            },
                            span,
                        );
                        arena.set_expr_type(src, field_ty);
                        arena.set_expr_kind(
                            id,
                            ExprKind::IndirectCall {
                                src,
                                args: args.to_vec(),
                            },
                        );
                        return Ok(ret);
                    }
                }

                // Message send to a declared method: the receiver is the
                // implicit first argument.
                if let Some(info) = self.module.function(name) {
                    if self.pool.tag(info.ty) == tern_types::Tag::Method {
                        let recv_param = self.pool.callable_param(info.ty, 0);
                        self.require_coercive(recv_ty, recv_param, arena.expr(recv).span)?;
                        let ret =
                            self.check_method_send(arena, info.ty, args, env, span)?;
                        arena.set_expr_kind(
                            id,
                            ExprKind::MethodSend {
                                receiver: recv,
                                name,
                                args: args.to_vec(),
                            },
                        );
                        return Ok(ret);
                    }
                }

                Err(self.unknown_name(name, span))
            }
        }
    }

    /// Arity and argument checks against a callable signature; returns
    /// the declared return type.
    pub(crate) fn check_call(
        &mut self,
        arena: &mut AstArena,
        signature: TypeId,
        args: &[ExprId],
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        let params = self.pool.callable_params(signature);
        if params.len() != args.len() {
            return Err(Diagnostic::error(
                ErrorCode::E2004,
                format!("expected {} arguments, found {}", params.len(), args.len()),
                span,
            ));
        }
        for (&arg, &param) in args.iter().zip(&params) {
            let t = self.resolve_expr(arena, arg, env)?;
            self.require_coercive(t, param, arena.expr(arg).span)?;
        }
        Ok(self.pool.callable_return(signature))
    }

    /// Like `check_call`, but the first parameter is the receiver and the
    /// explicit arguments bind from the second onward.
    fn check_method_send(
        &mut self,
        arena: &mut AstArena,
        signature: TypeId,
        args: &[ExprId],
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        let params = self.pool.callable_params(signature);
        if params.len() != args.len() + 1 {
            return Err(Diagnostic::error(
                ErrorCode::E2004,
                format!(
                    "expected {} arguments, found {}",
                    params.len().saturating_sub(1),
                    args.len()
                ),
                span,
            ));
        }
        for (&arg, &param) in args.iter().zip(&params[1..]) {
            let t = self.resolve_expr(arena, arg, env)?;
            self.require_coercive(t, param, arena.expr(arg).span)?;
        }
        Ok(self.pool.callable_return(signature))
    }

    // === Lambdas and comprehensions ===

    fn resolve_lambda(
        &mut self,
        arena: &mut AstArena,
        params: Vec<Param>,
        body: ExprId,
        env: &Env,
    ) -> DiagResult<TypeId> {
        // The body sees the enclosing environment (captures) shadowed by
        // the lambda's own parameters.
        let mut inner = env.clone();
        for p in &params {
            inner.bind(p.name, p.ty);
        }
        let body_ty = self.resolve_expr(arena, body, &inner)?;
        let param_types: Vec<TypeId> = params.iter().map(|p| p.ty).collect();
        Ok(self.pool.function(&param_types, body_ty, TypeId::VOID))
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_comprehension(
        &mut self,
        arena: &mut AstArena,
        kind: ComprehensionKind,
        sources: &[CompSource],
        condition: Option<ExprId>,
        value: Option<ExprId>,
        env: &Env,
        span: Span,
    ) -> DiagResult<TypeId> {
        let mut inner = env.clone();
        for source in sources {
            let src_ty = self.resolve_expr(arena, source.source, &inner)?;
            let src_span = arena.expr(source.source).span;
            let binding = match source.binding {
                CompBinding::Single(n) => ForBinding::Single(n),
                CompBinding::KeyValue(k, v) => ForBinding::KeyValue(k, v),
            };
            self.bind_iteration(binding, src_ty, &mut inner, src_span)?;
        }

        if kind.is_boolean() {
            let cond = condition.ok_or_else(|| {
                Diagnostic::error(ErrorCode::E2005, "quantifier requires a condition", span)
            })?;
            self.resolve_condition(arena, cond, true, &inner)?;
            return Ok(TypeId::BOOL);
        }

        if let Some(cond) = condition {
            self.resolve_condition(arena, cond, true, &inner)?;
        }
        let value = value.ok_or_else(|| {
            Diagnostic::error(ErrorCode::E2006, "comprehension requires a value", span)
        })?;
        let value_ty = self.resolve_expr(arena, value, &inner)?;
        Ok(match kind {
            ComprehensionKind::List => self.pool.list(value_ty),
            ComprehensionKind::Set => self.pool.set(value_ty),
            _ => unreachable!("boolean kinds handled above"),
        })
    }
}
