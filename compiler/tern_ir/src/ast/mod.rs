//! Abstract syntax tree.
//!
//! Nodes live in a per-module [`AstArena`] and reference each other through
//! u32 id newtypes — no `Box` children. Expression nodes carry a mutable
//! resolved-type slot ([`TypeId::NONE`] until resolution) and can be
//! rewritten in place to a more specific variant via
//! [`AstArena::set_expr_kind`]; span and identity are preserved across the
//! rewrite.

mod decl;
mod expr;
mod operators;
mod pattern;
mod stmt;

pub use decl::{ConstantDecl, Decl, FunctionDecl, FunctionKind, Module, Param, TypeDecl};
pub use expr::{CompBinding, CompSource, ComprehensionKind, Expr, ExprKind};
pub use operators::{BinaryOp, UnaryOp};
pub use pattern::{Pattern, PatternKind};
pub use stmt::{CatchClause, ForBinding, Stmt, StmtKind, SwitchCase};

use crate::{Span, TypeId};

macro_rules! ast_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

ast_id! {
    /// Index of an expression in an [`AstArena`].
    ExprId
}
ast_id! {
    /// Index of a statement in an [`AstArena`].
    StmtId
}
ast_id! {
    /// Index of a pattern in an [`AstArena`].
    PatternId
}

/// Arena owning every AST node of one module.
///
/// Ids are allocated monotonically and never invalidated; the Resolver
/// mutates nodes through `set_expr_kind` / `set_expr_type` but never
/// removes them.
#[derive(Default)]
pub struct AstArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    patterns: Vec<Pattern>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    // === Allocation ===

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId::from_raw(self.exprs.len() as u32);
        self.exprs.push(Expr {
            kind,
            span,
            ty: TypeId::NONE,
        });
        id
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId::from_raw(self.stmts.len() as u32);
        self.stmts.push(Stmt { kind, span });
        id
    }

    pub fn alloc_pattern(&mut self, kind: PatternKind, span: Span) -> PatternId {
        let id = PatternId::from_raw(self.patterns.len() as u32);
        self.patterns.push(Pattern { kind, span });
        id
    }

    // === Access ===

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.raw() as usize]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.raw() as usize]
    }

    #[inline]
    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.patterns[id.raw() as usize]
    }

    /// Resolved type of an expression (`TypeId::NONE` before resolution).
    #[inline]
    pub fn expr_type(&self, id: ExprId) -> TypeId {
        self.exprs[id.raw() as usize].ty
    }

    // === Resolver mutation ===

    /// Rewrite an expression to a more specific variant in place.
    ///
    /// The span and the resolved-type slot survive the rewrite.
    pub fn set_expr_kind(&mut self, id: ExprId, kind: ExprKind) {
        self.exprs[id.raw() as usize].kind = kind;
    }

    /// Record the resolved type of an expression.
    pub fn set_expr_type(&mut self, id: ExprId, ty: TypeId) {
        self.exprs[id.raw() as usize].ty = ty;
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Name;

    #[test]
    fn rewrite_preserves_span_and_type() {
        let mut arena = AstArena::new();
        let span = Span::new(3, 9);
        let id = arena.alloc_expr(ExprKind::Variable(Name::from_raw(7)), span);
        arena.set_expr_type(id, TypeId::INT);

        arena.set_expr_kind(id, ExprKind::ModuleRef(Name::from_raw(7)));

        assert_eq!(arena.expr(id).span, span);
        assert_eq!(arena.expr_type(id), TypeId::INT);
        assert!(matches!(arena.expr(id).kind, ExprKind::ModuleRef(_)));
    }
}
