//! Top-level declarations and the module container.

use super::{AstArena, ExprId, PatternId, StmtId};
use crate::{Name, Span, SourceId, TypeId};

/// A compilation unit: declarations plus the arena that owns their nodes.
pub struct Module {
    pub name: Name,
    pub source: SourceId,
    pub decls: Vec<Decl>,
    pub arena: AstArena,
}

impl Module {
    pub fn new(name: Name, source: SourceId) -> Self {
        Module {
            name,
            source,
            decls: Vec::new(),
            arena: AstArena::new(),
        }
    }
}

/// Top-level declaration.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Decl {
    Constant(ConstantDecl),
    TypeInvariant(TypeDecl),
    Function(FunctionDecl),
}

impl Decl {
    pub fn name(&self) -> Name {
        match self {
            Decl::Constant(d) => d.name,
            Decl::TypeInvariant(d) => d.name,
            Decl::Function(d) => d.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Constant(d) => d.span,
            Decl::TypeInvariant(d) => d.span,
            Decl::Function(d) => d.span,
        }
    }
}

/// Module constant `define name = init`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ConstantDecl {
    pub name: Name,
    pub ty: TypeId,
    pub init: ExprId,
    pub span: Span,
}

/// Named type with an optional invariant, `define name as T where ...`.
///
/// The pattern destructures the root value for use in the invariant
/// clauses.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeDecl {
    pub name: Name,
    pub pattern: PatternId,
    pub ty: TypeId,
    pub invariants: Vec<ExprId>,
    pub span: Span,
}

/// Function or method declaration.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FunctionDecl {
    pub name: Name,
    pub kind: FunctionKind,
    pub params: Vec<Param>,
    /// Declared return type; `TypeId::VOID` for none.
    pub ret: TypeId,
    /// Declared throws type; `TypeId::VOID` for none.
    pub throws: TypeId,
    pub requires: Vec<ExprId>,
    pub ensures: Vec<ExprId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

/// Whether a callable is a pure function or a method (message receiver).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FunctionKind {
    Function,
    Method,
}

/// A declared parameter.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Param {
    pub name: Name,
    pub ty: TypeId,
}

impl FunctionDecl {
    /// True if the function declares a return type.
    pub fn has_return(&self) -> bool {
        !self.ret.is_void()
    }
}
