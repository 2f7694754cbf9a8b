//! Statement nodes.

use std::fmt;

use super::{ExprId, PatternId, StmtId};
use crate::{Name, Span, Spanned, TypeId};

/// Statement node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Spanned for Stmt {
    fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Debug for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {:?}", self.kind, self.span)
    }
}

/// Statement variants.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum StmtKind {
    /// Variable declaration `T pat [= init]`.
    VarDecl {
        pattern: PatternId,
        ty: TypeId,
        init: Option<ExprId>,
    },

    /// Assignment `lval = rval`. The lval is an expression restricted to
    /// variables, tuple/rational destructuring forms, and field/index paths.
    Assign { lval: ExprId, rval: ExprId },

    /// Runtime-checked assertion.
    Assert { cond: ExprId },

    /// Assumption; checked at runtime like `assert`, but flagged for
    /// downstream verification to take as given.
    Assume { cond: ExprId },

    /// Return, with an operand iff the function declares a return type.
    Return(Option<ExprId>),

    /// Print a string to the debug channel.
    Debug(ExprId),

    /// Two-armed conditional; `else_body` may be empty.
    IfElse {
        cond: ExprId,
        then_body: Vec<StmtId>,
        else_body: Vec<StmtId>,
    },

    /// Switch over constant cases.
    Switch {
        operand: ExprId,
        cases: Vec<SwitchCase>,
    },

    /// Try-catch with typed catch clauses.
    TryCatch {
        body: Vec<StmtId>,
        catches: Vec<CatchClause>,
    },

    /// Break out of the nearest enclosing loop.
    Break,

    /// Throw an exception value.
    Throw(ExprId),

    /// Pre-tested loop.
    While { cond: ExprId, body: Vec<StmtId> },

    /// Post-tested loop.
    DoWhile { body: Vec<StmtId>, cond: ExprId },

    /// Iteration over a collection source.
    ForAll {
        binding: ForBinding,
        source: ExprId,
        body: Vec<StmtId>,
    },

    /// No-op.
    Skip,

    /// Expression evaluated for effect (invocation or allocation).
    Expr(ExprId),
}

/// One `case`/`default` arm of a switch.
///
/// `values` holds the case constants; empty together with `is_default`
/// marks the default arm.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SwitchCase {
    pub values: Vec<ExprId>,
    pub body: Vec<StmtId>,
    pub is_default: bool,
}

/// One catch clause of a try-catch.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CatchClause {
    pub ty: TypeId,
    pub var: Name,
    pub body: Vec<StmtId>,
}

/// Variables bound by a for-all statement.
///
/// Key/value destructuring is supported over map sources only.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ForBinding {
    Single(Name),
    KeyValue(Name, Name),
}
