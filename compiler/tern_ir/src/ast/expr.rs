//! Expression nodes.
//!
//! Abstract variants (`Index`, `SubRange`, `Length`, `Invoke`) are produced
//! by the host and rewritten in place by the resolver into the concrete
//! variants that code generation consumes (`ListAccess`, `SubString`,
//! `MapLength`, `FunctionCall`, ...).

use std::fmt;
use std::hash::{Hash, Hasher};

use super::{ExprId, Param};
use crate::{Name, Span, Spanned, TypeId, Value};

/// Expression node.
#[derive(Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Resolved type, filled by the resolver. `TypeId::NONE` until then.
    pub ty: TypeId,
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} : {} @ {:?}", self.kind, self.ty, self.span)
    }
}

/// Expression variants. Children are arena ids, not boxes.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ExprKind {
    /// Literal constant.
    Constant(Value),

    /// Local variable reference.
    Variable(Name),

    /// Module constant reference, produced by name resolution.
    ConstantRef(Name),

    /// Module/package reference, produced when an identifier resolves to
    /// neither a variable nor a declaration but names a known module.
    ModuleRef(Name),

    /// Unary operation.
    Unary {
        op: super::UnaryOp,
        operand: ExprId,
    },

    /// Binary operation.
    Binary {
        op: super::BinaryOp,
        left: ExprId,
        right: ExprId,
    },

    /// Record literal `{f: e, g: e}`.
    RecordLit(Vec<(Name, ExprId)>),

    /// Tuple literal `(e, e)`.
    TupleLit(Vec<ExprId>),

    /// List literal `[e, e]`.
    ListLit(Vec<ExprId>),

    /// Set literal `{e, e}`.
    SetLit(Vec<ExprId>),

    /// Map literal `{k=>v, ...}`.
    MapLit(Vec<(ExprId, ExprId)>),

    /// Field access `e.f`.
    FieldAccess {
        src: ExprId,
        field: Name,
    },

    /// Abstract indexing `e[i]`; resolver picks the concrete variant.
    Index {
        src: ExprId,
        index: ExprId,
    },
    ListAccess {
        src: ExprId,
        index: ExprId,
    },
    StringAccess {
        src: ExprId,
        index: ExprId,
    },
    MapAccess {
        src: ExprId,
        key: ExprId,
    },

    /// Abstract subrange `e[a..b]`; resolver picks list or string.
    SubRange {
        src: ExprId,
        start: ExprId,
        end: ExprId,
    },
    SubList {
        src: ExprId,
        start: ExprId,
        end: ExprId,
    },
    SubString {
        src: ExprId,
        start: ExprId,
        end: ExprId,
    },

    /// Abstract length `|e|`; resolver picks the concrete variant.
    Length(ExprId),
    ListLength(ExprId),
    StringLength(ExprId),
    SetLength(ExprId),
    MapLength(ExprId),

    /// Cast `(T) e`.
    Cast {
        ty: TypeId,
        operand: ExprId,
    },

    /// Allocation `new e`, producing a reference.
    New(ExprId),

    /// Dereference `*e`.
    Dereference(ExprId),

    /// Function reference `&f`.
    FunctionRef(Name),

    /// Abstract invocation `name(args)` or `recv.name(args)`; the resolver
    /// rewrites it into `FunctionCall`, `MethodSend` or `IndirectCall`.
    Invoke {
        receiver: Option<ExprId>,
        name: Name,
        args: Vec<ExprId>,
    },

    /// Direct call of a module function.
    FunctionCall {
        name: Name,
        args: Vec<ExprId>,
    },

    /// Message send to a method.
    MethodSend {
        receiver: ExprId,
        name: Name,
        args: Vec<ExprId>,
    },

    /// Indirect call through a function-typed value.
    IndirectCall {
        src: ExprId,
        args: Vec<ExprId>,
    },

    /// Lambda literal.
    Lambda {
        params: Vec<Param>,
        body: ExprId,
    },

    /// Comprehension: boolean quantifiers and list/set builders.
    Comprehension {
        kind: ComprehensionKind,
        sources: Vec<CompSource>,
        condition: Option<ExprId>,
        /// Yielded value for list/set comprehensions; `None` for quantifiers.
        value: Option<ExprId>,
    },

    /// A type used as a value, e.g. the rhs of `is`.
    TypeValue(TypeId),
}

/// Comprehension flavors.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ComprehensionKind {
    /// `some { ... | cond }` — true if any binding satisfies the condition.
    Some,
    /// `none { ... | cond }` — true if no binding satisfies the condition.
    None,
    /// `all { ... | cond }` — true if every binding satisfies the condition.
    All,
    /// `[ e | ... ]` — list builder.
    List,
    /// `{ e | ... }` — set builder.
    Set,
}

impl ComprehensionKind {
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            ComprehensionKind::Some | ComprehensionKind::None | ComprehensionKind::All
        )
    }
}

/// One generator clause `x in e` (or `(k,v) in e` over a map).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CompSource {
    pub binding: CompBinding,
    pub source: ExprId,
}

/// Variables bound by a generator clause.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CompBinding {
    /// Bind each element.
    Single(Name),
    /// Bind key and value of each map entry. Only valid over map sources.
    KeyValue(Name, Name),
}

// `Expr` hashes through kind and span only; the resolved-type slot is
// derived state.
impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.span.hash(state);
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.span == other.span
    }
}

impl Eq for Expr {}
