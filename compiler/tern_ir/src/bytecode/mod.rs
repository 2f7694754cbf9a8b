//! Register bytecode.
//!
//! The code generator lowers each declaration into a [`CodeBlock`]: a flat
//! sequence of [`Insn`]s over monotonically allocated registers, with
//! structured control flow expressed as labelled goto graphs. Blocks are
//! in-memory values; no on-disk format exists here.

mod display;

pub use display::{CodeBlockDisplay, InsnDisplay};

use smallvec::SmallVec;

use crate::{Name, Span, TypeId};

/// Short operand list; most instructions have at most four operands.
pub type Regs = SmallVec<[Reg; 4]>;

/// A register slot in a code block.
///
/// Registers are allocated monotonically and never reused once allocated.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Reg(u32);

impl Reg {
    /// Sentinel for "discard the result".
    pub const NULL: Reg = Reg(u32::MAX);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Reg(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

/// A branch target within one code block.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct LabelId(u32);

impl LabelId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        LabelId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Constant values carried by `Const` instructions and switch cases.
///
/// Reals are stored as `f64` bits so `Value` keeps `Eq + Hash` for
/// switch-case deduplication.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(u8),
    Int(i64),
    Real(u64),
    Char(char),
    Str(Name),
}

impl Value {
    /// Build a real constant from an `f64`.
    pub fn real(v: f64) -> Self {
        Value::Real(v.to_bits())
    }

    /// Recover the `f64` of a real constant.
    ///
    /// # Panics
    /// Panics on non-real values.
    pub fn as_real(&self) -> f64 {
        match self {
            Value::Real(bits) => f64::from_bits(*bits),
            other => panic!("not a real constant: {other:?}"),
        }
    }

    /// The primitive type of this constant.
    pub fn type_of(&self) -> TypeId {
        match self {
            Value::Null => TypeId::NULL,
            Value::Bool(_) => TypeId::BOOL,
            Value::Byte(_) => TypeId::BYTE,
            Value::Int(_) => TypeId::INT,
            Value::Real(_) => TypeId::REAL,
            Value::Char(_) => TypeId::CHAR,
            Value::Str(_) => TypeId::STRING,
        }
    }
}

/// Comparison operators for `If` and `Assert`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Cmp {
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    ElemOf,
    Subset,
    SubsetEq,
}

impl Cmp {
    /// The comparison with inverted truth value.
    pub fn inverted(self) -> Cmp {
        match self {
            Cmp::Eq => Cmp::Neq,
            Cmp::Neq => Cmp::Eq,
            Cmp::Lt => Cmp::GtEq,
            Cmp::LtEq => Cmp::Gt,
            Cmp::Gt => Cmp::LtEq,
            Cmp::GtEq => Cmp::Lt,
            // Collection predicates have no single-op inverse; callers
            // route through the two-label scheme instead.
            Cmp::ElemOf | Cmp::Subset | Cmp::SubsetEq => self,
        }
    }

    /// True if `inverted` yields a genuine inverse.
    pub fn has_inverse(self) -> bool {
        !matches!(self, Cmp::ElemOf | Cmp::Subset | Cmp::SubsetEq)
    }
}

/// Binary operations on registers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinArith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Set union.
    Union,
    /// Set intersection.
    Intersect,
    /// Set difference.
    Difference,
    /// List concatenation.
    ListAppend,
    /// String ++ string.
    StrAppend,
    /// Char ++ string.
    StrAppendLeft,
    /// String ++ char.
    StrAppendRight,
}

/// Unary arithmetic operations.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnArith {
    Neg,
    /// Numerator of a real value.
    Numerator,
    /// Denominator of a real value.
    Denominator,
}

/// One step of a deep-update path (`x.f[i].g = e`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum LvalStep {
    Field(Name),
    Index(Reg),
    Deref,
}

/// Bytecode instructions.
///
/// `ty` fields record the resolved type the operand registers carry at
/// this instruction, as produced by the resolver.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Insn {
    Const {
        target: Reg,
        value: Value,
    },
    Assign {
        ty: TypeId,
        target: Reg,
        src: Reg,
    },
    BinArithOp {
        ty: TypeId,
        kind: BinArith,
        target: Reg,
        left: Reg,
        right: Reg,
    },
    UnArithOp {
        ty: TypeId,
        kind: UnArith,
        target: Reg,
        operand: Reg,
    },
    /// Bitwise inversion of a byte.
    Invert {
        ty: TypeId,
        target: Reg,
        operand: Reg,
    },
    LengthOf {
        ty: TypeId,
        target: Reg,
        src: Reg,
    },
    IndexOf {
        ty: TypeId,
        target: Reg,
        src: Reg,
        index: Reg,
    },
    SubList {
        ty: TypeId,
        target: Reg,
        src: Reg,
        start: Reg,
        end: Reg,
    },
    SubString {
        target: Reg,
        src: Reg,
        start: Reg,
        end: Reg,
    },
    FieldLoad {
        ty: TypeId,
        target: Reg,
        src: Reg,
        field: Name,
    },
    TupleLoad {
        ty: TypeId,
        target: Reg,
        src: Reg,
        index: u32,
    },
    NewRecord {
        ty: TypeId,
        target: Reg,
        operands: Regs,
    },
    NewTuple {
        ty: TypeId,
        target: Reg,
        operands: Regs,
    },
    NewList {
        ty: TypeId,
        target: Reg,
        operands: Regs,
    },
    NewSet {
        ty: TypeId,
        target: Reg,
        operands: Regs,
    },
    /// Operands alternate key, value, key, value, ...
    NewMap {
        ty: TypeId,
        target: Reg,
        operands: Regs,
    },
    NewObject {
        ty: TypeId,
        target: Reg,
        operand: Reg,
    },
    Dereference {
        ty: TypeId,
        target: Reg,
        operand: Reg,
    },
    Convert {
        from: TypeId,
        to: TypeId,
        target: Reg,
        operand: Reg,
    },
    /// Conditional branch: transfer to `target` iff `left cmp right`.
    If {
        ty: TypeId,
        left: Reg,
        right: Reg,
        cmp: Cmp,
        target: LabelId,
    },
    /// Type-test branch: transfer to `target` iff the operand is a `test`.
    IfIs {
        ty: TypeId,
        operand: Reg,
        test: TypeId,
        target: LabelId,
    },
    Switch {
        ty: TypeId,
        operand: Reg,
        default: LabelId,
        branches: Vec<(Value, LabelId)>,
    },
    Goto(LabelId),
    Label(LabelId),
    /// Loop header; the body extends to the matching `LoopEnd`.
    Loop {
        head: LabelId,
        modified: Regs,
    },
    LoopEnd(LabelId),
    /// Iterate `src`, placing each element in `var`.
    ForAll {
        ty: TypeId,
        src: Reg,
        var: Reg,
        modified: Regs,
        head: LabelId,
    },
    /// Exception dispatch for the following try region.
    TryCatch {
        exc: Reg,
        end: LabelId,
        catches: Vec<(TypeId, LabelId)>,
    },
    /// Marks the end of the try region started by the `TryCatch` with the
    /// same label.
    TryEnd(LabelId),
    Invoke {
        ty: TypeId,
        target: Reg,
        operands: Regs,
        name: Name,
    },
    IndirectInvoke {
        ty: TypeId,
        target: Reg,
        src: Reg,
        operands: Regs,
    },
    /// Construct a closure over `name` with the given bound operands;
    /// `Reg::NULL` operand positions are supplied at call time.
    Lambda {
        ty: TypeId,
        target: Reg,
        operands: Regs,
        name: Name,
    },
    Assert {
        ty: TypeId,
        left: Reg,
        right: Reg,
        cmp: Cmp,
        message: String,
    },
    /// Deep path assignment on a base register.
    Update {
        ty: TypeId,
        target: Reg,
        path: Vec<LvalStep>,
        value: Reg,
    },
    Throw {
        ty: TypeId,
        operand: Reg,
    },
    Debug {
        operand: Reg,
    },
    /// `Some((ty, reg))` returns a value; `None` is a bare return.
    Return(Option<(TypeId, Reg)>),
    Nop,
}

impl Insn {
    /// The register this instruction writes, if any.
    pub fn defined_reg(&self) -> Option<Reg> {
        let target = match self {
            Insn::Const { target, .. }
            | Insn::Assign { target, .. }
            | Insn::BinArithOp { target, .. }
            | Insn::UnArithOp { target, .. }
            | Insn::Invert { target, .. }
            | Insn::LengthOf { target, .. }
            | Insn::IndexOf { target, .. }
            | Insn::SubList { target, .. }
            | Insn::SubString { target, .. }
            | Insn::FieldLoad { target, .. }
            | Insn::TupleLoad { target, .. }
            | Insn::NewRecord { target, .. }
            | Insn::NewTuple { target, .. }
            | Insn::NewList { target, .. }
            | Insn::NewSet { target, .. }
            | Insn::NewMap { target, .. }
            | Insn::NewObject { target, .. }
            | Insn::Dereference { target, .. }
            | Insn::Convert { target, .. }
            | Insn::Invoke { target, .. }
            | Insn::IndirectInvoke { target, .. }
            | Insn::Lambda { target, .. } => *target,
            Insn::ForAll { var, .. } => *var,
            Insn::TryCatch { exc, .. } => *exc,
            _ => return None,
        };
        (!target.is_null()).then_some(target)
    }

    /// Visit every register mentioned by this instruction.
    pub fn for_each_reg(&self, mut f: impl FnMut(Reg)) {
        self.map_regs(|r| {
            f(r);
            r
        });
    }

    /// True for instructions after which control does not fall through.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Insn::Goto(_) | Insn::Return(_) | Insn::Throw { .. })
    }

    /// Rewrite every register through `f`. The `Reg::NULL` sentinel is
    /// passed through untouched.
    #[must_use]
    pub fn map_regs(&self, mut f: impl FnMut(Reg) -> Reg) -> Insn {
        let mut g = move |r: Reg| if r.is_null() { r } else { f(r) };
        let mut map_list = |rs: &Regs, g: &mut dyn FnMut(Reg) -> Reg| -> Regs {
            rs.iter().map(|&r| g(r)).collect()
        };
        match self {
            Insn::Const { target, value } => Insn::Const {
                target: g(*target),
                value: value.clone(),
            },
            Insn::Assign { ty, target, src } => Insn::Assign {
                ty: *ty,
                target: g(*target),
                src: g(*src),
            },
            Insn::BinArithOp {
                ty,
                kind,
                target,
                left,
                right,
            } => Insn::BinArithOp {
                ty: *ty,
                kind: *kind,
                target: g(*target),
                left: g(*left),
                right: g(*right),
            },
            Insn::UnArithOp {
                ty,
                kind,
                target,
                operand,
            } => Insn::UnArithOp {
                ty: *ty,
                kind: *kind,
                target: g(*target),
                operand: g(*operand),
            },
            Insn::Invert {
                ty,
                target,
                operand,
            } => Insn::Invert {
                ty: *ty,
                target: g(*target),
                operand: g(*operand),
            },
            Insn::LengthOf { ty, target, src } => Insn::LengthOf {
                ty: *ty,
                target: g(*target),
                src: g(*src),
            },
            Insn::IndexOf {
                ty,
                target,
                src,
                index,
            } => Insn::IndexOf {
                ty: *ty,
                target: g(*target),
                src: g(*src),
                index: g(*index),
            },
            Insn::SubList {
                ty,
                target,
                src,
                start,
                end,
            } => Insn::SubList {
                ty: *ty,
                target: g(*target),
                src: g(*src),
                start: g(*start),
                end: g(*end),
            },
            Insn::SubString {
                target,
                src,
                start,
                end,
            } => Insn::SubString {
                target: g(*target),
                src: g(*src),
                start: g(*start),
                end: g(*end),
            },
            Insn::FieldLoad {
                ty,
                target,
                src,
                field,
            } => Insn::FieldLoad {
                ty: *ty,
                target: g(*target),
                src: g(*src),
                field: *field,
            },
            Insn::TupleLoad {
                ty,
                target,
                src,
                index,
            } => Insn::TupleLoad {
                ty: *ty,
                target: g(*target),
                src: g(*src),
                index: *index,
            },
            Insn::NewRecord {
                ty,
                target,
                operands,
            } => Insn::NewRecord {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
            },
            Insn::NewTuple {
                ty,
                target,
                operands,
            } => Insn::NewTuple {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
            },
            Insn::NewList {
                ty,
                target,
                operands,
            } => Insn::NewList {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
            },
            Insn::NewSet {
                ty,
                target,
                operands,
            } => Insn::NewSet {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
            },
            Insn::NewMap {
                ty,
                target,
                operands,
            } => Insn::NewMap {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
            },
            Insn::NewObject {
                ty,
                target,
                operand,
            } => Insn::NewObject {
                ty: *ty,
                target: g(*target),
                operand: g(*operand),
            },
            Insn::Dereference {
                ty,
                target,
                operand,
            } => Insn::Dereference {
                ty: *ty,
                target: g(*target),
                operand: g(*operand),
            },
            Insn::Convert {
                from,
                to,
                target,
                operand,
            } => Insn::Convert {
                from: *from,
                to: *to,
                target: g(*target),
                operand: g(*operand),
            },
            Insn::If {
                ty,
                left,
                right,
                cmp,
                target,
            } => Insn::If {
                ty: *ty,
                left: g(*left),
                right: g(*right),
                cmp: *cmp,
                target: *target,
            },
            Insn::IfIs {
                ty,
                operand,
                test,
                target,
            } => Insn::IfIs {
                ty: *ty,
                operand: g(*operand),
                test: *test,
                target: *target,
            },
            Insn::Switch {
                ty,
                operand,
                default,
                branches,
            } => Insn::Switch {
                ty: *ty,
                operand: g(*operand),
                default: *default,
                branches: branches.clone(),
            },
            Insn::Goto(l) => Insn::Goto(*l),
            Insn::Label(l) => Insn::Label(*l),
            Insn::Loop { head, modified } => Insn::Loop {
                head: *head,
                modified: map_list(modified, &mut g),
            },
            Insn::LoopEnd(l) => Insn::LoopEnd(*l),
            Insn::ForAll {
                ty,
                src,
                var,
                modified,
                head,
            } => Insn::ForAll {
                ty: *ty,
                src: g(*src),
                var: g(*var),
                modified: map_list(modified, &mut g),
                head: *head,
            },
            Insn::TryCatch { exc, end, catches } => Insn::TryCatch {
                exc: g(*exc),
                end: *end,
                catches: catches.clone(),
            },
            Insn::TryEnd(l) => Insn::TryEnd(*l),
            Insn::Invoke {
                ty,
                target,
                operands,
                name,
            } => Insn::Invoke {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
                name: *name,
            },
            Insn::IndirectInvoke {
                ty,
                target,
                src,
                operands,
            } => Insn::IndirectInvoke {
                ty: *ty,
                target: g(*target),
                src: g(*src),
                operands: map_list(operands, &mut g),
            },
            Insn::Lambda {
                ty,
                target,
                operands,
                name,
            } => Insn::Lambda {
                ty: *ty,
                target: g(*target),
                operands: map_list(operands, &mut g),
                name: *name,
            },
            Insn::Assert {
                ty,
                left,
                right,
                cmp,
                message,
            } => Insn::Assert {
                ty: *ty,
                left: g(*left),
                right: g(*right),
                cmp: *cmp,
                message: message.clone(),
            },
            Insn::Update {
                ty,
                target,
                path,
                value,
            } => Insn::Update {
                ty: *ty,
                target: g(*target),
                path: path
                    .iter()
                    .map(|step| match step {
                        LvalStep::Field(name) => LvalStep::Field(*name),
                        LvalStep::Index(r) => LvalStep::Index(g(*r)),
                        LvalStep::Deref => LvalStep::Deref,
                    })
                    .collect(),
                value: g(*value),
            },
            Insn::Throw { ty, operand } => Insn::Throw {
                ty: *ty,
                operand: g(*operand),
            },
            Insn::Debug { operand } => Insn::Debug {
                operand: g(*operand),
            },
            Insn::Return(slot) => Insn::Return(slot.map(|(ty, r)| (ty, g(r)))),
            Insn::Nop => Insn::Nop,
        }
    }

    /// Rewrite every label through `f`.
    #[must_use]
    pub fn map_labels(&self, mut f: impl FnMut(LabelId) -> LabelId) -> Insn {
        match self {
            Insn::If {
                ty,
                left,
                right,
                cmp,
                target,
            } => Insn::If {
                ty: *ty,
                left: *left,
                right: *right,
                cmp: *cmp,
                target: f(*target),
            },
            Insn::IfIs {
                ty,
                operand,
                test,
                target,
            } => Insn::IfIs {
                ty: *ty,
                operand: *operand,
                test: *test,
                target: f(*target),
            },
            Insn::Switch {
                ty,
                operand,
                default,
                branches,
            } => Insn::Switch {
                ty: *ty,
                operand: *operand,
                default: f(*default),
                branches: branches.iter().map(|(v, l)| (v.clone(), f(*l))).collect(),
            },
            Insn::Goto(l) => Insn::Goto(f(*l)),
            Insn::Label(l) => Insn::Label(f(*l)),
            Insn::Loop { head, modified } => Insn::Loop {
                head: f(*head),
                modified: modified.clone(),
            },
            Insn::LoopEnd(l) => Insn::LoopEnd(f(*l)),
            Insn::ForAll {
                ty,
                src,
                var,
                modified,
                head,
            } => Insn::ForAll {
                ty: *ty,
                src: *src,
                var: *var,
                modified: modified.clone(),
                head: f(*head),
            },
            Insn::TryCatch { exc, end, catches } => Insn::TryCatch {
                exc: *exc,
                end: f(*end),
                catches: catches.iter().map(|&(t, l)| (t, f(l))).collect(),
            },
            Insn::TryEnd(l) => Insn::TryEnd(f(*l)),
            other => other.clone(),
        }
    }
}

/// One instruction plus its source attribution.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Entry {
    pub insn: Insn,
    pub span: Span,
}

/// A block of bytecode for one declaration.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct CodeBlock {
    entries: Vec<Entry>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction.
    pub fn push(&mut self, insn: Insn, span: Span) {
        self.entries.push(Entry { insn, span });
    }

    /// Splice an instruction at `index`, shifting later entries.
    ///
    /// Used for the reserve-then-insert dispatch pattern of switch and
    /// try-catch lowering.
    pub fn insert(&mut self, index: usize, insn: Insn, span: Span) {
        self.entries.insert(index, Entry { insn, span });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> &Entry {
        &self.entries[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Highest register mentioned anywhere in the block, if any.
    pub fn max_register(&self) -> Option<Reg> {
        let mut max: Option<Reg> = None;
        for entry in &self.entries {
            entry.insn.for_each_reg(|r| {
                if max.map_or(true, |m| r > m) {
                    max = Some(r);
                }
            });
        }
        max
    }

    /// Highest label allocated anywhere in the block, if any.
    pub fn max_label(&self) -> Option<LabelId> {
        let mut max: Option<LabelId> = None;
        for entry in &self.entries {
            entry.insn.map_labels(|l| {
                if max.map_or(true, |m| l > m) {
                    max = Some(l);
                }
                l
            });
        }
        max
    }
}

impl<'a> IntoIterator for &'a CodeBlock {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// What a compiled declaration is.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum IrDeclKind {
    Constant,
    TypeInvariant,
    Function { num_params: u32 },
    Method { num_params: u32 },
}

/// A compiled declaration: the body block plus contract blocks.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IrDeclaration {
    pub name: Name,
    /// Declared type: the function/method signature, the constant's type,
    /// or the invariant's underlying type.
    pub ty: TypeId,
    pub kind: IrDeclKind,
    pub body: CodeBlock,
    /// Compiled `requires` clauses; parameters at registers `0..n`.
    pub precondition: Option<CodeBlock>,
    /// Compiled `ensures` clauses; parameters at `0..n`, return slot at `n`.
    pub postcondition: Option<CodeBlock>,
    pub span: Span,
}

impl IrDeclaration {
    /// Parameter count for callables, 0 otherwise.
    pub fn num_params(&self) -> u32 {
        match self.kind {
            IrDeclKind::Function { num_params } | IrDeclKind::Method { num_params } => num_params,
            IrDeclKind::Constant | IrDeclKind::TypeInvariant => 0,
        }
    }
}

/// A compiled module: every declaration, including synthesized lambda
/// bodies appended by the generator.
#[derive(Clone, Default, Debug)]
pub struct IrModule {
    pub name: Name,
    pub decls: Vec<IrDeclaration>,
}

impl IrModule {
    pub fn new(name: Name) -> Self {
        IrModule {
            name,
            decls: Vec::new(),
        }
    }

    /// Find a declaration by name.
    pub fn decl(&self, name: Name) -> Option<&IrDeclaration> {
        self.decls.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests;
