//! Human-readable rendering of bytecode.
//!
//! Two forms: a plain `Display` that renders interned names as `n<idx>`,
//! and [`CodeBlock::display`] which resolves names through an interner.
//! Golden tests assert against these renderings, so the format is stable.

use std::fmt;

use crate::{Name, StringInterner};

use super::{BinArith, Cmp, CodeBlock, Insn, LabelId, LvalStep, Reg, UnArith, Value};

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("%_")
        } else {
            write!(f, "%{}", self.raw())
        }
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.raw())
    }
}

impl fmt::Debug for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cmp::Eq => "EQ",
            Cmp::Neq => "NEQ",
            Cmp::Lt => "LT",
            Cmp::LtEq => "LTEQ",
            Cmp::Gt => "GT",
            Cmp::GtEq => "GTEQ",
            Cmp::ElemOf => "IN",
            Cmp::Subset => "SUBSET",
            Cmp::SubsetEq => "SUBSETEQ",
        };
        f.write_str(s)
    }
}

impl fmt::Display for BinArith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinArith::Add => "ADD",
            BinArith::Sub => "SUB",
            BinArith::Mul => "MUL",
            BinArith::Div => "DIV",
            BinArith::Rem => "REM",
            BinArith::Union => "UNION",
            BinArith::Intersect => "INTERSECT",
            BinArith::Difference => "DIFFERENCE",
            BinArith::ListAppend => "LISTAPPEND",
            BinArith::StrAppend => "APPEND",
            BinArith::StrAppendLeft => "LEFT_APPEND",
            BinArith::StrAppendRight => "RIGHT_APPEND",
        };
        f.write_str(s)
    }
}

impl fmt::Display for UnArith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnArith::Neg => "NEG",
            UnArith::Numerator => "NUMERATOR",
            UnArith::Denominator => "DENOMINATOR",
        };
        f.write_str(s)
    }
}

/// Renders a `Name` either raw (`n7`) or through an interner.
struct NameDisplay<'a> {
    name: Name,
    interner: Option<&'a StringInterner>,
}

impl fmt::Display for NameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interner {
            Some(interner) => f.write_str(interner.resolve(self.name)),
            None => write!(f, "n{}", self.name.raw()),
        }
    }
}

struct ValueDisplay<'a> {
    value: &'a Value,
    interner: Option<&'a StringInterner>,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Byte(b) => write!(f, "{b}b"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Str(name) => write!(
                f,
                "\"{}\"",
                NameDisplay {
                    name: *name,
                    interner: self.interner
                }
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            ValueDisplay {
                value: self,
                interner: None
            }
        )
    }
}

/// One instruction, optionally resolving names.
pub struct InsnDisplay<'a> {
    insn: &'a Insn,
    interner: Option<&'a StringInterner>,
}

impl Insn {
    /// Render with names resolved through `interner`.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> InsnDisplay<'a> {
        InsnDisplay {
            insn: self,
            interner: Some(interner),
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            InsnDisplay {
                insn: self,
                interner: None
            }
        )
    }
}

impl fmt::Display for InsnDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |n: Name| NameDisplay {
            name: n,
            interner: self.interner,
        };
        fn value<'x>(v: &'x Value, interner: Option<&'x StringInterner>) -> ValueDisplay<'x> {
            ValueDisplay { value: v, interner }
        }
        match self.insn {
            Insn::Const { target, value: v } => {
                write!(f, "Const {target}, {}", value(v, self.interner))
            }
            Insn::Assign { ty, target, src } => write!(f, "Assign {ty} {target}, {src}"),
            Insn::BinArithOp {
                ty,
                kind,
                target,
                left,
                right,
            } => write!(f, "BinArithOp {kind} {ty} {target}, {left}, {right}"),
            Insn::UnArithOp {
                ty,
                kind,
                target,
                operand,
            } => write!(f, "UnArithOp {kind} {ty} {target}, {operand}"),
            Insn::Invert {
                ty,
                target,
                operand,
            } => write!(f, "Invert {ty} {target}, {operand}"),
            Insn::LengthOf { ty, target, src } => write!(f, "LengthOf {ty} {target}, {src}"),
            Insn::IndexOf {
                ty,
                target,
                src,
                index,
            } => write!(f, "IndexOf {ty} {target}, {src}[{index}]"),
            Insn::SubList {
                ty,
                target,
                src,
                start,
                end,
            } => write!(f, "SubList {ty} {target}, {src}[{start}..{end}]"),
            Insn::SubString {
                target,
                src,
                start,
                end,
            } => write!(f, "SubString {target}, {src}[{start}..{end}]"),
            Insn::FieldLoad {
                ty,
                target,
                src,
                field,
            } => write!(f, "FieldLoad {ty} {target}, {src}.{}", name(*field)),
            Insn::TupleLoad {
                ty,
                target,
                src,
                index,
            } => write!(f, "TupleLoad {ty} {target}, {src}.{index}"),
            Insn::NewRecord {
                ty,
                target,
                operands,
            } => write!(f, "NewRecord {ty} {target}, {}", regs(operands)),
            Insn::NewTuple {
                ty,
                target,
                operands,
            } => write!(f, "NewTuple {ty} {target}, {}", regs(operands)),
            Insn::NewList {
                ty,
                target,
                operands,
            } => write!(f, "NewList {ty} {target}, {}", regs(operands)),
            Insn::NewSet {
                ty,
                target,
                operands,
            } => write!(f, "NewSet {ty} {target}, {}", regs(operands)),
            Insn::NewMap {
                ty,
                target,
                operands,
            } => write!(f, "NewMap {ty} {target}, {}", regs(operands)),
            Insn::NewObject {
                ty,
                target,
                operand,
            } => write!(f, "NewObject {ty} {target}, {operand}"),
            Insn::Dereference {
                ty,
                target,
                operand,
            } => write!(f, "Dereference {ty} {target}, {operand}"),
            Insn::Convert {
                from,
                to,
                target,
                operand,
            } => write!(f, "Convert {from}=>{to} {target}, {operand}"),
            Insn::If {
                ty,
                left,
                right,
                cmp,
                target,
            } => write!(f, "If {ty} {left}, {right}, {cmp} goto {target}"),
            Insn::IfIs {
                ty,
                operand,
                test,
                target,
            } => write!(f, "IfIs {ty} {operand}, {test} goto {target}"),
            Insn::Switch {
                ty,
                operand,
                default,
                branches,
            } => {
                write!(f, "Switch {ty} {operand}, default {default}")?;
                for (v, l) in branches {
                    write!(f, ", {} -> {l}", value(v, self.interner))?;
                }
                Ok(())
            }
            Insn::Goto(l) => write!(f, "Goto {l}"),
            Insn::Label(l) => write!(f, "Label {l}"),
            Insn::Loop { head, modified } => write!(f, "Loop {head}, {}", regs(modified)),
            Insn::LoopEnd(l) => write!(f, "LoopEnd {l}"),
            Insn::ForAll {
                ty,
                src,
                var,
                modified,
                head,
            } => write!(f, "ForAll {ty} {src} -> {var}, {}, {head}", regs(modified)),
            Insn::TryCatch { exc, end, catches } => {
                write!(f, "TryCatch {exc}, end {end}")?;
                for (t, l) in catches {
                    write!(f, ", {t} -> {l}")?;
                }
                Ok(())
            }
            Insn::TryEnd(l) => write!(f, "TryEnd {l}"),
            Insn::Invoke {
                ty,
                target,
                operands,
                name: n,
            } => write!(f, "Invoke {ty} {target} = {}{}", name(*n), regs(operands)),
            Insn::IndirectInvoke {
                ty,
                target,
                src,
                operands,
            } => write!(f, "IndirectInvoke {ty} {target} = {src}{}", regs(operands)),
            Insn::Lambda {
                ty,
                target,
                operands,
                name: n,
            } => write!(f, "Lambda {ty} {target} = &{}{}", name(*n), regs(operands)),
            Insn::Assert {
                ty,
                left,
                right,
                cmp,
                message,
            } => write!(f, "Assert {ty} {left}, {right}, {cmp} \"{message}\""),
            Insn::Update {
                ty,
                target,
                path,
                value: v,
            } => {
                write!(f, "Update {ty} {target}")?;
                for step in path {
                    match step {
                        LvalStep::Field(field) => write!(f, ".{}", name(*field))?,
                        LvalStep::Index(r) => write!(f, "[{r}]")?,
                        LvalStep::Deref => write!(f, ".*")?,
                    }
                }
                write!(f, " <- {v}")
            }
            Insn::Throw { ty, operand } => write!(f, "Throw {ty} {operand}"),
            Insn::Debug { operand } => write!(f, "Debug {operand}"),
            Insn::Return(Some((ty, operand))) => write!(f, "Return {ty} {operand}"),
            Insn::Return(None) => f.write_str("Return"),
            Insn::Nop => f.write_str("Nop"),
        }
    }
}

/// Render an operand list as `(%0, %1)`.
fn regs(rs: &super::Regs) -> String {
    let mut out = String::from("(");
    for (i, r) in rs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&r.to_string());
    }
    out.push(')');
    out
}

/// A whole block, one instruction per line.
pub struct CodeBlockDisplay<'a> {
    block: &'a CodeBlock,
    interner: Option<&'a StringInterner>,
}

impl CodeBlock {
    /// Render with names resolved through `interner`.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> CodeBlockDisplay<'a> {
        CodeBlockDisplay {
            block: self,
            interner: Some(interner),
        }
    }
}

impl fmt::Display for CodeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            CodeBlockDisplay {
                block: self,
                interner: None
            }
        )
    }
}

impl fmt::Display for CodeBlockDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.block.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match self.interner {
                Some(interner) => write!(f, "{}", entry.insn.display(interner))?,
                None => write!(f, "{}", entry.insn)?,
            }
        }
        Ok(())
    }
}
