//! Operator kinds shared by the AST and the resolver.

use std::fmt;

/// Binary operators as they appear in source.
///
/// `Add` is overloaded: the resolver rewrites it into arithmetic, list
/// append, string append or set union based on operand types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Set operators
    Union,
    Intersect,
    Difference,

    // Comparisons
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    ElemOf,
    Subset,
    SubsetEq,

    // Short-circuit logic
    And,
    Or,

    // Type test: `x is T` (rhs is a type-value expression)
    Is,
}

impl BinaryOp {
    /// True for operators whose result type is `bool`.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::ElemOf
                | BinaryOp::Subset
                | BinaryOp::SubsetEq
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Is
        )
    }

    /// True for the comparison subset (lowers to an `If` branch).
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::ElemOf
                | BinaryOp::Subset
                | BinaryOp::SubsetEq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Union => "|",
            BinaryOp::Intersect => "&",
            BinaryOp::Difference => "\\",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::ElemOf => "in",
            BinaryOp::Subset => "⊂",
            BinaryOp::SubsetEq => "⊆",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Is => "is",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    /// Arithmetic negation `-e`.
    Neg,
    /// Logical negation `!e`.
    Not,
    /// Bitwise inversion `~e` (bytes).
    Invert,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Invert => "~",
        };
        f.write_str(s)
    }
}
