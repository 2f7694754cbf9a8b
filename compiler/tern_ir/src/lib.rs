//! Shared IR types for the Tern compiler.
//!
//! This crate owns everything the pipeline stages exchange:
//! - source attribution ([`Span`], [`SourceId`]);
//! - interned identifiers ([`Name`], [`StringInterner`]);
//! - the canonical type handle ([`TypeId`]) — the pool itself lives in the
//!   types crate;
//! - the AST ([`ast`]) consumed and annotated by the resolver;
//! - the register bytecode ([`bytecode`]) produced by code generation.

pub mod ast;
pub mod bytecode;
mod interner;
mod name;
mod span;
mod type_id;

pub use interner::{InternError, StringInterner};
pub use name::Name;
pub use span::{SourceId, Span, Spanned};
pub use type_id::TypeId;

// Flat re-exports of the bytecode vocabulary; these names are used
// pervasively by the generator and its tests.
pub use bytecode::{
    BinArith, Cmp, CodeBlock, Entry, Insn, IrDeclKind, IrDeclaration, IrModule, LabelId, LvalStep,
    Reg, Regs, UnArith, Value,
};
