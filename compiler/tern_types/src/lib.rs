//! Type system for the Tern compiler.
//!
//! Types live in a unified [`Pool`] and are referenced by
//! [`TypeId`] (re-exported from the IR crate): 32-bit indices with O(1)
//! equality after canonicalization. The [`subtype`] module decides
//! inclusion by reduction to intersection emptiness over signed type
//! pairs; [`effective`] answers the structural-shape queries the resolver
//! and code generator dispatch on.

pub mod effective;
pub mod subtype;

mod flags;
mod item;
mod nominal;
mod pool;
mod tag;

pub use flags::TypeFlags;
pub use item::Item;
pub use nominal::{NoNominals, NominalResolver, NominalTable, ResolveError};
pub use pool::Pool;
pub use tag::Tag;

// The canonical type handle is defined next to the AST so nodes can carry
// it without depending on this crate.
pub use tern_ir::TypeId;

pub use subtype::{is_coercive_subtype, is_subtype, is_supertype, SubtypeQuery};
