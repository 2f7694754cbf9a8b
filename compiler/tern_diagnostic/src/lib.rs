//! Diagnostic values for the Tern compiler.
//!
//! Language-level mistakes and internal failures travel the same
//! `Result<_, Diagnostic>` channel; the [`ErrorCode`] range tells them
//! apart. Rendering (colors, source excerpts) is the host's concern —
//! error pretty-printing is out of scope for the core.

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;

/// Convenient alias used by the resolver and generator.
pub type DiagResult<T> = Result<T, Diagnostic>;
