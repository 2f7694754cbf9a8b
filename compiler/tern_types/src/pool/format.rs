//! Type rendering for diagnostics and tests.

use std::fmt::Write;

use tern_ir::{StringInterner, TypeId};

use super::Pool;
use crate::Tag;

impl Pool {
    /// Render a type as source-like text, resolving names through the
    /// interner.
    ///
    /// Nominal types render as their name without expansion, which keeps
    /// rendering total on recursive type graphs.
    pub fn format(&self, idx: TypeId, interner: &StringInterner) -> String {
        let mut out = String::new();
        self.format_into(idx, interner, &mut out);
        out
    }

    fn format_into(&self, idx: TypeId, interner: &StringInterner, out: &mut String) {
        if let Some(name) = idx.primitive_name() {
            out.push_str(name);
            return;
        }
        match self.tag(idx) {
            Tag::List => {
                out.push('[');
                self.format_into(self.element(idx), interner, out);
                out.push(']');
            }
            Tag::Set => {
                out.push('{');
                self.format_into(self.element(idx), interner, out);
                out.push('}');
            }
            Tag::Reference => {
                out.push('&');
                self.format_child(self.element(idx), interner, out);
            }
            Tag::Meta => {
                out.push_str("type(");
                self.format_into(self.element(idx), interner, out);
                out.push(')');
            }
            Tag::Negation => {
                out.push('!');
                self.format_child(self.element(idx), interner, out);
            }
            Tag::Nominal => out.push_str(interner.resolve(self.nominal_name(idx))),
            Tag::Map => {
                out.push('{');
                self.format_into(self.map_key(idx), interner, out);
                out.push_str("=>");
                self.format_into(self.map_value(idx), interner, out);
                out.push('}');
            }
            Tag::Tuple => {
                out.push('(');
                for (i, child) in self.children(idx).into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.format_into(child, interner, out);
                }
                out.push(')');
            }
            Tag::Record => {
                out.push('{');
                for (i, (name, ty)) in self.record_fields(idx).into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.format_into(ty, interner, out);
                    out.push(' ');
                    out.push_str(interner.resolve(name));
                }
                if self.record_is_open(idx) {
                    if self.record_field_count(idx) > 0 {
                        out.push_str(", ");
                    }
                    out.push_str("...");
                }
                out.push('}');
            }
            Tag::Function | Tag::Method => {
                if self.tag(idx) == Tag::Method {
                    out.push_str("::");
                }
                out.push('(');
                for (i, p) in self.callable_params(idx).into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.format_into(p, interner, out);
                }
                out.push_str(")=>");
                self.format_into(self.callable_return(idx), interner, out);
                let throws = self.callable_throws(idx);
                if !throws.is_void() {
                    out.push_str(" throws ");
                    self.format_into(throws, interner, out);
                }
            }
            Tag::Union => {
                for (i, child) in self.children(idx).into_iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    self.format_child(child, interner, out);
                }
            }
            Tag::Intersection => {
                for (i, child) in self.children(idx).into_iter().enumerate() {
                    if i > 0 {
                        out.push('&');
                    }
                    self.format_child(child, interner, out);
                }
            }
            // Primitives were handled via primitive_name above.
            tag => {
                let _ = write!(out, "<{tag:?}>");
            }
        }
    }

    /// Like `format_into`, parenthesizing connectives so nesting stays
    /// readable.
    fn format_child(&self, idx: TypeId, interner: &StringInterner, out: &mut String) {
        if self.tag(idx).is_connective() && self.tag(idx) != Tag::Negation {
            out.push('(');
            self.format_into(idx, interner, out);
            out.push(')');
        } else {
            self.format_into(idx, interner, out);
        }
    }
}
