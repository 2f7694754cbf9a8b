//! Runtime check insertion.
//!
//! A pure rewriting pass over generated bytecode: for each instruction it
//! may prepend a small check sequence before the original instruction.
//!
//! - `Invoke` of a callee with a precondition splices the callee's
//!   precondition block, renaming its formal parameter registers onto the
//!   caller's operand registers.
//! - `IndexOf` over a list or string gains two bounds assertions.
//! - `BinArithOp DIV` gains a divisor-nonzero assertion.
//! - `Return` in a function with a postcondition splices the
//!   postcondition block against parameter shadows saved at entry.

use rustc_hash::FxHashMap;
use tern_ir::{
    BinArith, Cmp, CodeBlock, Insn, IrDeclaration, IrModule, LabelId, Reg, Span, Value,
};
use tern_types::effective;
use tern_types::{NominalResolver, Pool, Tag, TypeId};

/// The runtime-assertion rewriter for one module.
pub struct RuntimeChecks<'a> {
    module: &'a IrModule,
    pool: &'a mut Pool,
    nominals: &'a dyn NominalResolver,
}

impl<'a> RuntimeChecks<'a> {
    pub fn new(
        module: &'a IrModule,
        pool: &'a mut Pool,
        nominals: &'a dyn NominalResolver,
    ) -> Self {
        RuntimeChecks {
            module,
            pool,
            nominals,
        }
    }

    /// Rewrite every declaration of a module.
    pub fn transform_module(&mut self) -> IrModule {
        let module = self.module;
        let mut out = IrModule::new(module.name);
        for decl in &module.decls {
            out.decls.push(self.transform(decl));
        }
        out
    }

    /// Rewrite one declaration, splicing checks into its body.
    pub fn transform(&mut self, decl: &IrDeclaration) -> IrDeclaration {
        tracing::trace!(name = ?decl.name, "inserting runtime checks");
        let mut next_reg = decl
            .body
            .max_register()
            .map_or(0, |r| r.raw() + 1)
            .max(decl.num_params());
        let mut next_label = decl.body.max_label().map_or(0, |l| l.raw() + 1);

        let mut out = CodeBlock::new();

        // Parameter shadows for postcondition evaluation: saved into
        // fresh registers at entry, before anything can overwrite them.
        let num_params = decl.num_params();
        let mut shadows: Vec<Reg> = Vec::new();
        if decl.postcondition.is_some() {
            for i in 0..num_params {
                let param = Reg::from_raw(i);
                let shadow = Reg::from_raw(next_reg);
                next_reg += 1;
                let ty = self.param_type(decl, i);
                out.push(
                    Insn::Assign {
                        ty,
                        target: shadow,
                        src: param,
                    },
                    Span::DUMMY,
                );
                shadows.push(shadow);
            }
        }

        for entry in decl.body.iter() {
            match &entry.insn {
                Insn::Invoke { name, operands, .. } => {
                    if let Some(callee) = self.module.decl(*name) {
                        if let Some(pre) = callee.precondition.clone() {
                            self.splice(
                                &mut out,
                                &pre,
                                operands.as_slice(),
                                callee.num_params(),
                                &mut next_reg,
                                &mut next_label,
                                entry.span,
                            );
                        }
                    }
                }

                Insn::IndexOf { ty, index, src, .. } => {
                    if self.is_sequence(*ty) {
                        self.emit_bounds_checks(
                            &mut out,
                            *ty,
                            *src,
                            *index,
                            &mut next_reg,
                            entry.span,
                        );
                    }
                }

                Insn::BinArithOp {
                    ty,
                    kind: BinArith::Div,
                    right,
                    ..
                } => {
                    let zero_reg = Reg::from_raw(next_reg);
                    next_reg += 1;
                    let zero = if self.pool.tag(*ty) == Tag::Real {
                        Value::real(0.0)
                    } else {
                        Value::Int(0)
                    };
                    out.push(
                        Insn::Const {
                            target: zero_reg,
                            value: zero,
                        },
                        entry.span,
                    );
                    out.push(
                        Insn::Assert {
                            ty: *ty,
                            left: *right,
                            right: zero_reg,
                            cmp: Cmp::Neq,
                            message: "division by zero".to_owned(),
                        },
                        entry.span,
                    );
                }

                Insn::Return(Some((_, value))) => {
                    if let Some(post) = decl.postcondition.clone() {
                        // Bindings: parameters map to their shadows, the
                        // return slot to the returned register.
                        let mut bindings: Vec<Reg> = shadows.clone();
                        bindings.push(*value);
                        self.splice(
                            &mut out,
                            &post,
                            &bindings,
                            num_params + 1,
                            &mut next_reg,
                            &mut next_label,
                            entry.span,
                        );
                    }
                }

                _ => {}
            }
            out.push(entry.insn.clone(), entry.span);
        }

        IrDeclaration {
            name: decl.name,
            ty: decl.ty,
            kind: decl.kind.clone(),
            body: out,
            precondition: decl.precondition.clone(),
            postcondition: decl.postcondition.clone(),
            span: decl.span,
        }
    }

    /// Splice a contract block into `out`: registers `0..bound` rename
    /// onto `bindings`, temporaries shift past the host frame, labels
    /// renumber into the host's label space.
    #[allow(clippy::too_many_arguments)]
    fn splice(
        &mut self,
        out: &mut CodeBlock,
        block: &CodeBlock,
        bindings: &[Reg],
        bound: u32,
        next_reg: &mut u32,
        next_label: &mut u32,
        span: Span,
    ) {
        debug_assert_eq!(bindings.len() as u32, bound);

        // Temporaries keep their relative spacing beyond the host frame.
        let temp_base = *next_reg;
        let mut max_temp: Option<u32> = None;
        let label_base = *next_label;
        let mut label_map: FxHashMap<LabelId, LabelId> = FxHashMap::default();
        let mut used_labels = 0u32;

        for entry in block.iter() {
            let renamed = entry.insn.map_regs(|r| {
                if r.raw() < bound {
                    bindings[r.raw() as usize]
                } else {
                    let offset = r.raw() - bound;
                    max_temp = Some(max_temp.map_or(offset, |m| m.max(offset)));
                    Reg::from_raw(temp_base + offset)
                }
            });
            let relabeled = renamed.map_labels(|l| {
                *label_map.entry(l).or_insert_with(|| {
                    let mapped = LabelId::from_raw(label_base + used_labels);
                    used_labels += 1;
                    mapped
                })
            });
            out.push(relabeled, span);
        }

        if let Some(max) = max_temp {
            *next_reg = temp_base + max + 1;
        }
        *next_label = label_base + used_labels;
    }

    fn emit_bounds_checks(
        &mut self,
        out: &mut CodeBlock,
        ty: TypeId,
        src: Reg,
        index: Reg,
        next_reg: &mut u32,
        span: Span,
    ) {
        let zero = Reg::from_raw(*next_reg);
        *next_reg += 1;
        out.push(
            Insn::Const {
                target: zero,
                value: Value::Int(0),
            },
            span,
        );
        out.push(
            Insn::Assert {
                ty: TypeId::INT,
                left: index,
                right: zero,
                cmp: Cmp::GtEq,
                message: "index out of bounds (negative)".to_owned(),
            },
            span,
        );
        let length = Reg::from_raw(*next_reg);
        *next_reg += 1;
        out.push(
            Insn::LengthOf {
                ty,
                target: length,
                src,
            },
            span,
        );
        out.push(
            Insn::Assert {
                ty: TypeId::INT,
                left: index,
                right: length,
                cmp: Cmp::Lt,
                message: "index out of bounds (not less than length)".to_owned(),
            },
            span,
        );
    }

    /// True for list and string sources; map lookups are not bounds
    /// checked.
    fn is_sequence(&mut self, ty: TypeId) -> bool {
        effective::is_string(self.pool, self.nominals, ty)
            || effective::as_list(self.pool, self.nominals, ty).is_some()
    }

    fn param_type(&self, decl: &IrDeclaration, i: u32) -> TypeId {
        if self.pool.tag(decl.ty).is_callable() {
            self.pool.callable_param(decl.ty, i as usize)
        } else {
            TypeId::NONE
        }
    }
}
