use pretty_assertions::assert_eq;
use rustc_hash::FxHashSet;

use tern_ir::ast::{
    AstArena, BinaryOp, Decl, ExprId, ExprKind, FunctionDecl, FunctionKind, Module, Param,
    PatternKind, StmtId, StmtKind, SwitchCase, UnaryOp,
};
use tern_ir::{
    CodeBlock, Insn, IrModule, LabelId, Name, SourceId, Span, StringInterner, TypeId, Value,
};
use tern_resolve::{ModuleEnv, Resolver};
use tern_types::Pool;

use crate::{Generator, RuntimeChecks};

struct Fixture {
    pool: Pool,
    module_env: ModuleEnv,
    interner: StringInterner,
    module: Module,
}

impl Fixture {
    fn new() -> Self {
        let interner = StringInterner::new();
        let name = interner.intern("test");
        Fixture {
            pool: Pool::new(),
            module_env: ModuleEnv::new(),
            interner,
            module: Module::new(name, SourceId(0)),
        }
    }

    fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn expr(&mut self, kind: ExprKind) -> ExprId {
        self.module.arena.alloc_expr(kind, Span::DUMMY)
    }

    fn var(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Variable(name))
    }

    fn int(&mut self, v: i64) -> ExprId {
        self.expr(ExprKind::Constant(Value::Int(v)))
    }

    fn stmt(&mut self, kind: StmtKind) -> StmtId {
        self.module.arena.alloc_stmt(kind, Span::DUMMY)
    }

    fn add_function(
        &mut self,
        name: &str,
        params: Vec<(&str, TypeId)>,
        ret: TypeId,
        body: Vec<StmtId>,
    ) {
        self.add_function_with_contracts(name, params, ret, vec![], vec![], body);
    }

    fn add_function_with_contracts(
        &mut self,
        name: &str,
        params: Vec<(&str, TypeId)>,
        ret: TypeId,
        requires: Vec<ExprId>,
        ensures: Vec<ExprId>,
        body: Vec<StmtId>,
    ) {
        let fname = self.name(name);
        let params: Vec<Param> = params
            .into_iter()
            .map(|(n, ty)| Param {
                name: self.name(n),
                ty,
            })
            .collect();
        let param_types: Vec<TypeId> = params.iter().map(|p| p.ty).collect();
        let sig = self.pool.function(&param_types, ret, TypeId::VOID);
        self.module_env.declare_function(
            fname,
            tern_resolve::FunctionInfo {
                ty: sig,
                has_precondition: !requires.is_empty(),
                has_postcondition: !ensures.is_empty(),
            },
        );
        self.module.decls.push(Decl::Function(FunctionDecl {
            name: fname,
            kind: FunctionKind::Function,
            params,
            ret,
            throws: TypeId::VOID,
            requires,
            ensures,
            body,
            span: Span::DUMMY,
        }));
    }

    /// Resolve and generate the whole module.
    fn compile(&mut self) -> IrModule {
        let mut resolver = Resolver::new(&mut self.pool, &self.module_env, &self.interner);
        resolver.resolve_module(&mut self.module).expect("resolve");
        let mut generator = Generator::new(&mut self.pool, &self.module_env, &self.interner);
        generator.generate_module(&mut self.module).expect("generate")
    }

    fn compile_one(&mut self, name: &str) -> CodeBlock {
        let fname = self.name(name);
        let module = self.compile();
        module.decl(fname).expect("declaration").body.clone()
    }
}

fn render(block: &CodeBlock) -> Vec<String> {
    block.iter().map(|e| e.insn.to_string()).collect()
}

/// Every branch target must name a label defined in the block.
fn assert_labels_well_formed(block: &CodeBlock) {
    let mut defined: FxHashSet<LabelId> = FxHashSet::default();
    for entry in block.iter() {
        match &entry.insn {
            Insn::Label(l) | Insn::TryEnd(l) => {
                defined.insert(*l);
            }
            Insn::Loop { head, .. } | Insn::LoopEnd(head) => {
                defined.insert(*head);
            }
            Insn::ForAll { head, .. } => {
                defined.insert(*head);
            }
            _ => {}
        }
    }
    for entry in block.iter() {
        entry.insn.map_labels(|l| {
            assert!(defined.contains(&l), "undefined label {l} in {}", block);
            l
        });
    }
}

/// Linear-order register discipline: every read register was written (or
/// is a parameter) earlier in the block.
fn assert_registers_defined(block: &CodeBlock, num_params: u32) {
    let mut written: FxHashSet<u32> = (0..num_params).collect();
    for entry in block.iter() {
        let defined = entry.insn.defined_reg();
        entry.insn.for_each_reg(|r| {
            if Some(r) != defined && !r.is_null() {
                assert!(
                    written.contains(&r.raw()),
                    "register {r} read before write in {}",
                    block
                );
            }
        });
        if let Some(r) = defined {
            written.insert(r.raw());
        }
    }
}

// === Scenarios ===

#[test]
fn s1_declaration_with_initializer() {
    // int v = x + 1
    let mut f = Fixture::new();
    let v = f.name("v");
    let x = f.var("x");
    let one = f.int(1);
    let add = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        left: x,
        right: one,
    });
    let pattern = f
        .module
        .arena
        .alloc_pattern(PatternKind::Leaf(Some(v)), Span::DUMMY);
    let decl = f.stmt(StmtKind::VarDecl {
        pattern,
        ty: TypeId::INT,
        init: Some(add),
    });
    f.add_function("f", vec![("x", TypeId::INT)], TypeId::VOID, vec![decl]);

    let block = f.compile_one("f");
    assert_eq!(
        render(&block),
        vec![
            "Assign int %1, %0",
            "Const %2, 1",
            "BinArithOp ADD int %3, %1, %2",
            "Assign int %4, %3",
            "Return",
        ]
    );
    assert_registers_defined(&block, 1);
}

#[test]
fn s2_indexed_assignment_uses_update() {
    // xs[i+1] = 1  with i@0, xs@1
    let mut f = Fixture::new();
    let list_int = f.pool.list(TypeId::INT);

    let xs = f.var("xs");
    let i = f.var("i");
    let one = f.int(1);
    let idx = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        left: i,
        right: one,
    });
    let lval = f.expr(ExprKind::Index { src: xs, index: idx });
    let rhs = f.int(1);
    let assign = f.stmt(StmtKind::Assign { lval, rval: rhs });
    f.add_function(
        "f",
        vec![("i", TypeId::INT), ("xs", list_int)],
        TypeId::VOID,
        vec![assign],
    );

    let block = f.compile_one("f");
    assert_eq!(
        render(&block),
        vec![
            "Const %2, 1",
            "Assign int %3, %0",
            "Const %4, 1",
            "BinArithOp ADD int %5, %3, %4",
            "Update t32 %1[%5] <- %2",
            "Return",
        ]
    );
    assert_labels_well_formed(&block);
}

#[test]
fn s3_if_else_with_short_circuit_disjunction() {
    // if x<y || x==y: x=y else: x=-y
    let mut f = Fixture::new();
    let x1 = f.var("x");
    let y1 = f.var("y");
    let lt = f.expr(ExprKind::Binary {
        op: BinaryOp::Lt,
        left: x1,
        right: y1,
    });
    let x2 = f.var("x");
    let y2 = f.var("y");
    let eq = f.expr(ExprKind::Binary {
        op: BinaryOp::Eq,
        left: x2,
        right: y2,
    });
    let cond = f.expr(ExprKind::Binary {
        op: BinaryOp::Or,
        left: lt,
        right: eq,
    });

    let then_lhs = f.var("x");
    let then_rhs = f.var("y");
    let then_assign = f.stmt(StmtKind::Assign {
        lval: then_lhs,
        rval: then_rhs,
    });
    let else_lhs = f.var("x");
    let else_y = f.var("y");
    let neg = f.expr(ExprKind::Unary {
        op: UnaryOp::Neg,
        operand: else_y,
    });
    let else_assign = f.stmt(StmtKind::Assign {
        lval: else_lhs,
        rval: neg,
    });
    let if_stmt = f.stmt(StmtKind::IfElse {
        cond,
        then_body: vec![then_assign],
        else_body: vec![else_assign],
    });
    f.add_function(
        "f",
        vec![("x", TypeId::INT), ("y", TypeId::INT)],
        TypeId::VOID,
        vec![if_stmt],
    );

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);
    assert_registers_defined(&block, 2);

    // Short-circuit: two conditional branches, one arithmetic negation.
    let branches = block
        .iter()
        .filter(|e| matches!(e.insn, Insn::If { .. }))
        .count();
    assert_eq!(branches, 2);
    let negs = block
        .iter()
        .filter(|e| {
            matches!(
                e.insn,
                Insn::UnArithOp {
                    kind: tern_ir::UnArith::Neg,
                    ..
                }
            )
        })
        .count();
    assert_eq!(negs, 1);
}

#[test]
fn s4_while_loop_shape() {
    // while x < 10: x = x+1
    let mut f = Fixture::new();
    let cx = f.var("x");
    let ten = f.int(10);
    let cond = f.expr(ExprKind::Binary {
        op: BinaryOp::Lt,
        left: cx,
        right: ten,
    });
    let lhs = f.var("x");
    let bx = f.var("x");
    let one = f.int(1);
    let add = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        left: bx,
        right: one,
    });
    let assign = f.stmt(StmtKind::Assign {
        lval: lhs,
        rval: add,
    });
    let while_stmt = f.stmt(StmtKind::While {
        cond,
        body: vec![assign],
    });
    f.add_function("f", vec![("x", TypeId::INT)], TypeId::VOID, vec![while_stmt]);

    let block = f.compile_one("f");
    assert_eq!(
        render(&block),
        vec![
            "Loop L0, ()",
            "Assign int %1, %0",
            "Const %2, 10",
            "If int %1, %2, GTEQ goto L1",
            "Assign int %3, %0",
            "Const %4, 1",
            "BinArithOp ADD int %5, %3, %4",
            "Assign int %0, %5",
            "Nop",
            "LoopEnd L0",
            "Label L1",
            "Return",
        ]
    );
}

#[test]
fn s5_switch_dispatch_sits_before_first_body() {
    // switch x+1: case 0,1: skip; case 2: skip; default: skip
    let mut f = Fixture::new();
    let x = f.var("x");
    let one = f.int(1);
    let operand = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        left: x,
        right: one,
    });
    let c0 = f.int(0);
    let c1 = f.int(1);
    let c2 = f.int(2);
    let body_a = f.stmt(StmtKind::Skip);
    let body_b = f.stmt(StmtKind::Skip);
    let body_c = f.stmt(StmtKind::Skip);
    let sw = f.stmt(StmtKind::Switch {
        operand,
        cases: vec![
            SwitchCase {
                values: vec![c0, c1],
                body: vec![body_a],
                is_default: false,
            },
            SwitchCase {
                values: vec![c2],
                body: vec![body_b],
                is_default: false,
            },
            SwitchCase {
                values: vec![],
                body: vec![body_c],
                is_default: true,
            },
        ],
    });
    f.add_function("f", vec![("x", TypeId::INT)], TypeId::VOID, vec![sw]);

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);

    // Find the dispatch and check it directly precedes the first body
    // label, with both 0 and 1 mapped to the same label.
    let switch_at = block
        .iter()
        .position(|e| matches!(e.insn, Insn::Switch { .. }))
        .expect("switch instruction");
    let Insn::Switch {
        default, branches, ..
    } = &block.entry(switch_at).insn
    else {
        unreachable!()
    };
    assert_eq!(branches.len(), 3);
    assert_eq!(branches[0].1, branches[1].1, "0 and 1 share a body label");
    assert_ne!(branches[2].1, branches[0].1);
    assert_ne!(*default, branches[0].1);
    assert!(
        matches!(block.entry(switch_at + 1).insn, Insn::Label(l) if l == branches[0].1),
        "dispatch must sit immediately before the first case body"
    );
}

#[test]
fn s6_return_uses_declared_type() {
    // return i * 2 with declared return type int
    let mut f = Fixture::new();
    let i = f.var("i");
    let two = f.int(2);
    let mul = f.expr(ExprKind::Binary {
        op: BinaryOp::Mul,
        left: i,
        right: two,
    });
    let ret = f.stmt(StmtKind::Return(Some(mul)));
    f.add_function("f", vec![("i", TypeId::INT)], TypeId::INT, vec![ret]);

    let block = f.compile_one("f");
    assert_eq!(
        render(&block),
        vec![
            "Assign int %1, %0",
            "Const %2, 2",
            "BinArithOp MUL int %3, %1, %2",
            "Return int %3",
            "Return",
        ]
    );
}

// === Structural properties ===

#[test]
fn double_inversion_restores_branch_shape() {
    let mut f = Fixture::new();
    let mut arena = AstArena::new();
    let x = arena.alloc_expr(ExprKind::Variable(f.name("x")), Span::DUMMY);
    arena.set_expr_type(x, TypeId::INT);
    let ten = arena.alloc_expr(ExprKind::Constant(Value::Int(10)), Span::DUMMY);
    arena.set_expr_type(ten, TypeId::INT);
    let cond = arena.alloc_expr(
        ExprKind::Binary {
            op: BinaryOp::Lt,
            left: x,
            right: ten,
        },
        Span::DUMMY,
    );
    arena.set_expr_type(cond, TypeId::BOOL);

    let mut generator = Generator::new(&mut f.pool, &f.module_env, &f.interner);
    let once = generator.invert(&mut arena, cond);
    let twice = generator.invert(&mut arena, once);
    assert_eq!(
        arena.expr(twice).kind,
        ExprKind::Binary {
            op: BinaryOp::Lt,
            left: x,
            right: ten,
        }
    );
}

#[test]
fn do_while_emits_condition_after_body() {
    let mut f = Fixture::new();
    let cx = f.var("x");
    let ten = f.int(10);
    let cond = f.expr(ExprKind::Binary {
        op: BinaryOp::Lt,
        left: cx,
        right: ten,
    });
    let body = f.stmt(StmtKind::Skip);
    let dw = f.stmt(StmtKind::DoWhile {
        body: vec![body],
        cond,
    });
    f.add_function("f", vec![("x", TypeId::INT)], TypeId::VOID, vec![dw]);

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);
    let loop_at = block
        .iter()
        .position(|e| matches!(e.insn, Insn::Loop { .. }))
        .expect("loop");
    let if_at = block
        .iter()
        .position(|e| matches!(e.insn, Insn::If { .. }))
        .expect("branch");
    let nop_at = block
        .iter()
        .position(|e| matches!(e.insn, Insn::Nop))
        .expect("nop");
    // Loop, then body (Nop from skip is emitted by the body itself), and
    // the branch comes after the body, before the LoopEnd.
    assert!(loop_at < nop_at && nop_at < if_at);
}

#[test]
fn break_jumps_to_nearest_loop_exit() {
    let mut f = Fixture::new();
    let t = f.expr(ExprKind::Constant(Value::Bool(true)));
    let brk = f.stmt(StmtKind::Break);
    let loop_stmt = f.stmt(StmtKind::While {
        cond: t,
        body: vec![brk],
    });
    f.add_function("f", vec![], TypeId::VOID, vec![loop_stmt]);

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);
    // The break's Goto targets the loop's exit label (declared by the
    // trailing Label).
    let gotos: Vec<LabelId> = block
        .iter()
        .filter_map(|e| match e.insn {
            Insn::Goto(l) => Some(l),
            _ => None,
        })
        .collect();
    let exit = block
        .iter()
        .rev()
        .find_map(|e| match e.insn {
            Insn::Label(l) => Some(l),
            _ => None,
        })
        .expect("exit label");
    assert!(gotos.contains(&exit));
}

#[test]
fn try_catch_layout() {
    let mut f = Fixture::new();
    let e1 = f.name("e");
    let body = f.stmt(StmtKind::Skip);
    let catch_body = f.stmt(StmtKind::Skip);
    let catch2_body = f.stmt(StmtKind::Skip);
    let tc = f.stmt(StmtKind::TryCatch {
        body: vec![body],
        catches: vec![
            tern_ir::ast::CatchClause {
                ty: TypeId::INT,
                var: e1,
                body: vec![catch_body],
            },
            tern_ir::ast::CatchClause {
                ty: TypeId::STRING,
                var: e1,
                body: vec![catch2_body],
            },
        ],
    });
    f.add_function("f", vec![], TypeId::VOID, vec![tc]);

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);

    // TryCatch dispatch first, and the first handler is introduced by
    // the TryEnd marker carrying the same label.
    let Insn::TryCatch { end, catches, .. } = &block.entry(0).insn else {
        panic!("expected TryCatch first, got {}", block.entry(0).insn);
    };
    assert_eq!(catches.len(), 2);
    assert_eq!(catches[0].1, *end);
    let try_end_at = block
        .iter()
        .position(|e| matches!(e.insn, Insn::TryEnd(l) if l == *end))
        .expect("TryEnd marker");
    assert!(try_end_at > 0);
}

#[test]
fn for_all_over_map_destructures_entry_tuple() {
    let mut f = Fixture::new();
    let m = f.name("m");
    let map_ty = f.pool.map(TypeId::STRING, TypeId::INT);
    let k = f.name("k");
    let v = f.name("v");

    let src = f.var("m");
    let body = f.stmt(StmtKind::Skip);
    let loop_stmt = f.stmt(StmtKind::ForAll {
        binding: tern_ir::ast::ForBinding::KeyValue(k, v),
        source: src,
        body: vec![body],
    });
    let m_str = "m";
    let _ = m;
    f.add_function("f", vec![(m_str, map_ty)], TypeId::VOID, vec![loop_stmt]);

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);
    let tuple_loads = block
        .iter()
        .filter(|e| matches!(e.insn, Insn::TupleLoad { .. }))
        .count();
    assert_eq!(tuple_loads, 2);
    assert!(block
        .iter()
        .any(|e| matches!(e.insn, Insn::ForAll { .. })));
}

#[test]
fn bool_binop_materializes_with_two_labels() {
    // bool b = x < 10
    let mut f = Fixture::new();
    let b = f.name("b");
    let x = f.var("x");
    let ten = f.int(10);
    let cmp = f.expr(ExprKind::Binary {
        op: BinaryOp::Lt,
        left: x,
        right: ten,
    });
    let pattern = f
        .module
        .arena
        .alloc_pattern(PatternKind::Leaf(Some(b)), Span::DUMMY);
    let decl = f.stmt(StmtKind::VarDecl {
        pattern,
        ty: TypeId::BOOL,
        init: Some(cmp),
    });
    f.add_function("f", vec![("x", TypeId::INT)], TypeId::VOID, vec![decl]);

    let block = f.compile_one("f");
    assert_labels_well_formed(&block);
    assert_registers_defined(&block, 1);

    // false arm, goto exit, true arm: two Const bools writing the same
    // register.
    let consts: Vec<(tern_ir::Reg, bool)> = block
        .iter()
        .filter_map(|e| match &e.insn {
            Insn::Const {
                target,
                value: Value::Bool(v),
            } => Some((*target, *v)),
            _ => None,
        })
        .collect();
    assert_eq!(consts.len(), 2);
    assert_eq!(consts[0].0, consts[1].0);
    assert!(!consts[0].1 && consts[1].1);
}

#[test]
fn lambda_lifts_captures_into_parameters() {
    // int k = ...; f = (int n) => n + k
    let mut f = Fixture::new();
    let k = f.name("k");
    let n = f.name("n");
    let fn_ty = f.pool.function(&[TypeId::INT], TypeId::INT, TypeId::VOID);

    let k_pattern = f
        .module
        .arena
        .alloc_pattern(PatternKind::Leaf(Some(k)), Span::DUMMY);
    let seven = f.int(7);
    let k_decl = f.stmt(StmtKind::VarDecl {
        pattern: k_pattern,
        ty: TypeId::INT,
        init: Some(seven),
    });

    let body_n = f.var("n");
    let body_k = f.var("k");
    let body = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        left: body_n,
        right: body_k,
    });
    let lambda = f.expr(ExprKind::Lambda {
        params: vec![Param {
            name: n,
            ty: TypeId::INT,
        }],
        body,
    });
    let l_name = f.name("l");
    let l_pattern = f
        .module
        .arena
        .alloc_pattern(PatternKind::Leaf(Some(l_name)), Span::DUMMY);
    let l_decl = f.stmt(StmtKind::VarDecl {
        pattern: l_pattern,
        ty: fn_ty,
        init: Some(lambda),
    });
    f.add_function("f", vec![], TypeId::VOID, vec![k_decl, l_decl]);

    let module = f.compile();

    // The synthesized function takes the explicit parameter plus the
    // capture.
    let synthesized = module
        .decls
        .iter()
        .find(|d| f.interner.resolve(d.name).starts_with("lambda$"))
        .expect("synthesized lambda");
    assert_eq!(synthesized.num_params(), 2);

    // The closure instruction marks the explicit slot with the null
    // register and binds the capture's register.
    let host = module.decl(f.name("f")).expect("host function");
    let lambda_insn = host
        .body
        .iter()
        .find_map(|e| match &e.insn {
            Insn::Lambda { operands, .. } => Some(operands.clone()),
            _ => None,
        })
        .expect("lambda instruction");
    assert_eq!(lambda_insn.len(), 2);
    assert!(lambda_insn[0].is_null());
    assert!(!lambda_insn[1].is_null());
}

// === Runtime checks ===

#[test]
fn bounds_checks_precede_list_indexing() {
    let mut f = Fixture::new();
    let list_int = f.pool.list(TypeId::INT);
    let xs = f.var("xs");
    let i = f.var("i");
    let access = f.expr(ExprKind::Index { src: xs, index: i });
    let ret = f.stmt(StmtKind::Return(Some(access)));
    f.add_function(
        "f",
        vec![("xs", list_int), ("i", TypeId::INT)],
        TypeId::INT,
        vec![ret],
    );

    let module = f.compile();
    let mut checks = RuntimeChecks::new(&module, &mut f.pool, &f.module_env.nominals);
    let transformed = checks.transform_module();
    let body = &transformed.decl(f.name("f")).expect("f").body;

    let index_at = body
        .iter()
        .position(|e| matches!(e.insn, Insn::IndexOf { .. }))
        .expect("IndexOf");
    assert!(index_at >= 4, "expected checks before IndexOf:\n{body}");
    assert!(matches!(
        &body.entry(index_at - 4).insn,
        Insn::Const { value: Value::Int(0), .. }
    ));
    assert!(matches!(
        &body.entry(index_at - 3).insn,
        Insn::Assert { cmp: tern_ir::Cmp::GtEq, .. }
    ));
    assert!(matches!(
        &body.entry(index_at - 2).insn,
        Insn::LengthOf { .. }
    ));
    assert!(matches!(
        &body.entry(index_at - 1).insn,
        Insn::Assert { cmp: tern_ir::Cmp::Lt, .. }
    ));
}

#[test]
fn division_gains_nonzero_assert() {
    let mut f = Fixture::new();
    let x = f.var("x");
    let y = f.var("y");
    let div = f.expr(ExprKind::Binary {
        op: BinaryOp::Div,
        left: x,
        right: y,
    });
    let ret = f.stmt(StmtKind::Return(Some(div)));
    f.add_function(
        "f",
        vec![("x", TypeId::INT), ("y", TypeId::INT)],
        TypeId::INT,
        vec![ret],
    );

    let module = f.compile();
    let mut checks = RuntimeChecks::new(&module, &mut f.pool, &f.module_env.nominals);
    let transformed = checks.transform_module();
    let body = &transformed.decl(f.name("f")).expect("f").body;

    let div_at = body
        .iter()
        .position(|e| matches!(e.insn, Insn::BinArithOp { kind: tern_ir::BinArith::Div, .. }))
        .expect("div");
    let Insn::Assert { cmp, message, .. } = &body.entry(div_at - 1).insn else {
        panic!("expected assert before div:\n{body}");
    };
    assert_eq!(*cmp, tern_ir::Cmp::Neq);
    assert_eq!(message, "division by zero");
}

#[test]
fn precondition_splices_with_renamed_registers() {
    let mut f = Fixture::new();

    // callee: f(x) requires x > 0
    let rx = f.var("x");
    let zero = f.int(0);
    let requires = f.expr(ExprKind::Binary {
        op: BinaryOp::Gt,
        left: rx,
        right: zero,
    });
    let ret_x = f.var("x");
    let callee_ret = f.stmt(StmtKind::Return(Some(ret_x)));
    f.add_function_with_contracts(
        "callee",
        vec![("x", TypeId::INT)],
        TypeId::INT,
        vec![requires],
        vec![],
        vec![callee_ret],
    );

    // caller: return callee(a)
    let callee_name = f.name("callee");
    let a = f.var("a");
    let call = f.expr(ExprKind::Invoke {
        receiver: None,
        name: callee_name,
        args: vec![a],
    });
    let caller_ret = f.stmt(StmtKind::Return(Some(call)));
    f.add_function("caller", vec![("a", TypeId::INT)], TypeId::INT, vec![caller_ret]);

    let module = f.compile();
    let mut checks = RuntimeChecks::new(&module, &mut f.pool, &f.module_env.nominals);
    let transformed = checks.transform_module();
    let body = &transformed.decl(f.name("caller")).expect("caller").body;

    let invoke_at = body
        .iter()
        .position(|e| matches!(e.insn, Insn::Invoke { .. }))
        .expect("invoke");
    let Insn::Invoke { operands, .. } = &body.entry(invoke_at).insn else {
        unreachable!()
    };
    let arg_reg = operands[0];

    // A GT assert against the caller's operand register precedes the
    // call; its message is the precondition failure.
    let assert_at = (0..invoke_at)
        .rev()
        .find(|&i| matches!(body.entry(i).insn, Insn::Assert { .. }))
        .expect("spliced precondition assert");
    let Insn::Assert {
        cmp,
        message,
        left,
        ..
    } = &body.entry(assert_at).insn
    else {
        unreachable!()
    };
    assert_eq!(*cmp, tern_ir::Cmp::Gt);
    assert_eq!(message, "precondition not satisfied");
    // The precondition's formal register was renamed: the assert's
    // operand chain roots at the caller's argument register.
    let Insn::Assign { src, .. } = &body.entry(assert_at - 2).insn else {
        panic!("expected renamed parameter copy:\n{body}");
    };
    assert_eq!(*src, arg_reg);
    let _ = left;
}

#[test]
fn postcondition_splices_against_parameter_shadows() {
    let mut f = Fixture::new();

    // f(x) ensures $ >= x { return x }
    let dollar = f.expr(ExprKind::Variable(f.interner.intern("$")));
    let px = f.var("x");
    let ensures = f.expr(ExprKind::Binary {
        op: BinaryOp::GtEq,
        left: dollar,
        right: px,
    });
    let rx = f.var("x");
    let ret = f.stmt(StmtKind::Return(Some(rx)));
    f.add_function_with_contracts(
        "f",
        vec![("x", TypeId::INT)],
        TypeId::INT,
        vec![],
        vec![ensures],
        vec![ret],
    );

    let module = f.compile();
    let mut checks = RuntimeChecks::new(&module, &mut f.pool, &f.module_env.nominals);
    let transformed = checks.transform_module();
    let body = &transformed.decl(f.name("f")).expect("f").body;

    // Entry saves the parameter into a shadow register.
    let Insn::Assign { src, target, .. } = &body.entry(0).insn else {
        panic!("expected shadow save at entry:\n{body}");
    };
    assert_eq!(src.raw(), 0);
    let shadow = *target;
    assert!(shadow.raw() > 0);

    // The postcondition assert lands before the value return.
    let return_at = body
        .iter()
        .position(|e| matches!(e.insn, Insn::Return(Some(_))))
        .expect("value return");
    let assert_before_return = (0..return_at)
        .rev()
        .find(|&i| matches!(body.entry(i).insn, Insn::Assert { .. }))
        .expect("postcondition assert");
    let Insn::Assert { message, .. } = &body.entry(assert_before_return).insn else {
        unreachable!()
    };
    assert_eq!(message, "postcondition not satisfied");

    // The spliced block reads the shadow, not the live parameter.
    let reads_shadow = (0..return_at).any(|i| {
        let mut found = false;
        body.entry(i).insn.for_each_reg(|r| {
            if r == shadow {
                found = true;
            }
        });
        found && !matches!(body.entry(i).insn, Insn::Assign { target, .. } if target == shadow)
    });
    assert!(reads_shadow, "postcondition must use the parameter shadow:\n{body}");
}
