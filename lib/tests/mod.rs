use crate::analysis::ai::{AbstractDomain, AbstractMemory, AccessPath, IndexKey, Interval};
use crate::analysis::{AnalysisOptions, AnalysisOptionsBuilder, AnalysisOutcome, Analyzer};
use crate::il::*;


fn local(name: &str) -> AccessPath {
    AccessPath::local(name)
}

fn program(functions: Vec<Function>) -> Program {
    let mut program = Program::new();
    for function in functions {
        program.add_function(function);
    }
    program
}

/// A function of one block, which returns the constant `value`.
fn constant_function(name: &str, value: i64) -> Function {
    let mut cfg = ControlFlowGraph::new();
    let entry = {
        let block = cfg.new_block().unwrap();
        block.ret(Some(expr_const(value)));
        block.index()
    };
    cfg.set_entry(entry).unwrap();
    Function::new(name, Vec::new(), cfg)
}

#[test]
fn access_path_equality() {
    let built = local("x").append_field("f").append_field("g");
    let mut separate = AccessPath::local("x").append_field("f");
    separate = separate.append_field("g");
    assert_eq!(built, separate);

    let first = local("x").append_field("f").append_array_access(IndexKey::Constant(0));
    let second = local("x").append_field("f").append_array_access(IndexKey::Constant(1));
    assert!(first.shares_prefix(&second));
    assert!(!local("x")
        .append_field("f")
        .shares_prefix(&local("y").append_field("f")));
}

#[test]
fn weak_update_invalidates_and_strong_update_is_exact() {
    let array = local("arr");
    let mut memory = AbstractMemory::new();
    memory.write_store_strong(array.append_array_access(IndexKey::Constant(0)), Interval::constant(5));
    memory.write_store_strong(array.append_array_access(IndexKey::Constant(1)), Interval::constant(7));

    memory.write_store_weak(
        array.append_array_access(IndexKey::Unknown),
        Interval::constant(9),
    );
    assert_eq!(memory.read_store(&array.append_array_access(IndexKey::Constant(0))), Interval::Top);
    assert_eq!(memory.read_store(&array.append_array_access(IndexKey::Constant(1))), Interval::Top);

    let field = local("x").append_field("f");
    memory.write_store_strong(field.clone(), Interval::constant(3));
    assert_eq!(memory.read_store(&field), Interval::constant(3));
}

/// i = 0; while i < 5 { i = i + 1 }; return i
#[test]
fn bounded_loop() {
    let mut cfg = ControlFlowGraph::new();
    let head = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("i"), expr_const(0));
        block.index()
    };
    let header = cfg.new_block().unwrap().index();
    let body = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("i"), Expression::add(expr_scalar("i"), expr_const(1)));
        block.index()
    };
    let exit = {
        let block = cfg.new_block().unwrap();
        block.ret(Some(expr_scalar("i")));
        block.index()
    };
    cfg.set_entry(head).unwrap();
    cfg.unconditional_edge(head, header).unwrap();
    cfg.conditional_branch(
        header,
        Expression::cmplts(expr_scalar("i"), expr_const(5)),
        body,
        exit,
    )
    .unwrap();
    cfg.unconditional_edge(body, header).unwrap();

    let program = program(vec![Function::new("count", Vec::new(), cfg)]);
    let analyzer = Analyzer::new(&program, AnalysisOptions::default());
    let analysis = analyzer.analyze_intraprocedural("count");
    assert!(analysis.outcome().is_ok());

    let states = analysis.states().unwrap();
    assert!(states.stable());
    assert_eq!(
        states.entry(body).unwrap().read_store(&local("i")),
        Interval::range(0, 4)
    );
    assert_eq!(
        states.entry(exit).unwrap().read_store(&local("i")),
        Interval::constant(5)
    );
    assert_eq!(
        analysis.result().summary().unwrap().return_value(),
        Interval::constant(5)
    );
}

/// if x < 10 { x = 1 } else { x = 20 }; return x
fn branch(initial: Option<i64>) -> (Function, usize, usize, usize) {
    let mut cfg = ControlFlowGraph::new();
    let head = {
        let block = cfg.new_block().unwrap();
        if let Some(initial) = initial {
            block.assign(scalar("x"), expr_const(initial));
        }
        block.index()
    };
    let then = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("x"), expr_const(1));
        block.index()
    };
    let otherwise = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("x"), expr_const(20));
        block.index()
    };
    let merge = {
        let block = cfg.new_block().unwrap();
        block.ret(Some(expr_scalar("x")));
        block.index()
    };
    cfg.set_entry(head).unwrap();
    cfg.conditional_branch(
        head,
        Expression::cmplts(expr_scalar("x"), expr_const(10)),
        then,
        otherwise,
    )
    .unwrap();
    cfg.unconditional_edge(then, merge).unwrap();
    cfg.unconditional_edge(otherwise, merge).unwrap();
    (
        Function::new("branch", vec![scalar("x")], cfg),
        then,
        otherwise,
        merge,
    )
}

#[test]
fn branch_narrowing() {
    let (function, then, otherwise, merge) = branch(None);
    let program = program(vec![function]);
    let analyzer = Analyzer::new(&program, AnalysisOptions::default());
    let analysis = analyzer.analyze_intraprocedural("branch");
    let states = analysis.states().unwrap();

    assert_eq!(
        states.entry(then).unwrap().read_store(&local("x")),
        Interval::at_most(9)
    );
    assert_eq!(
        states.entry(otherwise).unwrap().read_store(&local("x")),
        Interval::at_least(10)
    );
    assert_eq!(
        states.exit(then).unwrap().read_store(&local("x")),
        Interval::constant(1)
    );
    assert_eq!(
        states.entry(merge).unwrap().read_store(&local("x")),
        Interval::range(1, 20)
    );
}

#[test]
fn infeasible_branch_is_unreachable() {
    let (function, then, otherwise, merge) = branch(Some(15));
    let program = program(vec![function]);
    let analyzer = Analyzer::new(&program, AnalysisOptions::default());
    let analysis = analyzer.analyze_intraprocedural("branch");
    let states = analysis.states().unwrap();

    assert!(states.entry(then).is_none());
    assert_eq!(
        states.entry(otherwise).unwrap().read_store(&local("x")),
        Interval::constant(15)
    );
    assert_eq!(
        states.entry(merge).unwrap().read_store(&local("x")),
        Interval::constant(20)
    );
    assert_eq!(
        analysis.result().summary().unwrap().return_value(),
        Interval::constant(20)
    );
}

#[test]
fn unreachable_return_gives_bottom_postcondition() {
    // while true {}
    let mut cfg = ControlFlowGraph::new();
    let spin = cfg.new_block().unwrap().index();
    cfg.set_entry(spin).unwrap();
    cfg.unconditional_edge(spin, spin).unwrap();

    let program = program(vec![Function::new("spin", Vec::new(), cfg)]);
    let analyzer = Analyzer::new(&program, AnalysisOptions::default());
    let analysis = analyzer.analyze_intraprocedural("spin");
    assert!(analysis.outcome().is_ok());
    assert!(analysis
        .result()
        .summary()
        .unwrap()
        .postcondition()
        .is_bottom());
}

/// i = 0; if c { i = i + 1 }; loop { i = i + 1; if d { break }; i = i + 1 }; return i
///
/// The loop is entered both at its first and its second block.
#[test]
fn irreducible_loop_stabilizes() {
    let mut cfg = ControlFlowGraph::new();
    let head = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("i"), expr_const(0));
        block.index()
    };
    let a = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("i"), Expression::add(expr_scalar("i"), expr_const(1)));
        block.index()
    };
    let b = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("i"), Expression::add(expr_scalar("i"), expr_const(1)));
        block.index()
    };
    let exit = {
        let block = cfg.new_block().unwrap();
        block.ret(Some(expr_scalar("i")));
        block.index()
    };
    cfg.set_entry(head).unwrap();
    cfg.conditional_branch(head, expr_scalar("c"), a, b).unwrap();
    cfg.unconditional_edge(a, b).unwrap();
    cfg.conditional_branch(b, expr_scalar("d"), a, exit).unwrap();

    let program = program(vec![Function::new(
        "irreducible",
        vec![scalar("c"), scalar("d")],
        cfg,
    )]);
    let analyzer = Analyzer::new(&program, AnalysisOptions::default());
    let analysis = analyzer.analyze_intraprocedural("irreducible");
    assert_eq!(analysis.outcome(), AnalysisOutcome::Ok);

    let states = analysis.states().unwrap();
    assert!(states.stable());
    assert!(states.iterations() < 50);
    assert_eq!(
        states.entry(exit).unwrap().read_store(&local("i")),
        Interval::at_least(1)
    );
    assert_eq!(
        analysis.result().summary().unwrap().return_value(),
        Interval::at_least(1)
    );
}

/// A chain of blocks, each incrementing `i`.
#[test]
fn long_chain_of_blocks() {
    const BLOCKS: usize = 10_000;

    let mut cfg = ControlFlowGraph::new();
    let head = {
        let block = cfg.new_block().unwrap();
        block.assign(scalar("i"), expr_const(0));
        block.index()
    };
    let mut last = head;
    for _ in 1..BLOCKS {
        let next = {
            let block = cfg.new_block().unwrap();
            block.assign(scalar("i"), Expression::add(expr_scalar("i"), expr_const(1)));
            block.index()
        };
        cfg.unconditional_edge(last, next).unwrap();
        last = next;
    }
    cfg.block_mut(last).unwrap().ret(Some(expr_scalar("i")));
    cfg.set_entry(head).unwrap();

    let program = program(vec![Function::new("chain", Vec::new(), cfg)]);
    let options = AnalysisOptionsBuilder::new()
        .max_iterations(2 * BLOCKS)
        .build();
    let analyzer = Analyzer::new(&program, options);
    let analysis = analyzer.analyze_intraprocedural("chain");
    assert_eq!(analysis.outcome(), AnalysisOutcome::Ok);

    let states = analysis.states().unwrap();
    assert!(states.stable());
    assert_eq!(states.iterations(), BLOCKS);
    assert_eq!(
        analysis.result().summary().unwrap().return_value(),
        Interval::constant(BLOCKS as i64 - 1)
    );
}
