use super::{sample, session};
use crate::config::InterpreterConfig;
use crate::language::{
    ast::{Immediate, NodeId, Primitive, Program},
    builder::ProgramBuilder,
};
use crate::runtime::{error::RuntimeError, frame::Frame, scheduler::RunOutcome, value::Slot};
use crate::tools::samples::{tuple_iteration, SAMPLES};
use proptest::prelude::*;

fn print_stmt(b: &mut ProgramBuilder, value: NodeId) -> NodeId {
    let print = b.prim(Primitive::Print, vec![value]);
    b.expr_stmt(print)
}

fn chain_balanced(frame: &Frame) -> bool {
    frame.is_balanced() && frame.parent().map_or(true, chain_balanced)
}

/// Traced output and final error of an uninterrupted run.
fn run_whole(program: &Program) -> (String, Option<RuntimeError>) {
    let (mut interp, out) = session(program, InterpreterConfig::batch().with_trace_level(1));
    let error = interp.run().err().map(|fault| fault.error);
    (out.contents(), error)
}

/// Same as `run_whole`, but suspends after every slice of instructions and
/// checks the stage stack of every frame at each suspension.
fn run_sliced(program: &Program, slices: &[usize]) -> (String, Option<RuntimeError>) {
    let (mut interp, out) = session(program, InterpreterConfig::batch().with_trace_level(1));
    interp.load();
    let mut error = None;
    let mut turn = 0;
    while !interp.is_finished() {
        match interp.run_for(slices[turn % slices.len()]) {
            Ok(_) => {}
            Err(fault) => {
                error = Some(fault.error);
                break;
            }
        }
        if let Some(frame) = interp.current_frame() {
            assert!(chain_balanced(frame), "unbalanced frame at {:?}", frame.ip());
        }
        turn += 1;
    }
    (out.contents(), error)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn sliced_runs_match_uninterrupted_runs(
        which in 0..SAMPLES.len(),
        slices in prop::collection::vec(1usize..24, 1..6),
    ) {
        let program = SAMPLES[which].build();
        let whole = run_whole(&program);
        let sliced = run_sliced(&program, &slices);
        prop_assert_eq!(sliced, whole);
    }
}

#[test]
fn every_instruction_leaves_frames_balanced() {
    for sample in SAMPLES {
        let program = sample.build();
        let (output, _) = run_sliced(&program, &[1]);
        assert!(!output.is_empty(), "sample {}", sample.name);
    }
}

#[test]
fn for_loop_calls_the_iterator_protocol() {
    let (output, error) = run_whole(&sample("iterate"));
    assert_eq!(error, None);
    let calls = |name: &str| output.matches(&format!("  Calling {name}(")).count();
    assert_eq!(calls("_forall_start"), 1);
    assert_eq!(calls("_forall_valid"), 4);
    assert_eq!(calls("_forall_index"), 3);
    assert_eq!(calls("_forall_next"), 3);
}

#[test]
fn for_loop_over_nothing_skips_the_body() {
    let mut b = ProgramBuilder::new("empty_for.sw");
    b.module("empty_for", |b| {
        let mut stmts = tuple_iteration(b);
        let (decl, x) = b.declare("x");
        let tuple = b.prim(Primitive::Tuple, vec![]);
        let current = b.sym(x);
        let show = print_stmt(b, current);
        let body = b.block(vec![show]);
        let lp = b.for_loop(x, tuple, body);
        let done = b.string("done");
        stmts.extend([decl, lp, print_stmt(b, done)]);
        stmts
    });
    let program = b.finish();
    let (mut interp, out) = session(&program, InterpreterConfig::batch());
    interp.run().unwrap();
    assert_eq!(out.contents(), "done\n");
}

#[test]
fn backward_goto_out_of_a_conditional() {
    let mut b = ProgramBuilder::new("loop.sw");
    b.module("loop", |b| {
        let top = b.label("top");
        let (decl, n) = b.declare("n");
        let three = b.int(3);
        let init = b.assign_stmt(n, three);
        let target = b.label_stmt(top);
        let current = b.sym(n);
        let show = print_stmt(b, current);
        let current = b.sym(n);
        let one = b.int(1);
        let less = b.prim(Primitive::Sub, vec![current, one]);
        let step = b.assign_stmt(n, less);
        let current = b.sym(n);
        let zero = b.int(0);
        let more = b.prim(Primitive::Gt, vec![current, zero]);
        let again = b.goto(top);
        let repeat = b.if_stmt(more, again, None);
        vec![decl, init, target, show, step, repeat]
    });
    let program = b.finish();
    let (mut interp, out) = session(&program, InterpreterConfig::batch());
    interp.run().unwrap();
    assert_eq!(out.contents(), "3\n2\n1\n");
}

/// Runs one instruction at a time until the program fails, checking that
/// the failing instruction left the frame exactly as it found it.
fn failing_jump(program: &Program) -> RuntimeError {
    let (mut interp, _) = session(program, InterpreterConfig::batch());
    interp.load();
    while !interp.is_finished() {
        let before = interp.current_frame().map(Frame::continuation);
        if let Err(fault) = interp.run_for(1) {
            assert_eq!(interp.current_frame().map(Frame::continuation), before);
            return fault.error;
        }
    }
    panic!("program finished without a fault");
}

#[test]
fn goto_into_a_nested_statement_fails() {
    let mut b = ProgramBuilder::new("nested.sw");
    b.module("nested", |b| {
        let inner = b.label("inner");
        let first = b.nop();
        let jump = b.goto(inner);
        let target = b.label_stmt(inner);
        let block = b.block(vec![target]);
        vec![first, jump, block]
    });
    assert_eq!(failing_jump(&b.finish()), RuntimeError::GotoNestedBelow);
}

#[test]
fn goto_into_a_sibling_block_fails() {
    let mut b = ProgramBuilder::new("cross.sw");
    b.module("cross", |b| {
        let other = b.label("other");
        let first = b.nop();
        let jump = b.goto(other);
        let left = b.block(vec![jump]);
        let target = b.label_stmt(other);
        let right = b.block(vec![target]);
        vec![first, left, right]
    });
    assert_eq!(failing_jump(&b.finish()), RuntimeError::GotoCrossesNesting);
}

#[test]
fn goto_over_a_definition_fails() {
    let mut b = ProgramBuilder::new("skip.sw");
    let mut decl = None;
    b.module("skip", |b| {
        let after = b.label("after");
        let first = b.nop();
        let jump = b.goto(after);
        let (skipped, _) = b.declare("x");
        decl = Some(skipped);
        let target = b.label_stmt(after);
        vec![first, jump, skipped, target]
    });
    let program = b.finish();
    let definition = program.defined_by(decl.unwrap()).unwrap();
    assert_eq!(
        failing_jump(&program),
        RuntimeError::GotoOverDefinition { definition }
    );
}

#[test]
fn overload_resolution_is_stable_across_sessions() {
    let program = sample("overload");
    let first = run_whole(&program);
    for _ in 0..3 {
        assert_eq!(run_whole(&program), first);
    }
}

#[test]
fn callee_result_lands_on_the_caller_stack() {
    let mut b = ProgramBuilder::new("answer.sw");
    b.module("answer", |b| {
        let answer = b.function("answer", &[], |b, _| {
            let value = b.int(42);
            vec![b.ret(Some(value))]
        });
        let main = b.function("main", &[], |b, _| {
            let call = b.call_named("answer", vec![]);
            vec![print_stmt(b, call)]
        });
        b.set_entry(main);
        vec![b.def_stmt(answer), b.def_stmt(main)]
    });
    let program = b.finish();
    let (mut interp, out) = session(&program, InterpreterConfig::batch());
    interp.load();
    // Step until the callee has retired and the caller holds the value.
    let mut seen = false;
    while !interp.is_finished() {
        interp.run_for(1).unwrap();
        if let Some(frame) = interp.current_frame() {
            let returned = frame
                .val_stack()
                .iter()
                .any(|cell| matches!(&*cell.borrow(), Slot::Immediate(Immediate::Int(42))));
            if frame.depth() == 1 && frame.function().is_some() && returned {
                seen = true;
            }
        }
    }
    assert!(seen);
    assert_eq!(out.contents(), "42\n");
}

struct Loop {
    program: Program,
    body_print: NodeId,
    last_print: NodeId,
}

fn three_iterations() -> Loop {
    let mut b = ProgramBuilder::new("iter.sw");
    let mut ids = (None, None);
    b.module("iter", |b| {
        let (decl, n) = b.declare("n");
        let three = b.int(3);
        let init = b.assign_stmt(n, three);
        let current = b.sym(n);
        let zero = b.int(0);
        let positive = b.prim(Primitive::Gt, vec![current, zero]);
        let current = b.sym(n);
        let print = b.prim(Primitive::Print, vec![current]);
        let show = b.expr_stmt(print);
        let current = b.sym(n);
        let one = b.int(1);
        let less = b.prim(Primitive::Sub, vec![current, one]);
        let step = b.assign_stmt(n, less);
        let body = b.block(vec![show, step]);
        let lp = b.while_do(positive, body);
        let done = b.string("done");
        let last = b.prim(Primitive::Print, vec![done]);
        ids = (Some(print), Some(last));
        vec![decl, init, lp, b.expr_stmt(last)]
    });
    Loop {
        program: b.finish(),
        body_print: ids.0.unwrap(),
        last_print: ids.1.unwrap(),
    }
}

/// Number of suspensions while running with a breakpoint on `node`.
fn stops_at(program: &Program, node: NodeId) -> usize {
    let (mut interp, _) = session(program, InterpreterConfig::batch());
    interp.load();
    interp.debug_state_mut().add_breakpoint(node);
    let mut stops = 0;
    while interp.drive().unwrap() == RunOutcome::Suspended {
        assert_eq!(interp.current_frame().and_then(Frame::ip), Some(node));
        assert_eq!(interp.current_frame().map(Frame::stage), Some(0));
        stops += 1;
        interp.debug_state_mut().reset_for_prompt();
    }
    stops
}

#[test]
fn breakpoints_fire_once_per_entry() {
    let l = three_iterations();
    assert_eq!(stops_at(&l.program, l.last_print), 1);
    assert_eq!(stops_at(&l.program, l.body_print), 3);
}
