use super::{sample, session};
use crate::config::InterpreterConfig;
use crate::debugger::{command::USAGE, console::ScriptedInput, StepMode};
use crate::language::{
    ast::{NodeId, Primitive, Program},
    builder::ProgramBuilder,
};
use crate::runtime::{frame::Frame, scheduler::RunOutcome};
use std::sync::atomic::Ordering;

struct Calls {
    program: Program,
    f: NodeId,
    ret: NodeId,
    call: NodeId,
}

/// `f` prints and returns 1; `main` prints the result of `f()`.
fn calls() -> Calls {
    let mut b = ProgramBuilder::new("calls.sw");
    let mut ret = None;
    let mut call = None;
    let mut f = None;
    b.module("calls", |b| {
        b.line(1);
        let callee = b.function("f", &[], |b, _| {
            b.line(2);
            let text = b.string("in f");
            let print = b.prim(Primitive::Print, vec![text]);
            let first = b.expr_stmt(print);
            b.line(3);
            let one = b.int(1);
            let r = b.ret(Some(one));
            ret = Some(r);
            vec![first, r]
        });
        f = Some(callee);
        b.line(5);
        let main = b.function("main", &[], |b, _| {
            b.line(6);
            let c = b.call_named("f", vec![]);
            call = Some(c);
            let print = b.prim(Primitive::Print, vec![c]);
            vec![b.expr_stmt(print)]
        });
        b.set_entry(main);
        vec![b.def_stmt(callee), b.def_stmt(main)]
    });
    Calls {
        program: b.finish(),
        f: f.unwrap(),
        ret: ret.unwrap(),
        call: call.unwrap(),
    }
}

fn debug_session(program: &Program, script: &[&str]) -> String {
    let (mut interp, out) = session(program, InterpreterConfig::interactive());
    let mut input = ScriptedInput::new(script.iter().copied());
    interp.run_interactive(&mut input).unwrap();
    assert_eq!(input.remaining(), 0, "script not fully consumed");
    out.contents()
}

#[test]
fn session_stops_before_the_first_instruction() {
    let out = debug_session(&sample("countdown"), &["quit"]);
    assert!(out.starts_with("    ExprStmt("), "{out}");
    assert!(out.contains("in <initialization> countdown.sw:1"), "{out}");
    assert!(!out.contains("liftoff"));
}

#[test]
fn continue_runs_to_termination() {
    let out = debug_session(&sample("countdown"), &["continue", "quit"]);
    assert!(out.contains("3\n2\n1\nliftoff\n  program terminated\n"), "{out}");
}

#[test]
fn finished_program_only_accepts_run_or_quit() {
    let out = debug_session(&sample("countdown"), &["c", "c", "where", "run", "c", "q"]);
    assert!(out.contains("    error: no running program"), "{out}");
    assert_eq!(out.matches("liftoff").count(), 2);
    assert_eq!(out.matches("  program terminated").count(), 2);
}

#[test]
fn breakpoint_in_callee_shows_the_call_chain() {
    let c = calls();
    let script = [
        format!("bi {}", c.ret),
        "continue".to_string(),
        "where".to_string(),
        "stack".to_string(),
        "locals".to_string(),
        "quit".to_string(),
    ];
    let script: Vec<&str> = script.iter().map(String::as_str).collect();
    let out = debug_session(&c.program, &script);

    assert!(out.contains(&format!("  breaking at ReturnStmt({}) calls.sw:3", c.ret)), "{out}");
    assert!(out.contains("in f\n"), "{out}");
    assert!(out.contains(&format!("    ReturnStmt({}) in f calls.sw:3", c.ret)), "{out}");
    assert!(out.contains(&format!("    CallExpr({})/2 in main calls.sw:6", c.call)), "{out}");
    assert!(out.contains("  value stack:\n  local symbols:\n"), "{out}");
    assert!(out.contains("  global symbols:"), "{out}");
    assert!(out.contains(&format!("    f({0}) = symbol: FnSymbol f({0})", c.f)), "{out}");
    assert!(!out.contains("\n1\n"), "{out}");
}

#[test]
fn breakpoint_management_commands() {
    let c = calls();
    let script = [
        format!("bi {}", c.call),
        "info".to_string(),
        format!("birm {}", c.call),
        format!("birm {}", c.call),
        "info".to_string(),
        "quit".to_string(),
    ];
    let script: Vec<&str> = script.iter().map(String::as_str).collect();
    let out = debug_session(&c.program, &script);
    assert!(out.contains(&format!("  break ids:\n    bi {}\n", c.call)), "{out}");
    assert!(out.contains(&format!("  removing bi {}", c.call)), "{out}");
    assert!(out.contains(&format!("  bi {} not found", c.call)), "{out}");
    assert!(out.ends_with("  break ids:\n"), "{out}");
}

#[test]
fn bad_input_is_reported() {
    let out = debug_session(
        &sample("countdown"),
        &[
            "bogus",
            "print",
            "print 0",
            "bi",
            "bi 9999",
            "birm 5",
            "trace 2",
            "trace",
            "print nothere",
            "quit",
        ],
    );
    assert!(out.contains(&format!("  unknown command\n{USAGE}\n")), "{out}");
    assert!(out.contains("  no previous print"), "{out}");
    assert!(out.contains("  please provide a valid id"), "{out}");
    assert!(out.contains("  unable to break at unknown id 9999"), "{out}");
    assert!(out.contains("  bi 5 not found"), "{out}");
    assert!(out.contains("  tracing level set to 2\n  tracing level set to 0\n"), "{out}");
    assert!(out.contains("  unknown local: nothere"), "{out}");
}

#[test]
fn user_error_opens_the_error_loop() {
    let out = debug_session(&sample("fault"), &["continue", "continue", "quit"]);
    assert!(out.contains("error: division by zero\nat fault.sw:2\n"), "{out}");
    assert!(out.contains("in ratio fault.sw:2"), "{out}");
    assert!(out.contains("  unable to continue from error"), "{out}");
}

#[test]
fn step_enters_calls_and_next_steps_over_them() {
    let c = calls();

    // Walk the program with `step`; some stop lands inside `f`.
    let (mut interp, out) = session(&c.program, InterpreterConfig::batch());
    interp.load();
    interp.debug_state_mut().add_breakpoint(c.call);
    let mut deepest = 0;
    while interp.drive().unwrap() == RunOutcome::Suspended {
        deepest = deepest.max(interp.current_frame().unwrap().depth());
        interp.debug_state_mut().reset_for_prompt();
        interp.debug_state_mut().arm(StepMode::Single);
    }
    assert_eq!(deepest, 2);
    assert_eq!(out.contents(), "in f\n1\n");

    // The same walk with `next` never stops below the caller.
    let (mut interp, out) = session(&c.program, InterpreterConfig::batch());
    interp.load();
    interp.debug_state_mut().add_breakpoint(c.call);
    let mut stops = 0;
    while interp.drive().unwrap() == RunOutcome::Suspended {
        stops += 1;
        assert_eq!(interp.current_frame().unwrap().depth(), 1);
        interp.debug_state_mut().reset_for_prompt();
        interp.debug_state_mut().arm(StepMode::Next);
    }
    assert!(stops > 1);
    assert_eq!(out.contents(), "in f\n1\n");
}

#[test]
fn empty_line_repeats_the_last_command() {
    let out = debug_session(&sample("countdown"), &["step", "", "", "quit"]);
    let stops: Vec<&str> = out
        .lines()
        .filter(|line| line.contains(" in <initialization> "))
        .collect();
    assert_eq!(stops.len(), 4, "{out}");
    assert!(stops[0].starts_with("    ExprStmt("), "{out}");
    assert!(stops[1].starts_with("    DefExpr("), "{out}");
    assert!(stops[2].starts_with("    ExprStmt("), "{out}");
    assert!(stops[3].starts_with("    CallExpr("), "{out}");
}

struct Printed {
    program: Program,
    n: NodeId,
    show: NodeId,
    sum: NodeId,
}

/// `n = 5; print(1 + 2)`, keeping the ids the tests break on.
fn printed() -> Printed {
    let mut b = ProgramBuilder::new("printed.sw");
    let mut ids = (None, None, None);
    b.module("printed", |b| {
        b.line(1);
        let (decl, n) = b.declare("n");
        let five = b.int(5);
        let init = b.assign_stmt(n, five);
        b.line(2);
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.prim(Primitive::Add, vec![one, two]);
        let show = b.prim(Primitive::Print, vec![sum]);
        ids = (Some(n), Some(show), Some(sum));
        vec![decl, init, b.expr_stmt(show)]
    });
    Printed {
        program: b.finish(),
        n: ids.0.unwrap(),
        show: ids.1.unwrap(),
        sum: ids.2.unwrap(),
    }
}

fn session_with_break(program: &Program, node: NodeId, script: &[&str]) -> String {
    let (mut interp, out) = session(program, InterpreterConfig::interactive());
    interp.debug_state_mut().add_breakpoint(node);
    let mut input = ScriptedInput::new(script.iter().copied());
    interp.run_interactive(&mut input).unwrap();
    assert_eq!(input.remaining(), 0, "script not fully consumed");
    out.contents()
}

#[test]
fn print_by_name_id_and_with_ids() {
    let p = printed();
    let by_id = format!("print {}", p.n);
    let out = session_with_break(
        &p.program,
        p.show,
        &["continue", "print n", by_id.as_str(), "nprint n", "print", "quit"],
    );
    assert_eq!(out.matches("\nn\n n = immediate: 5\n").count(), 3, "{out}");
    assert!(out.contains(&format!("n#{}\n n = immediate: 5\n", p.n)), "{out}");
}

#[test]
fn print_of_an_expression_renders_the_subtree() {
    let p = printed();
    let by_id = format!("print {}", p.sum);
    let out = session_with_break(&p.program, p.show, &["continue", by_id.as_str(), "quit"]);
    assert!(out.contains("(add 1 2)\n CallExpr \n"), "{out}");
}

#[test]
fn stack_lists_the_top_operand_first() {
    let p = printed();
    let out = session_with_break(
        &p.program,
        p.sum,
        &["continue", "step", "", "", "", "", "stack", "quit"],
    );
    assert!(
        out.contains(&format!(
            "    CallExpr({})/3 in <initialization> printed.sw:2\n  value stack:\n    immediate: 2\n    immediate: 1\n    <empty>\n",
            p.sum
        )),
        "{out}"
    );
}

#[test]
fn external_interrupt_stops_at_the_next_instruction() {
    let program = sample("countdown");
    let (mut interp, out) = session(&program, InterpreterConfig::batch());
    interp.load();
    interp.run_for(3).unwrap();
    let flag = interp.debug_state().interrupt_handle();
    std::thread::spawn(move || flag.store(true, Ordering::SeqCst))
        .join()
        .unwrap();

    let before = interp.current_frame().map(Frame::continuation);
    assert_eq!(interp.drive().unwrap(), RunOutcome::Suspended);
    assert_eq!(interp.current_frame().map(Frame::continuation), before);
    assert_eq!(out.contents(), "");

    interp.debug_state_mut().reset_for_prompt();
    assert_eq!(interp.drive().unwrap(), RunOutcome::Finished);
    assert_eq!(out.contents(), "3\n2\n1\nliftoff\n");
}
