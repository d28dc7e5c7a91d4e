//! Small resolved programs for the command line and the test suite.

use crate::language::{
    ast::{NodeId, Primitive, Program},
    builder::ProgramBuilder,
};

pub struct Sample {
    pub name: &'static str,
    pub summary: &'static str,
    build: fn() -> Program,
}

impl Sample {
    pub fn build(&self) -> Program {
        (self.build)()
    }
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "fib",
        summary: "recursive fibonacci through name-resolved calls",
        build: fib,
    },
    Sample {
        name: "countdown",
        summary: "while loop over a module-level counter",
        build: countdown,
    },
    Sample {
        name: "iterate",
        summary: "for loop driven by the _forall_* iterator functions",
        build: iterate,
    },
    Sample {
        name: "select",
        summary: "select statement with one when per case",
        build: select,
    },
    Sample {
        name: "goto",
        summary: "forward goto over a statement",
        build: goto,
    },
    Sample {
        name: "overload",
        summary: "two functions sharing a name, picked by argument count",
        build: overload,
    },
    Sample {
        name: "fault",
        summary: "division by zero raised inside a function",
        build: fault,
    },
];

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|sample| sample.name == name)
}

fn print_stmt(b: &mut ProgramBuilder, value: NodeId) -> NodeId {
    let print = b.prim(Primitive::Print, vec![value]);
    b.expr_stmt(print)
}

fn fib() -> Program {
    let mut b = ProgramBuilder::new("fib.sw");
    b.module("fib", |b| {
        b.line(1);
        let fib = b.function("fib", &["n"], |b, params| {
            let n = params[0];
            b.line(2);
            let arg = b.sym(n);
            let two = b.int(2);
            let small = b.prim(Primitive::Lt, vec![arg, two]);
            let arg = b.sym(n);
            let early = b.ret(Some(arg));
            let guard = b.if_stmt(small, early, None);
            b.line(3);
            let arg = b.sym(n);
            let one = b.int(1);
            let minus_one = b.prim(Primitive::Sub, vec![arg, one]);
            let left = b.call_named("fib", vec![minus_one]);
            let arg = b.sym(n);
            let two = b.int(2);
            let minus_two = b.prim(Primitive::Sub, vec![arg, two]);
            let right = b.call_named("fib", vec![minus_two]);
            let sum = b.prim(Primitive::Add, vec![left, right]);
            vec![guard, b.ret(Some(sum))]
        });
        b.line(5);
        let main = b.function("main", &[], |b, _| {
            b.line(6);
            let ten = b.int(10);
            let result = b.call_named("fib", vec![ten]);
            vec![print_stmt(b, result)]
        });
        b.set_entry(main);
        vec![b.def_stmt(fib), b.def_stmt(main)]
    });
    b.finish()
}

fn countdown() -> Program {
    let mut b = ProgramBuilder::new("countdown.sw");
    b.module("countdown", |b| {
        b.line(1);
        let (decl, n) = b.declare("n");
        let three = b.int(3);
        let init = b.assign_stmt(n, three);
        b.line(2);
        let current = b.sym(n);
        let zero = b.int(0);
        let positive = b.prim(Primitive::Gt, vec![current, zero]);
        b.line(3);
        let current = b.sym(n);
        let show = print_stmt(b, current);
        b.line(4);
        let current = b.sym(n);
        let one = b.int(1);
        let less = b.prim(Primitive::Sub, vec![current, one]);
        let step = b.assign_stmt(n, less);
        let body = b.block(vec![show, step]);
        let lp = b.while_do(positive, body);
        b.line(6);
        let liftoff = b.string("liftoff");
        vec![decl, init, lp, print_stmt(b, liftoff)]
    });
    b.finish()
}

/// Declares the iterator protocol over tuples: the cursor is an index.
pub(crate) fn tuple_iteration(b: &mut ProgramBuilder) -> Vec<NodeId> {
    let start = b.function("_forall_start", &["t"], |b, _| {
        let zero = b.int(0);
        vec![b.ret(Some(zero))]
    });
    let valid = b.function("_forall_valid", &["t", "i"], |b, params| {
        let i = b.sym(params[1]);
        let t = b.sym(params[0]);
        let len = b.prim(Primitive::Len, vec![t]);
        let below = b.prim(Primitive::Lt, vec![i, len]);
        vec![b.ret(Some(below))]
    });
    let index = b.function("_forall_index", &["t", "i"], |b, params| {
        let t = b.sym(params[0]);
        let i = b.sym(params[1]);
        let item = b.prim(Primitive::Index, vec![t, i]);
        vec![b.ret(Some(item))]
    });
    let next = b.function("_forall_next", &["t", "i"], |b, params| {
        let i = b.sym(params[1]);
        let one = b.int(1);
        let bumped = b.prim(Primitive::Add, vec![i, one]);
        vec![b.ret(Some(bumped))]
    });
    vec![
        b.def_stmt(start),
        b.def_stmt(valid),
        b.def_stmt(index),
        b.def_stmt(next),
    ]
}

fn iterate() -> Program {
    let mut b = ProgramBuilder::new("iterate.sw");
    b.module("iterate", |b| {
        b.line(1);
        let mut stmts = tuple_iteration(b);
        b.line(10);
        let (decl, x) = b.declare("x");
        let items: Vec<NodeId> = [10, 20, 30].into_iter().map(|v| b.int(v)).collect();
        let tuple = b.prim(Primitive::Tuple, items);
        b.line(11);
        let current = b.sym(x);
        let show = print_stmt(b, current);
        let body = b.block(vec![show]);
        b.line(10);
        let lp = b.for_loop(x, tuple, body);
        stmts.extend([decl, lp]);
        stmts
    });
    b.finish()
}

fn select() -> Program {
    let mut b = ProgramBuilder::new("select.sw");
    b.module("select", |b| {
        b.line(1);
        let (decl, v) = b.declare("v");
        let two = b.int(2);
        let init = b.assign_stmt(v, two);
        b.line(2);
        let scrutinee = b.sym(v);
        let whens = [(1, "one"), (2, "two"), (3, "three")]
            .into_iter()
            .map(|(case, text)| {
                let current = b.sym(v);
                let expected = b.int(case);
                let hit = b.prim(Primitive::Eq, vec![current, expected]);
                let message = b.string(text);
                let show = print_stmt(b, message);
                let test = b.if_stmt(hit, show, None);
                b.when(test)
            })
            .collect();
        let sel = b.select(scrutinee, whens);
        vec![decl, init, sel]
    });
    b.finish()
}

fn goto() -> Program {
    let mut b = ProgramBuilder::new("goto.sw");
    b.module("goto", |b| {
        let done = b.label("done");
        b.line(1);
        let start = b.string("start");
        let first = print_stmt(b, start);
        b.line(2);
        let jump = b.goto(done);
        b.line(3);
        let skipped = b.string("skipped");
        let skipped = print_stmt(b, skipped);
        b.line(4);
        let target = b.label_stmt(done);
        b.line(5);
        let end = b.string("end");
        vec![first, jump, skipped, target, print_stmt(b, end)]
    });
    b.finish()
}

fn overload() -> Program {
    let mut b = ProgramBuilder::new("overload.sw");
    b.module("overload", |b| {
        b.line(1);
        let square = b.function("area", &["side"], |b, params| {
            let a = b.sym(params[0]);
            let c = b.sym(params[0]);
            let product = b.prim(Primitive::Mul, vec![a, c]);
            vec![b.ret(Some(product))]
        });
        b.line(2);
        let rect = b.function("area", &["w", "h"], |b, params| {
            let w = b.sym(params[0]);
            let h = b.sym(params[1]);
            let product = b.prim(Primitive::Mul, vec![w, h]);
            vec![b.ret(Some(product))]
        });
        b.line(4);
        let main = b.function("main", &[], |b, _| {
            b.line(5);
            let three = b.int(3);
            let one = b.call_named("area", vec![three]);
            let first = print_stmt(b, one);
            b.line(6);
            let two = b.int(2);
            let five = b.int(5);
            let other = b.call_named("area", vec![two, five]);
            vec![first, print_stmt(b, other)]
        });
        b.set_entry(main);
        vec![b.def_stmt(square), b.def_stmt(rect), b.def_stmt(main)]
    });
    b.finish()
}

fn fault() -> Program {
    let mut b = ProgramBuilder::new("fault.sw");
    b.module("fault", |b| {
        b.line(1);
        let ratio = b.function("ratio", &["a", "b"], |b, params| {
            b.line(2);
            let a = b.sym(params[0]);
            let d = b.sym(params[1]);
            let quotient = b.prim(Primitive::Div, vec![a, d]);
            vec![b.ret(Some(quotient))]
        });
        b.line(4);
        let main = b.function("main", &[], |b, _| {
            b.line(5);
            let ten = b.int(10);
            let zero = b.int(0);
            let result = b.call_named("ratio", vec![ten, zero]);
            vec![print_stmt(b, result)]
        });
        b.set_entry(main);
        vec![b.def_stmt(ratio), b.def_stmt(main)]
    });
    b.finish()
}
