//! Activation frames and the single-instruction step.
//!
//! A frame never recurses on the host stack. The statement it is executing,
//! the expression inside that statement and every enclosing construct waiting
//! for a child live in explicit stacks, together with the stage each of them
//! resumes at. `Frame::step` runs exactly one instruction and returns, so a
//! frame can be suspended between any two instructions and resumed later.
//!
//! Stage 0 is the entry stage of every node. A parent that descends into a
//! child records the stage it resumes at; resuming at stage 0 means the
//! parent has nothing left to do and completes together with the child.

use crate::debugger::{DebugState, StepMode};
use crate::language::ast::{CallExpr, CallOp, NodeId, NodeKind, Program, ScopeId, SymbolKind};
use crate::runtime::{
    call,
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    primitive,
    value::{snapshot, Heap, Slot, SlotRef},
};
use std::io::Write;

/// Resume stage meaning "complete when the child completes".
const DONE: u32 = 0;

const FORALL_START: &str = "_forall_start";
const FORALL_VALID: &str = "_forall_valid";
const FORALL_INDEX: &str = "_forall_index";
const FORALL_NEXT: &str = "_forall_next";

/// Session state an instruction may touch besides its own frame.
pub struct ExecContext<'a> {
    pub program: &'a Program,
    pub debug: &'a mut DebugState,
    pub globals: &'a mut Environment,
    pub heap: &'a mut Heap,
    pub out: &'a mut dyn Write,
}

/// Outcome of one `Frame::step`.
#[derive(Debug)]
pub enum Step {
    Continue,
    /// The debugger asked to stop before the current instruction; nothing
    /// was executed.
    Yield,
    /// A new frame must run on top of this one.
    Call(Box<Frame>),
    /// The frame finished, returning a value or nothing.
    Retired(Option<SlotRef>),
}

enum Advance {
    Stay,
    Done,
    Call(Box<Frame>),
    Retire(Option<SlotRef>),
}

/// Where a thread starts executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Root {
    /// A statement list, run in order from this statement.
    Stmt(NodeId),
    /// A function invoked with no arguments.
    Function(NodeId),
}

#[derive(Debug, Default)]
pub struct Frame {
    stmt_stack: Vec<NodeId>,
    expr_stack: Vec<NodeId>,
    stage_stack: Vec<u32>,
    val_stack: Vec<SlotRef>,
    stmt: Option<NodeId>,
    expr: Option<NodeId>,
    stage: u32,
    ip: Option<NodeId>,
    function: Option<NodeId>,
    env: Environment,
    step_over: bool,
    resuming: bool,
    /// Operand stack height when the last call was issued.
    pending_call: Option<usize>,
    pub(crate) parent: Option<Box<Frame>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the frame to run `root`.
    pub fn init(&mut self, root: Root, cx: &mut ExecContext<'_>) -> RuntimeResult<()> {
        match root {
            Root::Stmt(stmt) => {
                if !cx.program.node(stmt).kind.is_stmt() {
                    return Err(RuntimeError::internal(format!(
                        "thread root {} is not a statement",
                        cx.program.display_name(stmt)
                    )));
                }
                self.start_at(stmt);
                Ok(())
            }
            Root::Function(function) => {
                self.val_stack.push(Slot::Symbol(function).new_ref());
                match self.invoke(1, 0, cx)? {
                    Advance::Stay => Ok(()),
                    _ => Err(RuntimeError::internal("entry function did not start in place")),
                }
            }
        }
    }

    fn start_at(&mut self, stmt: NodeId) {
        self.stmt = Some(stmt);
        self.ip = Some(stmt);
        self.stage = 0;
    }

    // ---- inspection ----

    pub fn ip(&self) -> Option<NodeId> {
        self.ip
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }

    pub fn function(&self) -> Option<NodeId> {
        self.function
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn val_stack(&self) -> &[SlotRef] {
        &self.val_stack
    }

    pub fn parent(&self) -> Option<&Frame> {
        self.parent.as_deref()
    }

    /// Number of frames from this one to the bottom of the chain.
    pub fn depth(&self) -> usize {
        1 + self.parent().map_or(0, Frame::depth)
    }

    /// One stage entry per pending statement, pending expression and the
    /// active expression's statement.
    pub fn is_balanced(&self) -> bool {
        self.stage_stack.len()
            == self.stmt_stack.len() + self.expr_stack.len() + usize::from(self.expr.is_some())
    }

    /// Pending constructs with the stage each resumes at, innermost first.
    /// The first entry is the current instruction.
    pub fn continuation(&self) -> Vec<(NodeId, u32)> {
        let mut out = Vec::new();
        let Some(stmt) = self.stmt else {
            return out;
        };
        let depth = self.stmt_stack.len();
        let stmt_stage = match self.expr {
            Some(expr) => {
                out.push((expr, self.stage));
                for (offset, pending) in self.expr_stack.iter().enumerate().rev() {
                    let stage = self.stage_stack.get(depth + 1 + offset).copied();
                    out.push((*pending, stage.unwrap_or(DONE)));
                }
                self.stage_stack.get(depth).copied().unwrap_or(DONE)
            }
            None => self.stage,
        };
        out.push((stmt, stmt_stage));
        for (pending, stage) in self.stmt_stack.iter().zip(&self.stage_stack).rev() {
            out.push((*pending, *stage));
        }
        out
    }

    /// Forgets step-over marks on this frame and every caller.
    pub fn clear_step_over(&mut self) {
        self.step_over = false;
        if let Some(parent) = self.parent.as_mut() {
            parent.clear_step_over();
        }
    }

    /// Receives the value returned by a callee.
    pub(crate) fn receive(&mut self, value: SlotRef) {
        self.val_stack.push(value);
    }

    // ---- execution ----

    /// Executes one instruction.
    pub fn step(&mut self, cx: &mut ExecContext<'_>) -> RuntimeResult<Step> {
        let ip = self
            .ip
            .ok_or_else(|| RuntimeError::internal("frame has no instruction to execute"))?;
        if self.resuming {
            self.resuming = false;
        } else if cx.debug.should_suspend(ip, self.stage == 0) {
            self.resuming = true;
            return Ok(Step::Yield);
        }
        cx.debug.trace_node(cx.program, ip, cx.out);
        let step = match self.execute(ip, cx)? {
            Advance::Stay => Step::Continue,
            Advance::Done => self.complete(cx)?,
            Advance::Call(child) => Step::Call(child),
            Advance::Retire(value) => self.retire(value, cx),
        };
        cx.debug.after_instruction();
        Ok(step)
    }

    fn execute(&mut self, ip: NodeId, cx: &mut ExecContext<'_>) -> RuntimeResult<Advance> {
        let program = cx.program;
        let node = program.node(ip);
        match &node.kind {
            NodeKind::Nop | NodeKind::Label { .. } | NodeKind::Opaque(_) => Ok(Advance::Done),
            NodeKind::ExprStmt { expr } => match self.stage {
                0 => {
                    self.eval_expr(*expr, DONE, program)?;
                    Ok(Advance::Stay)
                }
                stage => self.bad_stage(ip, stage, program),
            },
            NodeKind::Return { expr } => match (self.stage, expr) {
                (0, None) => Ok(Advance::Retire(None)),
                (0, Some(expr)) => {
                    self.push_expr(*expr, 1, cx)?;
                    Ok(Advance::Stay)
                }
                (1, Some(_)) => {
                    let value = self.pop_val()?;
                    Ok(Advance::Retire(Some(snapshot(&value))))
                }
                (stage, _) => self.bad_stage(ip, stage, program),
            },
            NodeKind::Block { body } => match (self.stage, body.first()) {
                (0, Some(first)) => {
                    self.eval_stmt(*first, DONE, program)?;
                    Ok(Advance::Stay)
                }
                (0, None) => Ok(Advance::Done),
                (stage, _) => self.bad_stage(ip, stage, program),
            },
            NodeKind::While {
                cond,
                body,
                test_first,
            } => match self.stage {
                0 if *test_first => {
                    self.stage = 1;
                    Ok(Advance::Stay)
                }
                0 => {
                    self.eval_stmt(*body, 1, program)?;
                    Ok(Advance::Stay)
                }
                1 => {
                    self.eval_expr(*cond, 2, program)?;
                    Ok(Advance::Stay)
                }
                2 => {
                    if self.slot(*cond, cx).borrow().expect_bool()? {
                        self.eval_stmt(*body, 1, program)?;
                        Ok(Advance::Stay)
                    } else {
                        Ok(Advance::Done)
                    }
                }
                stage => self.bad_stage(ip, stage, program),
            },
            NodeKind::For {
                index,
                iterator,
                body,
            } => self.execute_for(ip, *index, *iterator, *body, cx),
            NodeKind::Cond {
                cond,
                then_stmt,
                else_stmt,
            } => match self.stage {
                0 => {
                    self.push_expr(*cond, 1, cx)?;
                    Ok(Advance::Stay)
                }
                1 => {
                    let truth = self.pop_val()?.borrow().expect_bool()?;
                    let branch = if truth { Some(*then_stmt) } else { *else_stmt };
                    match branch {
                        Some(branch) => {
                            self.eval_stmt(branch, DONE, program)?;
                            Ok(Advance::Stay)
                        }
                        None => Ok(Advance::Done),
                    }
                }
                stage => self.bad_stage(ip, stage, program),
            },
            NodeKind::Select { scrutinee, whens } => match self.stage {
                0 => {
                    self.eval_expr(*scrutinee, 1, program)?;
                    Ok(Advance::Stay)
                }
                1 => match whens.first() {
                    Some(first) => {
                        self.eval_stmt(*first, DONE, program)?;
                        Ok(Advance::Stay)
                    }
                    None => Ok(Advance::Done),
                },
                stage => self.bad_stage(ip, stage, program),
            },
            NodeKind::When { body } => match self.stage {
                0 => {
                    self.eval_stmt(*body, DONE, program)?;
                    Ok(Advance::Stay)
                }
                stage => self.bad_stage(ip, stage, program),
            },
            NodeKind::Goto { label } => {
                let target = match program.symbol(*label).map(|symbol| &symbol.kind) {
                    Some(SymbolKind::Label {
                        target: Some(target),
                    }) => *target,
                    _ => {
                        return Err(RuntimeError::internal(format!(
                            "goto target {} is not a placed label",
                            program.display_name(*label)
                        )))
                    }
                };
                self.jump(ip, target, program)?;
                Ok(Advance::Stay)
            }
            NodeKind::SymRef { symbol } => {
                let value = self.read_symbol(*symbol, cx)?;
                *self.slot(ip, cx).borrow_mut() = value;
                Ok(Advance::Done)
            }
            NodeKind::Def { symbol } => {
                self.define(ip, *symbol, cx)?;
                Ok(Advance::Done)
            }
            NodeKind::Call(call) => self.execute_call(ip, call, cx),
            NodeKind::CondExpr {
                cond,
                then_expr,
                else_expr,
            } => match self.stage {
                0 => {
                    self.push_expr(*cond, 1, cx)?;
                    Ok(Advance::Stay)
                }
                1 => {
                    if self.pop_val()?.borrow().expect_bool()? {
                        self.eval_expr(*then_expr, 2, program)?;
                    } else {
                        self.eval_expr(*else_expr, 3, program)?;
                    }
                    Ok(Advance::Stay)
                }
                2 | 3 => {
                    let branch = if self.stage == 2 { *then_expr } else { *else_expr };
                    let value = self.slot(branch, cx).borrow().clone();
                    *self.slot(ip, cx).borrow_mut() = value;
                    Ok(Advance::Done)
                }
                stage => self.bad_stage(ip, stage, program),
            },
            NodeKind::Symbol(symbol) => Err(RuntimeError::internal(format!(
                "symbol {} is not executable",
                symbol.name
            ))),
        }
    }

    fn execute_for(
        &mut self,
        ip: NodeId,
        index: NodeId,
        iterator: NodeId,
        body: NodeId,
        cx: &mut ExecContext<'_>,
    ) -> RuntimeResult<Advance> {
        // The loop node's own cell holds the iteration cursor.
        let cursor = self.slot(ip, cx);
        let iter = self.slot(iterator, cx);
        match self.stage {
            0 => {
                self.eval_expr(iterator, 1, cx.program)?;
                Ok(Advance::Stay)
            }
            1 => self.call_named(FORALL_START, &[iter], 2, cx),
            2 | 6 => {
                let result = self.take_call_result();
                *cursor.borrow_mut() = result.borrow().clone();
                self.call_named(FORALL_VALID, &[iter, cursor], 3, cx)
            }
            3 => {
                if !self.take_call_result().borrow().expect_bool()? {
                    return Ok(Advance::Done);
                }
                self.call_named(FORALL_INDEX, &[iter, cursor], 4, cx)
            }
            4 => {
                let value = self.take_call_result().borrow().clone();
                *self.slot(index, cx).borrow_mut() = value;
                self.eval_stmt(body, 5, cx.program)?;
                Ok(Advance::Stay)
            }
            5 => self.call_named(FORALL_NEXT, &[iter, cursor], 6, cx),
            stage => self.bad_stage(ip, stage, cx.program),
        }
    }

    fn execute_call(
        &mut self,
        ip: NodeId,
        call: &CallExpr,
        cx: &mut ExecContext<'_>,
    ) -> RuntimeResult<Advance> {
        let nargs = call.args.len() as u32;
        match self.stage {
            0 => match call.op {
                CallOp::Primitive(_) => {
                    self.stage = 1;
                    Ok(Advance::Stay)
                }
                CallOp::Move => {
                    if call.args.len() != 2 {
                        return Err(RuntimeError::internal("MOVE requires a target and a value"));
                    }
                    self.stage = 2;
                    Ok(Advance::Stay)
                }
                CallOp::Invoke => {
                    let callee = call
                        .callee
                        .ok_or_else(|| RuntimeError::internal("call without a callee"))?;
                    self.push_expr(callee, 1, cx)?;
                    Ok(Advance::Stay)
                }
            },
            stage if stage <= nargs => {
                self.push_expr(call.args[(stage - 1) as usize], stage + 1, cx)?;
                Ok(Advance::Stay)
            }
            stage if stage == nargs + 1 => match call.op {
                CallOp::Primitive(op) => {
                    let operands = self.pop_operands(call.args.len())?;
                    let result = primitive::apply(op, operands, cx)?;
                    *self.slot(ip, cx).borrow_mut() = result;
                    Ok(Advance::Done)
                }
                CallOp::Move => {
                    let target = match cx.program.node(call.args[0]).kind {
                        NodeKind::SymRef { symbol } => symbol,
                        _ => return Err(RuntimeError::internal("target of MOVE not a SymExpr")),
                    };
                    let value = self.pop_val()?.borrow().clone();
                    *self.slot(target, cx).borrow_mut() = value.clone();
                    *self.slot(ip, cx).borrow_mut() = value;
                    Ok(Advance::Done)
                }
                CallOp::Invoke => self.invoke(call.args.len() + 1, nargs + 2, cx),
            },
            stage if stage == nargs + 2 && call.op == CallOp::Invoke => {
                let value = self.take_call_result().borrow().clone();
                *self.slot(ip, cx).borrow_mut() = value;
                Ok(Advance::Done)
            }
            stage => self.bad_stage(ip, stage, cx.program),
        }
    }

    // ---- variables ----

    fn slot(&mut self, node: NodeId, cx: &mut ExecContext<'_>) -> SlotRef {
        if cx.program.is_global(node) {
            cx.globals.slot(node)
        } else {
            self.env.slot(node)
        }
    }

    fn existing(&self, node: NodeId, cx: &ExecContext<'_>) -> Option<SlotRef> {
        if cx.program.is_global(node) {
            cx.globals.get(node)
        } else {
            self.env.get(node)
        }
    }

    fn read_symbol(&mut self, symbol: NodeId, cx: &mut ExecContext<'_>) -> RuntimeResult<Slot> {
        if let Some(cell) = self.existing(symbol, cx) {
            return Ok(cell.borrow().clone());
        }
        let sym = cx
            .program
            .symbol(symbol)
            .ok_or_else(|| RuntimeError::internal("SymExpr does not reference a symbol"))?;
        let value = match &sym.kind {
            SymbolKind::Unresolved => Slot::Selector(sym.name.clone()),
            SymbolKind::Fn(_) | SymbolKind::Type => Slot::Symbol(symbol),
            SymbolKind::Var {
                immediate: Some(value),
            } => Slot::Immediate(value.clone()),
            _ => {
                return Err(RuntimeError::internal(format!(
                    "unknown variable in SymExpr '{}'",
                    sym.name
                )))
            }
        };
        *self.slot(symbol, cx).borrow_mut() = value.clone();
        Ok(value)
    }

    fn define(&mut self, def: NodeId, symbol: NodeId, cx: &mut ExecContext<'_>) -> RuntimeResult<()> {
        let sym = cx
            .program
            .symbol(symbol)
            .ok_or_else(|| RuntimeError::internal("DefExpr does not define a symbol"))?;
        let value = match &sym.kind {
            SymbolKind::Var { immediate: None } => Slot::Empty,
            SymbolKind::Var {
                immediate: Some(value),
            } => Slot::Immediate(value.clone()),
            SymbolKind::Fn(_)
            | SymbolKind::Type
            | SymbolKind::Module
            | SymbolKind::Enum
            | SymbolKind::Label { .. }
            | SymbolKind::Unresolved => Slot::Symbol(symbol),
        };
        if sym.global {
            cx.globals.declare(symbol, value);
        } else {
            self.env.declare(symbol, value);
        }
        cx.debug.trace_definition(cx.program, def, symbol, cx.out);
        Ok(())
    }

    // ---- stack discipline ----

    fn eval_stmt(&mut self, child: NodeId, resume: u32, program: &Program) -> RuntimeResult<()> {
        if !program.node(child).kind.is_stmt() {
            return Err(RuntimeError::internal(format!(
                "expected a statement, found {}",
                program.display_name(child)
            )));
        }
        let stmt = match (self.stmt, self.expr) {
            (Some(stmt), None) => stmt,
            _ => return Err(RuntimeError::internal("statement nested inside an expression")),
        };
        self.stage_stack.push(resume);
        self.stmt_stack.push(stmt);
        self.start_at(child);
        Ok(())
    }

    fn eval_expr(&mut self, child: NodeId, resume: u32, program: &Program) -> RuntimeResult<()> {
        if !program.node(child).kind.is_expr() {
            return Err(RuntimeError::internal(format!(
                "expected an expression, found {}",
                program.display_name(child)
            )));
        }
        if let Some(current) = self.expr {
            self.expr_stack.push(current);
        }
        self.stage_stack.push(resume);
        self.expr = Some(child);
        self.ip = Some(child);
        self.stage = 0;
        Ok(())
    }

    /// Evaluates `child` and leaves its result cell on the operand stack.
    fn push_expr(&mut self, child: NodeId, resume: u32, cx: &mut ExecContext<'_>) -> RuntimeResult<()> {
        let cell = self.slot(child, cx);
        self.val_stack.push(cell);
        self.eval_expr(child, resume, cx.program)
    }

    fn pop_val(&mut self) -> RuntimeResult<SlotRef> {
        self.val_stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("operand stack underflow"))
    }

    fn pop_operands(&mut self, count: usize) -> RuntimeResult<Vec<Slot>> {
        if self.val_stack.len() < count {
            return Err(RuntimeError::internal("not enough operands on the stack"));
        }
        let operands = self.val_stack.split_off(self.val_stack.len() - count);
        Ok(operands.iter().map(|cell| cell.borrow().clone()).collect())
    }

    /// Finishes the current node and every parent waiting on stage 0.
    fn complete(&mut self, cx: &mut ExecContext<'_>) -> RuntimeResult<Step> {
        loop {
            let resume = if self.expr.is_some() {
                let resume = self.pop_stage()?;
                self.expr = self.expr_stack.pop();
                self.ip = self.expr.or(self.stmt);
                resume
            } else {
                let stmt = self
                    .stmt
                    .ok_or_else(|| RuntimeError::internal("completed a statement with no statement"))?;
                self.val_stack.clear();
                self.pending_call = None;
                if let Some(next) = cx.program.node(stmt).next {
                    self.start_at(next);
                    return Ok(Step::Continue);
                }
                match self.stmt_stack.pop() {
                    Some(parent) => {
                        self.stmt = Some(parent);
                        self.ip = Some(parent);
                        self.pop_stage()?
                    }
                    None => {
                        self.stmt = None;
                        self.ip = None;
                        return Ok(self.retire(None, cx));
                    }
                }
            };
            self.stage = resume;
            if resume != DONE {
                return Ok(Step::Continue);
            }
        }
    }

    fn pop_stage(&mut self) -> RuntimeResult<u32> {
        self.stage_stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("stage stack underflow"))
    }

    fn retire(&mut self, value: Option<SlotRef>, cx: &mut ExecContext<'_>) -> Step {
        if self.step_over {
            cx.debug.arm(StepMode::Next);
        }
        tracing::trace!(function = ?self.function, returned = value.is_some(), "frame retired");
        Step::Retired(value)
    }

    fn bad_stage(&self, ip: NodeId, stage: u32, program: &Program) -> RuntimeResult<Advance> {
        Err(RuntimeError::internal(format!(
            "{}({}) has no stage {}",
            program.node(ip).kind.name(),
            ip,
            stage
        )))
    }

    // ---- control transfer ----

    /// Moves control to the labelled statement `target`. Nothing is changed
    /// unless the jump is legal.
    fn jump(&mut self, from: NodeId, target: NodeId, program: &Program) -> RuntimeResult<()> {
        let parents = program.enclosing_stmts(target);
        let depth = parents.len();
        if depth > self.stmt_stack.len() {
            return Err(RuntimeError::GotoNestedBelow);
        }
        if parents.iter().zip(&self.stmt_stack).any(|(a, b)| a != b) {
            return Err(RuntimeError::GotoCrossesNesting);
        }
        let start = if depth == self.stmt_stack.len() {
            from
        } else {
            self.stmt_stack[depth]
        };
        let mut definition = None;
        let mut current = program.node(start).next;
        while let Some(stmt) = current {
            if stmt == target {
                if let Some(definition) = definition {
                    return Err(RuntimeError::GotoOverDefinition { definition });
                }
                break;
            }
            definition = definition.or(program.defined_by(stmt));
            current = program.node(stmt).next;
        }
        self.stmt_stack.truncate(depth);
        self.stage_stack.truncate(depth);
        self.expr_stack.clear();
        self.expr = None;
        self.val_stack.clear();
        self.pending_call = None;
        self.start_at(target);
        Ok(())
    }

    fn call_named(
        &mut self,
        name: &str,
        args: &[SlotRef],
        resume: u32,
        cx: &mut ExecContext<'_>,
    ) -> RuntimeResult<Advance> {
        self.val_stack.push(Slot::Selector(name.to_string()).new_ref());
        self.val_stack.extend(args.iter().cloned());
        self.invoke(args.len() + 1, resume, cx)
    }

    /// Pops a callee and `nargs - 1` arguments and enters the resolved
    /// function. The operands are consumed whether or not resolution works.
    fn invoke(&mut self, nargs: usize, resume: u32, cx: &mut ExecContext<'_>) -> RuntimeResult<Advance> {
        if nargs == 0 || self.val_stack.len() < nargs {
            return Err(RuntimeError::internal("not enough arguments for call"));
        }
        let mut operands = self.val_stack.split_off(self.val_stack.len() - nargs);
        let args = operands.split_off(1);
        self.stage = resume;
        self.pending_call = Some(self.val_stack.len());
        let scope = self
            .ip
            .map_or(ScopeId::ROOT, |ip| cx.program.node(ip).scope);
        let callee = operands[0].borrow().clone();
        let function = call::resolve_callee(cx.program, scope, &callee, args.len())?;
        self.enter(function, &args, cx)
    }

    fn enter(&mut self, function: NodeId, args: &[SlotRef], cx: &mut ExecContext<'_>) -> RuntimeResult<Advance> {
        let (_, decl) = cx
            .program
            .function(function)
            .ok_or_else(|| RuntimeError::internal("call target is not a function"))?;
        cx.debug.trace_call(cx.program, function, cx.out);
        if cx.debug.is_breakpoint(function) {
            cx.debug.interrupt();
        }
        if self.ip.is_none() {
            self.function = Some(function);
            self.pending_call = None;
            bind_params(&mut self.env, &decl.params, args);
            self.start_at(decl.body);
            return Ok(Advance::Stay);
        }
        let mut child = Frame::new();
        child.function = Some(function);
        bind_params(&mut child.env, &decl.params, args);
        child.start_at(decl.body);
        if cx.debug.step_mode() == StepMode::Next {
            child.step_over = true;
            cx.debug.arm(StepMode::None);
        }
        tracing::trace!(function = %cx.program.display_name(function), "entering frame");
        Ok(Advance::Call(Box::new(child)))
    }

    /// The value returned by the last call, or an empty cell when the callee
    /// returned nothing.
    fn take_call_result(&mut self) -> SlotRef {
        match self.pending_call.take() {
            Some(base) if self.val_stack.len() > base => {
                let value = self.val_stack.split_off(base);
                value.into_iter().last().unwrap_or_else(|| Slot::Empty.new_ref())
            }
            _ => Slot::Empty.new_ref(),
        }
    }
}

fn bind_params(env: &mut Environment, params: &[NodeId], args: &[SlotRef]) {
    for (param, arg) in params.iter().zip(args) {
        env.declare(*param, arg.borrow().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::builder::ProgramBuilder;
    use crate::language::ast::Primitive;

    struct Harness {
        debug: DebugState,
        globals: Environment,
        heap: Heap,
        out: Vec<u8>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                debug: DebugState::new(),
                globals: Environment::new(),
                heap: Heap::default(),
                out: Vec::new(),
            }
        }

        fn cx<'a>(&'a mut self, program: &'a Program) -> ExecContext<'a> {
            ExecContext {
                program,
                debug: &mut self.debug,
                globals: &mut self.globals,
                heap: &mut self.heap,
                out: &mut self.out,
            }
        }
    }

    fn single_module(body: impl FnOnce(&mut ProgramBuilder) -> Vec<NodeId>) -> Program {
        let mut b = ProgramBuilder::new("t.sw");
        b.module("m", body);
        b.finish()
    }

    #[test]
    fn statement_list_runs_to_retirement_with_balanced_stacks() {
        let program = single_module(|b| {
            let one = b.int(1);
            let two = b.int(2);
            let sum = b.prim(Primitive::Add, vec![one, two]);
            let print = b.prim(Primitive::Print, vec![sum]);
            vec![b.expr_stmt(print), b.nop()]
        });
        let mut h = Harness::new();
        let mut frame = Frame::new();
        let first = program.modules()[0].first_stmt().unwrap();
        let mut cx = h.cx(&program);
        frame.init(Root::Stmt(first), &mut cx).unwrap();
        let mut steps = 0;
        loop {
            assert!(frame.is_balanced());
            match frame.step(&mut cx).unwrap() {
                Step::Continue => steps += 1,
                Step::Retired(value) => {
                    assert!(value.is_none());
                    break;
                }
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert!(steps > 4);
        drop(cx);
        assert_eq!(String::from_utf8(h.out).unwrap(), "3\n");
    }

    #[test]
    fn return_snapshots_the_value() {
        let mut function = None;
        let program = single_module(|b| {
            let f = b.function("f", &[], |b, _| {
                let seven = b.int(7);
                vec![b.ret(Some(seven))]
            });
            function = Some(f);
            vec![b.def_stmt(f)]
        });
        let mut h = Harness::new();
        let mut frame = Frame::new();
        let mut cx = h.cx(&program);
        frame.init(Root::Function(function.unwrap()), &mut cx).unwrap();
        assert_eq!(frame.function(), function);
        let value = loop {
            if let Step::Retired(value) = frame.step(&mut cx).unwrap() {
                break value;
            }
        };
        assert_eq!(value.unwrap().borrow().expect_int(), Ok(7));
    }

    #[test]
    fn calls_hand_back_a_child_frame() {
        let program = single_module(|b| {
            let f = b.function("f", &["x"], |b, params| {
                let x = b.sym(params[0]);
                vec![b.ret(Some(x))]
            });
            let five = b.int(5);
            let call = b.call_named("f", vec![five]);
            vec![b.def_stmt(f), b.expr_stmt(call)]
        });
        let mut h = Harness::new();
        let mut frame = Frame::new();
        let first = program.modules()[0].first_stmt().unwrap();
        let mut cx = h.cx(&program);
        frame.init(Root::Stmt(first), &mut cx).unwrap();
        let mut child = loop {
            match frame.step(&mut cx).unwrap() {
                Step::Call(child) => break child,
                Step::Continue => {}
                other => panic!("unexpected step {other:?}"),
            }
        };
        assert!(frame.is_balanced());
        let returned = loop {
            if let Step::Retired(value) = child.step(&mut cx).unwrap() {
                break value.unwrap();
            }
        };
        frame.receive(returned);
        assert_eq!(frame.val_stack().len(), 1);
        loop {
            if let Step::Retired(_) = frame.step(&mut cx).unwrap() {
                break;
            }
        }
    }

    #[test]
    fn goto_into_a_nested_block_is_refused_without_changes() {
        let program = single_module(|b| {
            let label = b.label("inside");
            let goto = b.goto(label);
            let placed = b.label_stmt(label);
            let inner = b.block(vec![placed]);
            vec![goto, inner]
        });
        let mut h = Harness::new();
        let mut frame = Frame::new();
        let first = program.modules()[0].first_stmt().unwrap();
        let mut cx = h.cx(&program);
        frame.init(Root::Stmt(first), &mut cx).unwrap();
        let before = frame.continuation();
        assert_eq!(frame.step(&mut cx).unwrap_err(), RuntimeError::GotoNestedBelow);
        assert_eq!(frame.continuation(), before);
        assert!(frame.is_balanced());
    }

    #[test]
    fn executing_a_symbol_is_internal() {
        let program = single_module(|b| vec![b.nop()]);
        let mut h = Harness::new();
        let mut frame = Frame::new();
        let mut cx = h.cx(&program);
        let module_symbol = program.modules()[0].symbol;
        assert!(frame.init(Root::Stmt(module_symbol), &mut cx).unwrap_err().is_internal());
    }
}
