//! Source-level debugger state and command loop.
//!
//! `DebugState` is owned by one interpreter session and threaded into both
//! the step loop (breakpoints, stepping, tracing) and the console (commands).

pub mod command;
pub mod console;

use crate::language::ast::{NodeId, Program};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StepMode {
    #[default]
    None,
    /// Suspend before the next instruction.
    Single,
    /// Suspend before the next instruction at the same or a shallower frame.
    Next,
}

#[derive(Debug, Default)]
pub struct DebugState {
    breakpoints: BTreeSet<NodeId>,
    known_ids: HashMap<u32, NodeId>,
    walked: bool,
    trace_level: u32,
    step: StepMode,
    interrupted: Arc<AtomicBool>,
    pub(crate) last_command: String,
    pub(crate) last_print: Option<NodeId>,
}

impl DebugState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_level(mut self, level: u32) -> Self {
        self.trace_level = level;
        self
    }

    // ---- breakpoints ----

    pub fn add_breakpoint(&mut self, node: NodeId) -> bool {
        tracing::debug!(node = node.raw(), "breakpoint set");
        self.breakpoints.insert(node)
    }

    pub fn remove_breakpoint(&mut self, node: NodeId) -> bool {
        tracing::debug!(node = node.raw(), "breakpoint removed");
        self.breakpoints.remove(&node)
    }

    pub fn is_breakpoint(&self, node: NodeId) -> bool {
        self.breakpoints.contains(&node)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.breakpoints.iter().copied()
    }

    // ---- stepping and interruption ----

    pub fn step_mode(&self) -> StepMode {
        self.step
    }

    pub fn arm(&mut self, mode: StepMode) {
        self.step = mode;
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Flag an external source (e.g. a signal handler) can raise to force
    /// entry into the debugger at the next instruction boundary.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Step modes and pending interrupts are consumed each time the command
    /// loop prompts.
    pub fn reset_for_prompt(&mut self) {
        self.step = StepMode::None;
        self.interrupted.store(false, Ordering::SeqCst);
    }

    /// Whether execution should stop before `ip`. Breakpoints only fire when
    /// a node is entered, not when it resumes a later stage.
    pub fn should_suspend(&self, ip: NodeId, entering: bool) -> bool {
        if entering && self.breakpoints.contains(&ip) {
            self.interrupt();
        }
        self.is_interrupted()
    }

    /// Called after every executed instruction.
    pub fn after_instruction(&self) {
        if self.step != StepMode::None {
            self.interrupt();
        }
    }

    // ---- tracing ----

    pub fn trace_level(&self) -> u32 {
        self.trace_level
    }

    pub fn set_trace_level(&mut self, level: u32) {
        self.trace_level = level;
    }

    pub fn trace_node(&mut self, program: &Program, ip: NodeId, out: &mut dyn Write) {
        if self.trace_level == 0 {
            return;
        }
        let node = program.node(ip);
        let _ = writeln!(out, "{}({}) {}", node.kind.name(), ip, node.location);
        self.remember(ip);
    }

    pub fn trace_call(&mut self, program: &Program, function: NodeId, out: &mut dyn Write) {
        if self.trace_level == 0 {
            return;
        }
        let _ = writeln!(out, "  Calling {}({})", program.display_name(function), function);
        self.remember(function);
    }

    pub fn trace_definition(&mut self, program: &Program, def: NodeId, symbol: NodeId, out: &mut dyn Write) {
        if self.trace_level == 0 {
            return;
        }
        let _ = writeln!(out, "  {}({})", program.display_name(symbol), def);
        self.remember(def);
    }

    // ---- known ids ----

    pub fn remember(&mut self, node: NodeId) {
        self.known_ids.insert(node.raw(), node);
    }

    /// Resolves a user-supplied id. Ids that have not been displayed yet are
    /// found by walking every module once.
    pub fn resolve_id(&mut self, program: &Program, raw: u32) -> Option<NodeId> {
        if let Some(node) = self.known_ids.get(&raw) {
            return Some(*node);
        }
        if !self.walked {
            self.walked = true;
            for module in program.modules() {
                for node in program.collect_module(module) {
                    self.remember(node);
                }
            }
        }
        self.known_ids.get(&raw).copied()
    }
}
