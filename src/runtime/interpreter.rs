use crate::config::{InterpreterConfig, RunMode};
use crate::debugger::{
    console::{Console, LineSource, Resume},
    DebugState, StepMode,
};
use crate::language::ast::{NodeId, Program};
use crate::runtime::{
    environment::Environment,
    error::{Fault, RuntimeError},
    frame::{ExecContext, Frame, Root},
    scheduler::{RunOutcome, Scheduler},
    value::{Heap, Slot},
};
use crate::tools::diagnostics::report_fault;
use std::io::{self, Write};

/// One interpreter session over a resolved program: the scheduler and its
/// threads, global variables, debugger state and the output sink.
pub struct Interpreter<'p> {
    program: &'p Program,
    config: InterpreterConfig,
    debug: DebugState,
    globals: Environment,
    heap: Heap,
    scheduler: Scheduler,
    out: Box<dyn Write>,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, config: InterpreterConfig) -> Self {
        Self {
            program,
            debug: DebugState::new().with_trace_level(config.trace_level),
            globals: Environment::new(),
            heap: Heap::default(),
            scheduler: Scheduler::new(config.timeslice),
            out: Box::new(io::stdout()),
            config,
        }
    }

    /// Sends program and debugger output to `out` instead of stdout.
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn debug_state(&self) -> &DebugState {
        &self.debug
    }

    pub fn debug_state_mut(&mut self) -> &mut DebugState {
        &mut self.debug
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Current contents of a global variable.
    pub fn global_value(&self, symbol: NodeId) -> Option<Slot> {
        self.globals.get(symbol).map(|cell| cell.borrow().clone())
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.scheduler.current_frame()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Resets the session and queues every module's statements followed by
    /// the entry function on a fresh thread. Interactive sessions stop
    /// before the first instruction.
    pub fn load(&mut self) {
        self.scheduler.clear();
        self.globals.clear();
        self.heap = Heap::default();
        let mut roots: Vec<Root> = self
            .program
            .modules()
            .iter()
            .filter_map(|module| module.first_stmt())
            .map(Root::Stmt)
            .collect();
        roots.extend(self.program.entry().map(Root::Function));
        tracing::debug!(roots = roots.len(), "loading program");
        self.scheduler.spawn(roots);
        if self.config.mode == RunMode::Interactive {
            self.debug.interrupt();
        }
    }

    /// Queues an extra thread on the running session.
    pub fn spawn(&mut self, roots: impl IntoIterator<Item = Root>) -> usize {
        let id = self.scheduler.spawn(roots);
        tracing::debug!(thread = id, "thread spawned");
        id
    }

    /// Loads and runs the program to completion, ignoring debugger stops.
    pub fn run(&mut self) -> Result<(), Fault> {
        self.load();
        self.run_to_completion()
    }

    pub fn run_to_completion(&mut self) -> Result<(), Fault> {
        loop {
            match self.drive()? {
                RunOutcome::Suspended => self.debug.reset_for_prompt(),
                _ => return Ok(()),
            }
        }
    }

    /// Runs the scheduler until every thread finishes or one is suspended.
    pub fn drive(&mut self) -> Result<RunOutcome, Fault> {
        let mut cx = ExecContext {
            program: self.program,
            debug: &mut self.debug,
            globals: &mut self.globals,
            heap: &mut self.heap,
            out: &mut *self.out,
        };
        let result = self.scheduler.run(&mut cx);
        result.map_err(|error| self.fault(error))
    }

    /// Runs at most `budget` instructions of the current thread.
    pub fn run_for(&mut self, budget: usize) -> Result<RunOutcome, Fault> {
        let mut cx = ExecContext {
            program: self.program,
            debug: &mut self.debug,
            globals: &mut self.globals,
            heap: &mut self.heap,
            out: &mut *self.out,
        };
        let result = self.scheduler.run_current(budget, &mut cx);
        result.map_err(|error| self.fault(error))
    }

    /// Runs the program under the debugger until the user quits. Internal
    /// errors end the session; user errors open the command loop.
    pub fn run_interactive(&mut self, input: &mut dyn LineSource) -> Result<(), Fault> {
        self.load();
        loop {
            let resume = match self.drive() {
                Ok(RunOutcome::Suspended) => self.prompt(input, false),
                Ok(_) => {
                    let _ = writeln!(self.out, "  program terminated");
                    self.prompt(input, false)
                }
                Err(fault) if fault.is_internal() => {
                    tracing::error!(error = %fault, "internal interpreter error");
                    return Err(fault);
                }
                Err(fault) => {
                    report_fault(&mut *self.out, &fault);
                    self.prompt(input, true)
                }
            };
            match resume {
                Resume::Quit => return Ok(()),
                Resume::Restart => {
                    tracing::debug!("restarting program");
                    self.load();
                }
                Resume::Continue => {
                    if self.debug.step_mode() == StepMode::None {
                        if let Some(frame) = self.scheduler.current_frame_mut() {
                            frame.clear_step_over();
                        }
                    }
                }
            }
        }
    }

    fn prompt(&mut self, input: &mut dyn LineSource, after_error: bool) -> Resume {
        let frame = self.scheduler.current_frame();
        let mut console = Console::new(
            self.program,
            &mut self.debug,
            &self.globals,
            &mut *self.out,
            input,
        );
        if after_error {
            return console.error_interactive(frame);
        }
        if frame.is_some() {
            return console.interactive(frame);
        }
        // Nothing left to run: only `run` or `quit` leave the loop.
        loop {
            match console.interactive(None) {
                Resume::Continue => continue,
                other => return other,
            }
        }
    }

    fn fault(&self, error: RuntimeError) -> Fault {
        let node = self.scheduler.current_frame().and_then(Frame::ip);
        let location = node.map(|node| self.program.node(node).location.clone());
        Fault {
            error,
            node,
            location,
        }
    }
}
