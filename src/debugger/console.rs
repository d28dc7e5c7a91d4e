use crate::debugger::{
    command::{parse_command, Command, PrintTarget, TraceSetting, USAGE},
    DebugState, StepMode,
};
use crate::language::{
    ast::{NodeId, NodeKind, Program},
    view,
};
use crate::runtime::{environment::Environment, frame::Frame, value::Slot};
use std::collections::VecDeque;
use std::io::Write;

pub const PROMPT: &str = "(stepwalk) ";

/// Where debugger commands come from.
pub trait LineSource {
    /// Next command line, or `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Fixed command script.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Line editor with history for terminal sessions.
pub struct EditorInput {
    editor: rustyline::DefaultEditor,
}

impl EditorInput {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: rustyline::DefaultEditor::new()?,
        })
    }
}

impl LineSource for EditorInput {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Some(line)
            }
            Err(err) => {
                tracing::debug!(%err, "input closed");
                None
            }
        }
    }
}

/// What the session should do after the command loop returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    Continue,
    Restart,
    Quit,
}

pub struct Console<'a> {
    program: &'a Program,
    state: &'a mut DebugState,
    globals: &'a Environment,
    out: &'a mut dyn Write,
    input: &'a mut dyn LineSource,
}

impl<'a> Console<'a> {
    pub fn new(
        program: &'a Program,
        state: &'a mut DebugState,
        globals: &'a Environment,
        out: &'a mut dyn Write,
        input: &'a mut dyn LineSource,
    ) -> Self {
        Self {
            program,
            state,
            globals,
            out,
            input,
        }
    }

    /// Shows where execution stopped and reads commands until one resumes.
    pub fn interactive(&mut self, frame: Option<&Frame>) -> Resume {
        if let Some(frame) = frame {
            if let Some(ip) = frame.ip() {
                self.show_in(frame, ip, frame.stage());
            }
        }
        loop {
            self.state.reset_for_prompt();
            let _ = self.out.flush();
            let Some(line) = self.input.read_line(PROMPT) else {
                return Resume::Quit;
            };
            let line = if line.trim().is_empty() {
                self.state.last_command.clone()
            } else {
                self.state.last_command = line.trim().to_string();
                line
            };
            match parse_command(&line) {
                Command::Empty => {}
                Command::Help => self.say(USAGE),
                Command::Quit => return Resume::Quit,
                Command::Continue => {
                    if self.check_running(frame).is_some() {
                        return Resume::Continue;
                    }
                }
                Command::Step => {
                    if self.check_running(frame).is_some() {
                        self.state.arm(StepMode::Single);
                        return Resume::Continue;
                    }
                }
                Command::Next => {
                    if self.check_running(frame).is_some() {
                        self.state.arm(StepMode::Next);
                        return Resume::Continue;
                    }
                }
                Command::Print { target, show_ids } => self.print(frame, target, show_ids),
                Command::Where => self.where_(frame),
                Command::Stack => self.stack(frame),
                Command::Locals => self.locals(frame),
                Command::Break(id) => self.add_break(id),
                Command::BreakRemove(id) => self.remove_break(id),
                Command::Info => self.info(),
                Command::Trace(setting) => self.trace(setting),
                Command::Run => return Resume::Restart,
                Command::Unknown(_) => {
                    self.say("  unknown command");
                    self.say(USAGE);
                }
            }
        }
    }

    /// Command loop after a user error: the faulting frame cannot resume.
    pub fn error_interactive(&mut self, frame: Option<&Frame>) -> Resume {
        loop {
            match self.interactive(frame) {
                Resume::Continue => self.say("  unable to continue from error"),
                other => return other,
            }
        }
    }

    fn say(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    fn check_running<'f>(&mut self, frame: Option<&'f Frame>) -> Option<&'f Frame> {
        if frame.is_none() {
            self.say("    error: no running program");
        }
        frame
    }

    fn stage_suffix(stage: u32) -> String {
        if stage > 0 {
            format!("/{stage}")
        } else {
            String::new()
        }
    }

    fn show(&mut self, node: NodeId, stage: u32) {
        let line = self.describe_node(node, stage);
        let location = &self.program.node(node).location;
        let _ = writeln!(self.out, "    {line} {location}");
        self.state.remember(node);
    }

    fn show_in(&mut self, frame: &Frame, node: NodeId, stage: u32) {
        let line = self.describe_node(node, stage);
        let function = frame
            .function()
            .map(|function| self.program.display_name(function))
            .unwrap_or_else(|| "<initialization>".to_string());
        let location = &self.program.node(node).location;
        let _ = writeln!(self.out, "    {line} in {function} {location}");
        self.state.remember(node);
    }

    fn describe_node(&self, node: NodeId, stage: u32) -> String {
        format!(
            "{}({}){}",
            self.program.node(node).kind.name(),
            node,
            Self::stage_suffix(stage)
        )
    }

    fn describe_slot(&mut self, slot: &Slot) -> String {
        match slot {
            Slot::Symbol(symbol) => {
                self.state.remember(*symbol);
                format!(
                    "symbol: {} {}({})",
                    self.program.node(*symbol).kind.name(),
                    self.program.display_name(*symbol),
                    symbol
                )
            }
            other => other.to_string(),
        }
    }

    fn where_(&mut self, frame: Option<&Frame>) {
        let Some(frame) = self.check_running(frame) else {
            return;
        };
        let chain = frame.continuation();
        let last = chain.len().saturating_sub(1);
        for (position, (node, stage)) in chain.into_iter().enumerate() {
            if position == last {
                self.show_in(frame, node, stage);
            } else {
                self.show(node, stage);
            }
        }
        let mut caller = frame.parent();
        while let Some(current) = caller {
            match current.ip() {
                Some(ip) => self.show_in(current, ip, current.stage()),
                None => self.say("    error: bad stack frame"),
            }
            caller = current.parent();
        }
    }

    fn stack(&mut self, frame: Option<&Frame>) {
        let Some(frame) = self.check_running(frame) else {
            return;
        };
        self.say("  value stack:");
        for cell in frame.val_stack().iter().rev() {
            let text = self.describe_slot(&cell.borrow());
            let _ = writeln!(self.out, "    {text}");
        }
    }

    fn locals(&mut self, frame: Option<&Frame>) {
        let Some(frame) = self.check_running(frame) else {
            return;
        };
        self.say("  local symbols:");
        self.symbols(frame.env());
        if !self.globals.is_empty() {
            self.say("  global symbols:");
            self.symbols(self.globals);
        }
    }

    fn symbols(&mut self, env: &Environment) {
        for (node, cell) in env.sorted() {
            if !matches!(self.program.node(node).kind, NodeKind::Symbol(_)) {
                continue;
            }
            let text = self.describe_slot(&cell.borrow());
            let name = self.program.display_name(node);
            let _ = writeln!(self.out, "    {name}({node}) = {text}");
            self.state.remember(node);
        }
    }

    fn find_symbol(&self, env: &Environment, name: &str) -> Option<NodeId> {
        env.sorted().into_iter().map(|(node, _)| node).find(|node| {
            self.program
                .symbol(*node)
                .map_or(false, |symbol| symbol.name == name)
        })
    }

    fn print(&mut self, frame: Option<&Frame>, target: Option<PrintTarget>, show_ids: bool) {
        let node = match target {
            None => match self.state.last_print {
                Some(node) => node,
                None => return self.say("  no previous print"),
            },
            Some(PrintTarget::Id(0)) => return self.say(USAGE),
            Some(PrintTarget::Id(raw)) => match self.state.resolve_id(self.program, raw) {
                Some(node) => node,
                None => {
                    let _ = writeln!(self.out, "  unknown id: {raw}");
                    return;
                }
            },
            Some(PrintTarget::Name(name)) => {
                let Some(frame) = self.check_running(frame) else {
                    return;
                };
                match self
                    .find_symbol(frame.env(), &name)
                    .or_else(|| self.find_symbol(self.globals, &name))
                {
                    Some(node) => node,
                    None => {
                        let _ = writeln!(self.out, "  unknown local: {name}");
                        return;
                    }
                }
            }
        };
        self.state.last_print = Some(node);
        let rendered = view::render(self.program, node, show_ids);
        let name = self.program.display_name(node);
        let _ = writeln!(self.out, "{rendered}");
        let _ = write!(self.out, " {name} ");
        let value = frame
            .and_then(|frame| frame.env().get(node))
            .or_else(|| self.globals.get(node));
        match value {
            Some(cell) => {
                let text = self.describe_slot(&cell.borrow());
                let _ = writeln!(self.out, "= {text}");
            }
            None => {
                let _ = writeln!(self.out);
            }
        }
    }

    fn add_break(&mut self, id: Option<u32>) {
        let Some(raw) = id.filter(|raw| *raw > 0) else {
            return self.say("  please provide a valid id");
        };
        match self.state.resolve_id(self.program, raw) {
            Some(node) => {
                self.state.add_breakpoint(node);
                let line = self.describe_node(node, 0);
                let location = &self.program.node(node).location;
                let _ = writeln!(self.out, "  breaking at {line} {location}");
            }
            None => {
                let _ = writeln!(self.out, "  unable to break at unknown id {raw}");
            }
        }
    }

    fn remove_break(&mut self, raw: u32) {
        let removed = NodeId::from_raw(raw).map_or(false, |node| self.state.remove_breakpoint(node));
        if removed {
            let _ = writeln!(self.out, "  removing bi {raw}");
        } else {
            let _ = writeln!(self.out, "  bi {raw} not found");
        }
    }

    fn info(&mut self) {
        self.say("  break ids:");
        let ids: Vec<NodeId> = self.state.breakpoints().collect();
        for id in ids {
            let _ = writeln!(self.out, "    bi {id}");
        }
    }

    fn trace(&mut self, setting: TraceSetting) {
        let level = match setting {
            TraceSetting::Toggle => u32::from(self.state.trace_level() == 0),
            TraceSetting::On => 1,
            TraceSetting::Off => 0,
            TraceSetting::Level(level) => level,
        };
        self.state.set_trace_level(level);
        let _ = writeln!(self.out, "  tracing level set to {level}");
    }
}
