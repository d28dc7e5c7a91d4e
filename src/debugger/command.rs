use nom::{
    IResult, Parser as NomParser,
    bytes::complete::take_till1,
    character::complete::{digit1, space0},
    combinator::{map_res, recognize},
    sequence::preceded,
};

/// Command words in match priority: an abbreviation selects the first word
/// it is a prefix of, so `s` is `step` and `n` is `next`.
pub const COMMANDS: [&str; 17] = [
    "help", "?", "quit", "continue", "step", "next", "print", "nprint", "where", "stack",
    "locals", "bi", "birm", "info", "trace", "run", "exit",
];

pub const USAGE: &str = "\
  commands:
    help, ?          show this message
    quit, exit       leave the interpreter
    continue         resume execution
    step             execute one instruction
    next             execute one instruction, stepping over calls
    print [id|name]  show a node and its value (no argument repeats)
    nprint [id|name] same as print, annotating nodes with ids
    where            show the current continuation and callers
    stack            show the operand stack of the current frame
    locals           show the variables of the current frame
    bi id            break at node id
    birm id          remove the break at node id
    info             list breakpoints
    trace [level|true|false]
                     set or toggle instruction tracing
    run              restart the program";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintTarget {
    Id(u32),
    Name(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceSetting {
    Toggle,
    On,
    Off,
    Level(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Quit,
    Continue,
    Step,
    Next,
    Print {
        target: Option<PrintTarget>,
        show_ids: bool,
    },
    Where,
    Stack,
    Locals,
    /// Unparsable ids are carried as `None`.
    Break(Option<u32>),
    /// Unparsable ids read as 0, which never names a breakpoint.
    BreakRemove(u32),
    Info,
    Trace(TraceSetting),
    Run,
    Unknown(String),
}

fn word(input: &str) -> IResult<&str, &str> {
    preceded(space0, take_till1(|c: char| c.is_whitespace())).parse(input)
}

fn number(input: &str) -> IResult<&str, u32> {
    preceded(space0, map_res(recognize(digit1), |s: &str| s.parse::<u32>())).parse(input)
}

/// Leading decimal digits of `arg`, if any.
fn leading_number(arg: &str) -> Option<u32> {
    number(arg).ok().map(|(_, value)| value)
}

/// Whether `word` abbreviates `command` (case-insensitive prefix).
pub fn abbreviates(word: &str, command: &str) -> bool {
    !word.is_empty()
        && word.len() <= command.len()
        && command.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes())
}

pub fn parse_command(line: &str) -> Command {
    let Ok((rest, head)) = word(line) else {
        return Command::Empty;
    };
    let arg = rest.trim();
    let Some(name) = COMMANDS.iter().find(|command| abbreviates(head, command)) else {
        return Command::Unknown(head.to_string());
    };
    match *name {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "continue" => Command::Continue,
        "step" => Command::Step,
        "next" => Command::Next,
        "print" => Command::Print {
            target: print_target(arg),
            show_ids: false,
        },
        "nprint" => Command::Print {
            target: print_target(arg),
            show_ids: true,
        },
        "where" => Command::Where,
        "stack" => Command::Stack,
        "locals" => Command::Locals,
        "bi" => Command::Break(leading_number(arg)),
        "birm" => Command::BreakRemove(leading_number(arg).unwrap_or(0)),
        "info" => Command::Info,
        "trace" => Command::Trace(trace_setting(arg)),
        "run" => Command::Run,
        other => Command::Unknown(other.to_string()),
    }
}

fn print_target(arg: &str) -> Option<PrintTarget> {
    let (_, token) = word(arg).ok()?;
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(PrintTarget::Id(leading_number(token).unwrap_or(0)));
    }
    Some(PrintTarget::Name(token.to_string()))
}

fn trace_setting(arg: &str) -> TraceSetting {
    let Ok((_, token)) = word(arg) else {
        return TraceSetting::Toggle;
    };
    if abbreviates(token, "true") {
        TraceSetting::On
    } else if abbreviates(token, "false") {
        TraceSetting::Off
    } else {
        TraceSetting::Level(leading_number(token).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_follow_priority() {
        assert_eq!(parse_command("s"), Command::Step);
        assert_eq!(parse_command("n"), Command::Next);
        assert_eq!(parse_command("c"), Command::Continue);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("e"), Command::Quit);
        assert_eq!(parse_command("b 4"), Command::Break(Some(4)));
        assert_eq!(parse_command("bir 4"), Command::BreakRemove(4));
        assert_eq!(parse_command("r"), Command::Run);
        assert_eq!(parse_command("t"), Command::Trace(TraceSetting::Toggle));
    }

    #[test]
    fn commands_are_case_insensitive_and_trimmed() {
        assert_eq!(parse_command("   WHERE  "), Command::Where);
        assert_eq!(parse_command("Locals"), Command::Locals);
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("   "), Command::Empty);
    }

    #[test]
    fn print_targets() {
        assert_eq!(
            parse_command("print 12"),
            Command::Print {
                target: Some(PrintTarget::Id(12)),
                show_ids: false
            }
        );
        assert_eq!(
            parse_command("np count"),
            Command::Print {
                target: Some(PrintTarget::Name("count".into())),
                show_ids: true
            }
        );
        assert_eq!(
            parse_command("p"),
            Command::Print {
                target: None,
                show_ids: false
            }
        );
        assert_eq!(
            parse_command("print 0"),
            Command::Print {
                target: Some(PrintTarget::Id(0)),
                show_ids: false
            }
        );
    }

    #[test]
    fn break_ids_that_do_not_parse() {
        assert_eq!(parse_command("bi"), Command::Break(None));
        assert_eq!(parse_command("bi x"), Command::Break(None));
        assert_eq!(parse_command("birm"), Command::BreakRemove(0));
    }

    #[test]
    fn trace_arguments() {
        assert_eq!(parse_command("trace tr"), Command::Trace(TraceSetting::On));
        assert_eq!(parse_command("trace F"), Command::Trace(TraceSetting::Off));
        assert_eq!(parse_command("trace 3"), Command::Trace(TraceSetting::Level(3)));
        assert_eq!(parse_command("trace ?"), Command::Trace(TraceSetting::Level(0)));
    }

    #[test]
    fn unknown_words() {
        assert_eq!(parse_command("xyzzy"), Command::Unknown("xyzzy".into()));
        assert_eq!(parse_command("stepper"), Command::Unknown("stepper".into()));
    }
}
