use stepwalk::{
    config::{InterpreterConfig, RunMode},
    debugger::console::EditorInput,
    runtime::Interpreter,
    tools::{
        diagnostics::emit_fault,
        samples::{self, SAMPLES},
    },
};
use std::env;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: stepwalk [run|debug] <sample>  |  stepwalk list";

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    if args.len() == 2 && args[1] == "list" {
        for sample in SAMPLES {
            println!("{:<10} {}", sample.name, sample.summary);
        }
        return;
    }

    if args.len() != 3 {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }

    let command = &args[1];
    let name = &args[2];
    let Some(sample) = samples::find(name) else {
        eprintln!("Unknown sample `{name}`. Run `stepwalk list` to see the available samples.");
        std::process::exit(1);
    };
    let program = sample.build();

    let result = match command.as_str() {
        "run" => {
            let config = InterpreterConfig::from_env(RunMode::Batch);
            Interpreter::new(&program, config).run()
        }
        "debug" => {
            let config = InterpreterConfig::from_env(RunMode::Interactive);
            let mut input = match EditorInput::new() {
                Ok(input) => input,
                Err(err) => {
                    eprintln!("Failed to open the line editor: {err}");
                    std::process::exit(1);
                }
            };
            let mut interp = Interpreter::new(&program, config);
            install_interrupt(interp.debug_state().interrupt_handle());
            interp.run_interactive(&mut input)
        }
        _ => {
            eprintln!("Invalid command. {USAGE}");
            std::process::exit(1);
        }
    };

    if let Err(fault) = result {
        emit_fault(&fault);
        std::process::exit(1);
    }
}

/// Ctrl-C drops into the debugger at the next instruction instead of
/// killing the process.
fn install_interrupt(flag: Arc<AtomicBool>) {
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!(%err, "unable to install the interrupt handler");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STEPWALK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
