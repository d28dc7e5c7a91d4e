use crate::runtime::error::Fault;
use miette::Report;
use std::io::Write;

/// Console form of a fault, written where the session writes its output.
pub fn report_fault(out: &mut dyn Write, fault: &Fault) {
    let _ = writeln!(out, "error: {}", fault.error);
    if let Some(location) = fault.location.as_ref().filter(|location| location.is_known()) {
        let _ = writeln!(out, "at {location}");
    }
}

/// Fatal fault reporting for the binary.
pub fn emit_fault(fault: &Fault) {
    match &fault.location {
        Some(location) => eprintln!("Runtime error at {location}:"),
        None => eprintln!("Runtime error:"),
    }
    eprintln!("{:?}", Report::new(fault.error.clone()));
}
