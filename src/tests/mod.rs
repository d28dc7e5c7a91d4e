mod debugger;
mod properties;

use crate::config::InterpreterConfig;
use crate::language::ast::Program;
use crate::runtime::Interpreter;
use std::{cell::RefCell, io, rc::Rc};

/// Output sink the test keeps a handle to after the session takes it.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn session(program: &Program, config: InterpreterConfig) -> (Interpreter<'_>, SharedBuffer) {
    let out = SharedBuffer::default();
    let interp = Interpreter::new(program, config).with_output(out.clone());
    (interp, out)
}

pub(crate) fn sample(name: &str) -> Program {
    match crate::tools::samples::find(name) {
        Some(sample) => sample.build(),
        None => panic!("no sample named {name}"),
    }
}
