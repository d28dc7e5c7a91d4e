use crate::language::{ast::NodeId, span::Location};
use miette::Diagnostic;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("interpreter: accessed empty variable")]
    #[diagnostic(code(stepwalk::empty_access))]
    EmptyAccess,
    #[error("interpreter: accessed uninitialized variable")]
    #[diagnostic(code(stepwalk::uninitialized_access))]
    UninitializedAccess,
    #[error("type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code(stepwalk::type_mismatch))]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("unable to resolve call '{name}' to a single function")]
    #[diagnostic(
        code(stepwalk::unresolved_call),
        help("{candidates} visible candidate(s) accept {arity} argument(s)")
    )]
    UnresolvedCall {
        name: String,
        arity: usize,
        candidates: usize,
    },
    #[error("call to something other than function name or closure")]
    #[diagnostic(code(stepwalk::not_callable), help("callee evaluated to {found}"))]
    NotCallable { found: String },
    #[error("function `{name}` expected {expected} arguments but received {received}")]
    #[diagnostic(code(stepwalk::arity_mismatch))]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("goto target nested below source")]
    #[diagnostic(code(stepwalk::goto_nested))]
    GotoNestedBelow,
    #[error("goto target crosses nesting levels")]
    #[diagnostic(code(stepwalk::goto_crosses))]
    GotoCrossesNesting,
    #[error("goto over variable definition DefExpr({definition})")]
    #[diagnostic(code(stepwalk::goto_over_definition))]
    GotoOverDefinition { definition: NodeId },
    #[error("division by zero")]
    #[diagnostic(code(stepwalk::division_by_zero))]
    DivisionByZero,
    #[error("index {index} out of bounds for length {len}")]
    #[diagnostic(code(stepwalk::index_out_of_bounds))]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("interpreter: {message}")]
    #[diagnostic(
        code(stepwalk::internal),
        help("the program representation violates the interpreter's input contract")
    )]
    Internal { message: String },
}

impl RuntimeError {
    pub fn internal(message: impl Into<String>) -> Self {
        RuntimeError::Internal {
            message: message.into(),
        }
    }

    /// Internal errors are never recoverable; everything else is a user
    /// error that the debugger may intercept.
    pub fn is_internal(&self) -> bool {
        matches!(self, RuntimeError::Internal { .. })
    }
}

/// A runtime error pinned to the instruction that raised it.
#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{error}")]
pub struct Fault {
    pub error: RuntimeError,
    pub node: Option<NodeId>,
    pub location: Option<Location>,
}

impl Fault {
    pub fn is_internal(&self) -> bool {
        self.error.is_internal()
    }
}
