pub mod call;
pub mod environment;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod primitive;
pub mod scheduler;
pub mod value;

pub use interpreter::Interpreter;
