pub mod ast;
pub mod builder;
pub mod span;
pub mod view;
