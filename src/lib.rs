#![allow(clippy::collapsible_if)]

pub mod config;
pub mod debugger;
pub mod language;
pub mod runtime;
pub mod tools;

#[cfg(test)]
mod tests;
