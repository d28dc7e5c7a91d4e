pub mod diagnostics;
pub mod samples;
