use std::env;

pub const TIMESLICE_VAR: &str = "STEPWALK_TIMESLICE";
pub const TRACE_VAR: &str = "STEPWALK_TRACE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run to completion; user errors end the run.
    #[default]
    Batch,
    /// Start under the debugger and route user errors to it.
    Interactive,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InterpreterConfig {
    pub mode: RunMode,
    /// Instructions a thread runs before the scheduler rotates; 0 runs each
    /// thread until it finishes or is suspended.
    pub timeslice: usize,
    pub trace_level: u32,
}

impl InterpreterConfig {
    pub fn batch() -> Self {
        Self::default()
    }

    pub fn interactive() -> Self {
        Self {
            mode: RunMode::Interactive,
            ..Self::default()
        }
    }

    pub fn with_timeslice(mut self, timeslice: usize) -> Self {
        self.timeslice = timeslice;
        self
    }

    pub fn with_trace_level(mut self, level: u32) -> Self {
        self.trace_level = level;
        self
    }

    pub fn from_env(mode: RunMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
        .with_overrides(|key| env::var(key).ok())
    }

    /// Applies `STEPWALK_*` overrides looked up through `lookup`. Values that
    /// do not parse are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(timeslice) = parse_var(&lookup, TIMESLICE_VAR) {
            self.timeslice = timeslice;
        }
        if let Some(level) = parse_var(&lookup, TRACE_VAR) {
            self.trace_level = level;
        }
        self
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key).filter(|value| !value.trim().is_empty())?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_run_to_completion_without_tracing() {
        let config = InterpreterConfig::default();
        assert_eq!(config.mode, RunMode::Batch);
        assert_eq!(config.timeslice, 0);
        assert_eq!(config.trace_level, 0);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [(TIMESLICE_VAR, " 16 "), (TRACE_VAR, "loud")].into();
        let config = InterpreterConfig::interactive()
            .with_trace_level(2)
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.timeslice, 16);
        assert_eq!(config.trace_level, 2);
        assert_eq!(config.mode, RunMode::Interactive);
    }
}
