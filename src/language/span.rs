use std::fmt;
use std::rc::Rc;

/// Source position carried by every node. Only what the debugger needs to
/// print a location tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<Rc<str>>,
    pub line: u32,
}

impl Location {
    pub fn new(file: Option<Rc<str>>, line: u32) -> Self {
        Self { file, line }
    }

    pub fn is_known(&self) -> bool {
        self.file.is_some() || self.line != 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("<>");
        write!(f, "{}:{}", file, self.line)
    }
}
