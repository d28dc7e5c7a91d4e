use crate::language::ast::{Immediate, NodeId};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable value cell. Expressions publish their results into the
/// cell bound to their node, and operand stacks hold references to cells.
pub type SlotRef = Rc<RefCell<Slot>>;

pub type ObjectRef = Rc<RefCell<Object>>;

#[derive(Clone, Debug, Default)]
pub enum Slot {
    #[default]
    Empty,
    Uninitialized,
    Immediate(Immediate),
    Symbol(NodeId),
    Selector(String),
    Closure(Closure),
    Object(ObjectRef),
}

impl Slot {
    pub fn new_ref(self) -> SlotRef {
        Rc::new(RefCell::new(self))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Slot::Empty => "empty",
            Slot::Uninitialized => "uninitialized",
            Slot::Immediate(imm) => imm.type_name(),
            Slot::Symbol(_) => "symbol",
            Slot::Selector(_) => "selector",
            Slot::Closure(_) => "closure",
            Slot::Object(_) => "object",
        }
    }

    /// Rejects reads of empty and uninitialized cells.
    pub fn check_initialized(&self) -> RuntimeResult<&Slot> {
        match self {
            Slot::Empty => Err(RuntimeError::EmptyAccess),
            Slot::Uninitialized => Err(RuntimeError::UninitializedAccess),
            other => Ok(other),
        }
    }

    pub fn expect_bool(&self) -> RuntimeResult<bool> {
        match self.check_initialized()? {
            Slot::Immediate(Immediate::Bool(value)) => Ok(*value),
            other => Err(RuntimeError::TypeMismatch {
                expected: "bool",
                found: other.kind_name().to_string(),
            }),
        }
    }

    pub fn expect_int(&self) -> RuntimeResult<i64> {
        match self.check_initialized()? {
            Slot::Immediate(Immediate::Int(value)) => Ok(*value),
            other => Err(RuntimeError::TypeMismatch {
                expected: "int",
                found: other.kind_name().to_string(),
            }),
        }
    }

    pub fn expect_object(&self) -> RuntimeResult<ObjectRef> {
        match self.check_initialized()? {
            Slot::Object(object) => Ok(object.clone()),
            other => Err(RuntimeError::TypeMismatch {
                expected: "object",
                found: other.kind_name().to_string(),
            }),
        }
    }
}

impl From<Immediate> for Slot {
    fn from(value: Immediate) -> Self {
        Slot::Immediate(value)
    }
}

/// Copies the contents of a cell into a fresh cell.
pub fn snapshot(slot: &SlotRef) -> SlotRef {
    slot.borrow().clone().new_ref()
}

#[derive(Clone, Debug)]
pub struct Closure {
    pub function: NodeId,
    pub captured: Vec<(NodeId, SlotRef)>,
}

#[derive(Debug)]
pub struct Object {
    pub id: u32,
    pub type_name: String,
    pub slots: Vec<Slot>,
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name)?;
        for (idx, slot) in self.slots.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", DisplayValue(slot))?;
        }
        write!(f, ")")
    }
}

/// Allocates heap instances. Instances are reference counted and reclaimed
/// once nothing reaches them; the heap only hands out identities.
#[derive(Debug, Default)]
pub struct Heap {
    next_id: u32,
}

impl Heap {
    pub fn allocate(&mut self, type_name: &str, slots: Vec<Slot>) -> ObjectRef {
        self.next_id += 1;
        Rc::new(RefCell::new(Object {
            id: self.next_id,
            type_name: type_name.to_string(),
            slots,
        }))
    }
}

/// Debugger rendering: kind tag plus payload.
impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => write!(f, "<empty>"),
            Slot::Uninitialized => write!(f, "<uninitialized>"),
            Slot::Selector(name) => write!(f, "selector '{name}'"),
            Slot::Symbol(id) => write!(f, "symbol: ({id})"),
            Slot::Closure(closure) => write!(f, "closure: ({})", closure.function),
            Slot::Object(object) => write!(f, "object: {}", object.borrow().id),
            Slot::Immediate(imm) => write!(f, "immediate: {imm}"),
        }
    }
}

/// Program-facing rendering used by `print`: just the value.
pub struct DisplayValue<'a>(pub &'a Slot);

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Slot::Immediate(Immediate::Str(s)) => write!(f, "{s}"),
            Slot::Immediate(imm) => write!(f, "{imm}"),
            Slot::Object(object) => write!(f, "{}", object.borrow()),
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_uninitialized_reads_are_errors() {
        assert_eq!(Slot::Empty.expect_bool(), Err(RuntimeError::EmptyAccess));
        assert_eq!(
            Slot::Uninitialized.expect_int(),
            Err(RuntimeError::UninitializedAccess)
        );
    }

    #[test]
    fn non_boolean_condition_is_a_type_mismatch() {
        let err = Slot::Immediate(Immediate::Int(1)).expect_bool().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                expected: "bool",
                found: "int".into()
            }
        );
        assert!(!err.is_internal());
    }

    #[test]
    fn snapshot_detaches_from_the_source_cell() {
        let cell = Slot::Immediate(Immediate::Int(1)).new_ref();
        let copy = snapshot(&cell);
        *cell.borrow_mut() = Slot::Empty;
        assert_eq!(copy.borrow().expect_int(), Ok(1));
    }

    #[test]
    fn heap_objects_get_distinct_ids() {
        let mut heap = Heap::default();
        let a = heap.allocate("tuple", Vec::new());
        let b = heap.allocate("tuple", vec![Slot::Immediate(Immediate::Int(3))]);
        assert_ne!(a.borrow().id, b.borrow().id);
        assert_eq!(b.borrow().to_string(), "tuple(3)");
    }
}
