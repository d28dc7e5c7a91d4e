use crate::language::ast::NodeId;
use crate::runtime::value::{Slot, SlotRef};
use std::collections::HashMap;
use std::rc::Rc;

/// Binding environment keyed by node identity. Symbol nodes map to variable
/// cells; expression nodes map to the cell holding their last result.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    bindings: HashMap<NodeId, SlotRef>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cell for `node`, created empty on first access.
    pub fn slot(&mut self, node: NodeId) -> SlotRef {
        self.bindings
            .entry(node)
            .or_insert_with(|| Slot::Empty.new_ref())
            .clone()
    }

    pub fn get(&self, node: NodeId) -> Option<SlotRef> {
        self.bindings.get(&node).cloned()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.bindings.contains_key(&node)
    }

    /// Replaces the binding with a fresh cell holding `value`.
    pub fn declare(&mut self, node: NodeId, value: Slot) -> SlotRef {
        let cell = value.new_ref();
        self.bindings.insert(node, Rc::clone(&cell));
        cell
    }

    /// Writes `value` into the existing cell, creating it if needed.
    pub fn assign(&mut self, node: NodeId, value: Slot) {
        *self.slot(node).borrow_mut() = value;
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in id order.
    pub fn sorted(&self) -> Vec<(NodeId, SlotRef)> {
        let mut entries: Vec<(NodeId, SlotRef)> = self
            .bindings
            .iter()
            .map(|(id, cell)| (*id, Rc::clone(cell)))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}
