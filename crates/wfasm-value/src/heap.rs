//! The VM heap (spec §3): a mapping from stable integer IDs to ref-cells.
//! Allocation IDs are part of serialized state and must stay stable across
//! a suspend/resume round-trip, so allocation is a monotonic counter rather
//! than reusing freed slots.

use std::collections::HashMap;

use crate::error::ValueError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(pub u64);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Cell {
    value: Value,
    refcount: u32,
}

/// Reference-counted heap of cells addressable by stable [`HeapId`]s.
///
/// Used to back CALLABLE.CLOSURE upvalues. The interpreter's core opcode set
/// has no explicit alloc/dispose opcode (spec §4.1 lists none), so cells are
/// created and released only through the closure-creation and frame-pop
/// paths in `wfasm-vm`; this type just provides the storage and bookkeeping.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Heap {
    cells: HashMap<HeapId, Cell>,
    next_id: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self { cells: HashMap::new(), next_id: 0 }
    }

    pub fn alloc(&mut self, value: Value) -> HeapId {
        let id = HeapId(self.next_id);
        self.next_id += 1;
        self.cells.insert(id, Cell { value, refcount: 1 });
        id
    }

    pub fn get(&self, id: HeapId) -> Option<&Value> {
        self.cells.get(&id).map(|c| &c.value)
    }

    pub fn get_mut(&mut self, id: HeapId) -> Option<&mut Value> {
        self.cells.get_mut(&id).map(|c| &mut c.value)
    }

    /// Like [`Heap::get`], but for callers that treat a missing cell as host
    /// misuse (a heap id that outlived its cell, or was never allocated by
    /// this heap) rather than a routine "maybe absent" lookup.
    pub fn require(&self, id: HeapId) -> Result<&Value, ValueError> {
        self.get(id).ok_or(ValueError::HeapIdNotFound(id))
    }

    pub fn set(&mut self, id: HeapId, value: Value) -> bool {
        if let Some(cell) = self.cells.get_mut(&id) {
            cell.value = value;
            true
        } else {
            false
        }
    }

    /// Like [`Heap::set`], surfacing a missing cell as [`ValueError`]
    /// instead of a bare `bool`.
    pub fn set_checked(&mut self, id: HeapId, value: Value) -> Result<(), ValueError> {
        if self.set(id, value) {
            Ok(())
        } else {
            Err(ValueError::HeapIdNotFound(id))
        }
    }

    pub fn refcount(&self, id: HeapId) -> Option<u32> {
        self.cells.get(&id).map(|c| c.refcount)
    }

    /// Increments the refcount of `id`, returning `false` if it does not
    /// (or no longer) exist.
    pub fn incref(&mut self, id: HeapId) -> bool {
        if let Some(cell) = self.cells.get_mut(&id) {
            cell.refcount += 1;
            true
        } else {
            false
        }
    }

    /// Decrements the refcount of `id`, disposing the cell when it reaches
    /// zero. Returns `true` if the cell was disposed.
    pub fn decref(&mut self, id: HeapId) -> bool {
        let Some(cell) = self.cells.get_mut(&id) else { return false };
        cell.refcount = cell.refcount.saturating_sub(1);
        if cell.refcount == 0 {
            self.cells.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcounting_disposes_at_zero() {
        let mut heap = Heap::new();
        let id = heap.alloc(Value::Int64(42));
        assert_eq!(heap.refcount(id), Some(1));
        heap.incref(id);
        assert_eq!(heap.refcount(id), Some(2));
        assert!(!heap.decref(id));
        assert!(heap.decref(id));
        assert!(heap.get(id).is_none());
    }

    #[test]
    fn checked_accessors_report_a_stale_heap_id() {
        let mut heap = Heap::new();
        let id = heap.alloc(Value::Int64(1));
        heap.decref(id);
        assert_eq!(heap.require(id), Err(ValueError::HeapIdNotFound(id)));
        assert_eq!(heap.set_checked(id, Value::Int64(2)), Err(ValueError::HeapIdNotFound(id)));
    }

    #[test]
    fn ids_stay_stable_across_allocations() {
        let mut heap = Heap::new();
        let a = heap.alloc(Value::Int64(1));
        let b = heap.alloc(Value::Int64(2));
        assert_ne!(a, b);
        assert_eq!(heap.get(a), Some(&Value::Int64(1)));
        assert_eq!(heap.get(b), Some(&Value::Int64(2)));
    }
}
