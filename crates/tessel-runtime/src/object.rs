//! Class instances
//!
//! An object holds its class id, the per-instance operation table it was
//! created with and a flat array of attribute slots sized by the class layout.

use crate::error::{ObjectError, ObjectResult};
use crate::registry::TypeId;
use crate::value::Value;
use crate::vtable::{Handler, Op, VTable};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared object reference
pub type ObjectRef = Arc<Object>;

/// A class instance
pub struct Object {
    class: TypeId,
    vtable: RwLock<Arc<VTable>>,
    slots: RwLock<Vec<Value>>,
    is_instance: AtomicBool,
    read_only: AtomicBool,
}

impl Object {
    /// Allocate an object with `slot_count` null attribute slots
    pub fn new(class: TypeId, vtable: Arc<VTable>, slot_count: usize) -> Self {
        Self {
            class,
            vtable: RwLock::new(vtable),
            slots: RwLock::new(vec![Value::Null; slot_count]),
            is_instance: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
        }
    }

    /// Owning class
    pub fn class(&self) -> TypeId {
        self.class
    }

    /// Operation table installed at instantiation
    pub fn vtable(&self) -> Arc<VTable> {
        self.vtable.read().clone()
    }

    /// Handler for `op`, honouring the read-only flag
    pub fn handler(&self, op: Op) -> Handler {
        let table = self.vtable.read();
        if self.is_read_only() {
            if let Some(ro) = table.read_only_variant() {
                return ro.slot(op);
            }
        }
        table.slot(op)
    }

    /// Number of attribute slots
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Read an attribute slot
    pub fn slot(&self, index: usize) -> ObjectResult<Value> {
        self.slots
            .read()
            .get(index)
            .cloned()
            .ok_or_else(|| ObjectError::attribute_index(index))
    }

    /// Write an attribute slot
    pub fn set_slot(&self, index: usize, value: Value) -> ObjectResult<()> {
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| ObjectError::attribute_index(index))?;
        *slot = value;
        Ok(())
    }

    /// Copy of every attribute slot
    pub fn slots(&self) -> Vec<Value> {
        self.slots.read().clone()
    }

    /// Mark as a first-class instance
    pub fn mark_instance(&self) {
        self.is_instance.store(true, Ordering::Release);
    }

    /// Check if instantiation completed its setup steps
    pub fn is_instance(&self) -> bool {
        self.is_instance.load(Ordering::Acquire)
    }

    /// Switch the object to its read-only table variant
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    /// Check the read-only flag
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Shallow copy sharing the table and slot values
    pub fn shallow_clone(&self) -> Object {
        let copy = Object {
            class: self.class,
            vtable: RwLock::new(self.vtable()),
            slots: RwLock::new(self.slots()),
            is_instance: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
        };
        if self.is_instance() {
            copy.mark_instance();
        }
        copy
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("slots", &self.slot_count())
            .field("is_instance", &self.is_instance())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Arc<VTable> {
        Arc::new(
            VTable::filled(TypeId::from_raw(0), Handler::Override).with_read_only_variant(),
        )
    }

    #[test]
    fn test_slots_start_null() {
        let obj = Object::new(TypeId::from_raw(0), table(), 3);
        assert_eq!(obj.slot_count(), 3);
        assert!(obj.slots().iter().all(Value::is_null));
        assert!(!obj.is_instance());
    }

    #[test]
    fn test_slot_bounds() {
        let obj = Object::new(TypeId::from_raw(0), table(), 1);
        obj.set_slot(0, Value::Int(5)).unwrap();
        assert_eq!(obj.slot(0).unwrap(), Value::Int(5));
        assert_eq!(
            obj.slot(1).unwrap_err().to_string(),
            "No such attribute #1"
        );
        assert!(obj.set_slot(4, Value::Null).is_err());
    }

    #[test]
    fn test_read_only_uses_variant() {
        let obj = Object::new(TypeId::from_raw(0), table(), 0);
        assert_eq!(obj.handler(Op::SetAttrStr), Handler::Override);
        obj.set_read_only(true);
        assert_eq!(obj.handler(Op::SetAttrStr), Handler::ReadOnly);
        assert_eq!(obj.handler(Op::GetAttrStr), Handler::Override);
    }

    #[test]
    fn test_shallow_clone_copies_slots() {
        let obj = Object::new(TypeId::from_raw(0), table(), 2);
        obj.set_slot(1, Value::str("x")).unwrap();
        obj.mark_instance();
        let copy = obj.shallow_clone();
        assert_eq!(copy.slot(1).unwrap(), Value::str("x"));
        assert!(copy.is_instance());
        copy.set_slot(1, Value::Null).unwrap();
        assert_eq!(obj.slot(1).unwrap(), Value::str("x"));
    }
}
