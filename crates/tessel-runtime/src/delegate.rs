//! Delegation tables for classes wrapping a native value
//!
//! A class that inherits from a native type holds an instance of it in its
//! `__value` attribute. Every slot the class does not override forwards to
//! that instance.

use crate::method::Namespace;
use crate::vtable::{BaseTables, Handler, Op, VTable};

/// How much of the table to rewire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationMode {
    /// Rewire every slot
    Full,
    /// Only restore slots the class overrides; the inherited table already
    /// forwards the rest
    Partial,
}

/// Rewires a per-instance table for delegation
pub struct DelegationVTableBuilder<'a> {
    base: &'a BaseTables,
    namespaces: &'a [Namespace],
}

impl<'a> DelegationVTableBuilder<'a> {
    /// Create a builder; `namespaces` are the MRO's namespaces, class first
    pub fn new(base: &'a BaseTables, namespaces: &'a [Namespace]) -> Self {
        Self { base, namespaces }
    }

    /// Check if any namespace along the MRO overrides `op`
    pub fn has_override(&self, op: Op) -> bool {
        self.namespaces
            .iter()
            .any(|ns| ns.find_slot_override(op).is_some())
    }

    /// Rewire `table`, returning the number of forwarding slots
    pub fn build(&self, table: &mut VTable, mode: DelegationMode) -> usize {
        let object = &self.base.object;
        let default = &self.base.default_object;
        let read_only = object.read_only_variant();

        for op in Op::ALL.iter().copied() {
            let object_slot = object.slot(op);
            let ro_object_slot = read_only.map(|ro| ro.slot(op)).unwrap_or(object_slot);

            if self.has_override(op) {
                table.set_slot(op, object_slot);
                table.set_read_only_slot(op, ro_object_slot);
                continue;
            }
            if mode == DelegationMode::Partial {
                continue;
            }

            if default.slot(op) == object_slot {
                table.set_slot(op, Handler::Forward);
                let ro_slot = if op.is_mutating() {
                    Handler::ReadOnly
                } else {
                    Handler::Forward
                };
                table.set_read_only_slot(op, ro_slot);
            } else {
                // already customised by the object table
                table.set_slot(op, object_slot);
                table.set_read_only_slot(op, ro_object_slot);
            }
        }

        table.count(Handler::Forward)
    }
}
