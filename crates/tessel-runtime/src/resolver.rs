//! Direct method resolution
//!
//! Walks a class's MRO front to back and returns the first namespace hit. This
//! is the slow path behind the method cache and the only path for transient
//! names.

use crate::error::ObjectResult;
use crate::method::Method;
use crate::registry::{TypeId, TypeRegistry};
use crate::vtable::Op;
use tracing::trace;

/// Resolves method names against the type registry
#[derive(Debug, Clone, Copy)]
pub struct MethodResolver<'a> {
    registry: &'a TypeRegistry,
    trace: bool,
}

impl<'a> MethodResolver<'a> {
    /// Create a resolver; `trace` emits an event for every MRO step
    pub fn new(registry: &'a TypeRegistry, trace: bool) -> Self {
        Self { registry, trace }
    }

    /// Find `name` in the first namespace along the MRO that defines it
    ///
    /// A miss on `__get_string` retries once with `__get_repr`.
    pub fn resolve_direct(&self, class: TypeId, name: &str) -> ObjectResult<Option<Method>> {
        if let Some(method) = self.walk(class, name)? {
            return Ok(Some(method));
        }
        if name == Op::GetString.slot_name() {
            return self.walk(class, Op::GetRepr.slot_name());
        }
        Ok(None)
    }

    /// Find the user override of `op` anywhere along the MRO
    ///
    /// Matches methods tagged with the op and methods named after its slot.
    /// Used while building tables and by the `Override` handler; never cached.
    pub fn find_vtable_override(&self, class: TypeId, op: Op) -> ObjectResult<Option<Method>> {
        let mro = self.registry.entry(class)?.mro();
        for ancestor in mro.iter() {
            let entry = self.registry.entry(*ancestor)?;
            if let Some(method) = entry.namespace().find_slot_override(op) {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    fn walk(&self, class: TypeId, name: &str) -> ObjectResult<Option<Method>> {
        let class_entry = self.registry.entry(class)?;
        let mro = class_entry.mro();
        for ancestor in mro.iter() {
            let entry = self.registry.entry(*ancestor)?;
            if self.trace {
                trace!(
                    class = class_entry.name(),
                    method = name,
                    searching = entry.name(),
                    "find_method"
                );
            }
            if let Some(method) = entry.namespace().get(name) {
                if self.trace {
                    trace!(
                        class = class_entry.name(),
                        method = name,
                        found_in = entry.name(),
                        "find_method: found"
                    );
                }
                return Ok(Some(method));
            }
        }
        if self.trace {
            trace!(class = class_entry.name(), method = name, "find_method: not found");
        }
        Ok(None)
    }
}
