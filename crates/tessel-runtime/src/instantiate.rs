//! Object instantiation and the constructor protocol
//!
//! Construction runs user code, so no registry or class lock is held while a
//! hook executes. Hooks may define classes and instantiate objects.

use crate::class::ClassHooks;
use crate::error::{ObjectError, ObjectResult};
use crate::method::Method;
use crate::object::{Object, ObjectRef};
use crate::registry::{TypeEntry, TypeId, TypeKind};
use crate::runtime::Runtime;
use crate::value::Value;
use crate::vtable::Op;
use std::sync::Arc;
use tracing::trace;

impl Runtime {
    /// Create an instance of `class`, running its constructors
    ///
    /// With a `construct` hook, only that hook runs. Otherwise every MRO entry
    /// is visited from the most ancestral to the class itself: native leaves
    /// get their wrapped value allocated, classes run their `build` hook or
    /// the default `__init` / `__init_pmc` method.
    pub fn instantiate(&self, class: TypeId, init: Option<Value>) -> ObjectResult<ObjectRef> {
        let entry = self.registry.entry(class)?;
        let data = entry.class_data()?;
        let (vtable, slot_count, delegate_slot, hooks) = {
            let mut data = data.write();
            data.has_instances = true;
            (
                data.object_vtable.clone(),
                data.layout.count(),
                data.layout.delegate_slot(),
                data.hooks.clone(),
            )
        };

        let object = Arc::new(Object::new(class, vtable, slot_count));
        object.mark_instance();
        trace!(class = entry.name(), slots = slot_count, "instantiate");

        let receiver = Value::Object(object.clone());
        let args: Vec<Value> = init.into_iter().collect();

        if let Some(construct) = hooks.construct.as_deref() {
            self.run_construct(&entry, construct, &receiver, &args)?;
            return Ok(object);
        }

        let mro = entry.mro();
        for (i, ancestor) in mro.iter().enumerate().rev() {
            let ancestor_entry = self.registry.entry(*ancestor)?;
            match ancestor_entry.kind() {
                TypeKind::Native(native) => {
                    // only the native closest to a class allocates
                    let next_is_class = match i.checked_sub(1) {
                        Some(next) => self.registry.entry(mro[next])?.is_class(),
                        None => false,
                    };
                    if !next_is_class {
                        continue;
                    }
                    let value = native.instantiate(*ancestor)?;
                    object.set_slot(delegate_slot, Value::Native(value))?;
                }
                TypeKind::Class(ancestor_data) => {
                    let ancestor_hooks = ancestor_data.read().hooks.clone();
                    self.run_build(&ancestor_entry, &ancestor_hooks, &receiver, &args)?;
                }
            }
        }

        Ok(object)
    }

    fn run_construct(
        &self,
        entry: &TypeEntry,
        construct: &str,
        receiver: &Value,
        args: &[Value],
    ) -> ObjectResult<()> {
        if construct.is_empty() {
            return Ok(());
        }
        let method = entry
            .namespace()
            .get(construct)
            .ok_or_else(|| ObjectError::MethodNotFound {
                class: entry.name().to_string(),
                method: construct.to_string(),
            })?;
        method.call(self, receiver, args)?;
        Ok(())
    }

    fn run_build(
        &self,
        entry: &TypeEntry,
        hooks: &ClassHooks,
        receiver: &Value,
        args: &[Value],
    ) -> ObjectResult<()> {
        let method = match hooks.build.as_deref() {
            Some("") => return Ok(()),
            Some(build) => Some(entry.namespace().get(build).ok_or_else(|| {
                ObjectError::MethodNotFound {
                    class: entry.name().to_string(),
                    method: build.to_string(),
                }
            })?),
            None => default_initializer(entry, !args.is_empty()),
        };
        if let Some(method) = method {
            method.call(self, receiver, args)?;
        }
        Ok(())
    }
}

/// `__init` / `__init_pmc` declared directly in this class's namespace
fn default_initializer(entry: &TypeEntry, with_init: bool) -> Option<Method> {
    let op = if with_init { Op::InitPmc } else { Op::Init };
    entry.namespace().find_slot_override(op)
}
