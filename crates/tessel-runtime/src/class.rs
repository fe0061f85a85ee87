//! Class definition and redefinition
//!
//! A class is registered once, then may gain parents, attributes and methods
//! at run time. Every structural change recomputes the MRO and attribute
//! layout off to the side and swaps the result in; nothing is mutated until
//! validation has passed.
//!
//! Adding parents or attributes to a class that already has instances or
//! subclasses is allowed but unsafe: existing objects keep their old slot
//! arrays and subclasses keep their old layouts. A warning is logged.

use crate::delegate::{DelegationMode, DelegationVTableBuilder};
use crate::error::{ObjectError, ObjectResult};
use crate::gc::CollectionBlock;
use crate::layout::{qualified_name, AttributeLayout, AttributeLayoutBuilder, VALUE_ATTRIBUTE};
use crate::method::{Method, Namespace};
use crate::mro;
use crate::registry::{TypeEntry, TypeId, TypeKind};
use crate::role::RoleId;
use crate::runtime::Runtime;
use crate::vtable::{Handler, Mro, VTable};
use parking_lot::RwLock;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Constructor hooks declared on a class
///
/// `None` means undeclared; `Some("")` declares an empty hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHooks {
    /// Single constructor replacing the MRO walk
    pub construct: Option<Arc<str>>,
    /// Per-ancestor initializer run during the MRO walk
    pub build: Option<Arc<str>>,
}

/// Mutable state of a class
#[derive(Debug)]
pub struct ClassData {
    pub(crate) parents: Vec<TypeId>,
    pub(crate) attributes: Vec<Arc<str>>,
    pub(crate) layout: Arc<AttributeLayout>,
    pub(crate) object_vtable: Arc<VTable>,
    pub(crate) roles: Vec<RoleId>,
    pub(crate) hooks: ClassHooks,
    pub(crate) has_instances: bool,
    pub(crate) has_subclasses: bool,
}

impl ClassData {
    /// Immediate parents, in declaration order
    pub fn parents(&self) -> &[TypeId] {
        &self.parents
    }

    /// Attributes declared by this class itself
    pub fn attributes(&self) -> &[Arc<str>] {
        &self.attributes
    }

    /// Flattened attribute layout
    pub fn layout(&self) -> &Arc<AttributeLayout> {
        &self.layout
    }

    /// Table installed on new instances
    pub fn object_vtable(&self) -> &Arc<VTable> {
        &self.object_vtable
    }

    /// Roles composed into this class
    pub fn roles(&self) -> &[RoleId] {
        &self.roles
    }

    /// Constructor hooks
    pub fn hooks(&self) -> &ClassHooks {
        &self.hooks
    }
}

impl Runtime {
    // ============================================================================
    // Definition
    // ============================================================================

    /// Define a class with the given parents
    ///
    /// The MRO is computed before the name is bound, so an inconsistent
    /// hierarchy leaves nothing registered.
    pub fn create_class(&self, name: &str, parents: &[TypeId]) -> ObjectResult<TypeId> {
        let parent_entries = parents
            .iter()
            .map(|parent| self.registry.entry(*parent))
            .collect::<ObjectResult<Vec<_>>>()?;

        let native_parents = parent_entries.iter().filter(|e| !e.is_class()).count();
        if native_parents > 1 {
            return Err(ObjectError::InvalidOperation(format!(
                "class '{}' can't inherit from more than one native type",
                name
            )));
        }

        let parent_orders: Vec<Mro> = parent_entries.iter().map(|e| e.mro()).collect();
        let order_refs: Vec<&[TypeId]> = parent_orders.iter().map(|o| &o[..]).collect();
        let mut order = mro::linearize(TypeId::UNREGISTERED, parents, &order_refs).ok_or_else(
            || ObjectError::InconsistentHierarchy {
                class: name.to_string(),
            },
        )?;

        let id = self.registry.register(name)?;
        order[0] = id;
        let mro: Mro = Arc::from(order);

        match self.build_class(id, name, parents, &parent_entries, mro, native_parents == 1) {
            Ok(entry) => {
                for parent in &parent_entries {
                    if let Ok(data) = parent.class_data() {
                        data.write().has_subclasses = true;
                    }
                }
                debug!(
                    class = name,
                    id = id.raw(),
                    parents = parents.len(),
                    mro_len = entry.mro().len(),
                    "class registered"
                );
                Ok(id)
            }
            Err(err) => {
                self.registry.abandon(id);
                Err(err)
            }
        }
    }

    /// Define a class with a generated name
    pub fn create_anonymous_class(&self, parents: &[TypeId]) -> ObjectResult<TypeId> {
        let n = self.anon_counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.create_class(&format!("\0\0anon_{}", n), parents)
    }

    fn build_class(
        &self,
        id: TypeId,
        name: &str,
        parents: &[TypeId],
        parent_entries: &[Arc<TypeEntry>],
        mro: Mro,
        wraps_native: bool,
    ) -> ObjectResult<Arc<TypeEntry>> {
        let namespace = Namespace::new();
        let first_class_parent = parent_entries.iter().find(|e| e.is_class());

        let (class_table, object_table) = match first_class_parent {
            Some(parent) => {
                let object = parent.class_data()?.read().object_vtable.clone();
                (parent.vtable(), object)
            }
            None => (
                Arc::new(self.base.class.clone()),
                Arc::new(self.base.object.clone()),
            ),
        };
        let class_table = class_table.derive(id, Some(id), mro.clone(), namespace.clone());
        let mut object_table = object_table.derive(id, Some(id), mro.clone(), namespace.clone());

        let attributes: Vec<Arc<str>> = if wraps_native {
            vec![Arc::from(VALUE_ATTRIBUTE)]
        } else {
            Vec::new()
        };
        let layout = self.compute_layout(&mro, id, name, &attributes)?;

        let delegation = if wraps_native {
            Some(DelegationMode::Full)
        } else if self.has_native_ancestor(&mro, 2)? {
            if object_table.count(Handler::Forward) > 0 {
                Some(DelegationMode::Partial)
            } else {
                Some(DelegationMode::Full)
            }
        } else {
            None
        };
        if let Some(mode) = delegation {
            self.wire_delegation(&mro, &namespace, &mut object_table, mode)?;
        }

        let data = ClassData {
            parents: parents.to_vec(),
            attributes,
            layout: Arc::new(layout),
            object_vtable: Arc::new(object_table),
            roles: Vec::new(),
            hooks: ClassHooks::default(),
            has_instances: false,
            has_subclasses: false,
        };
        Ok(self.registry.install(TypeEntry::new(
            id,
            Arc::from(name),
            class_table,
            TypeKind::Class(RwLock::new(data)),
        )))
    }

    // ============================================================================
    // Redefinition
    // ============================================================================

    /// Append a parent and recompute the MRO and layout
    pub fn add_parent(&self, class: TypeId, parent: TypeId) -> ObjectResult<()> {
        let entry = self.registry.entry(class)?;
        let data = entry.class_data()?;
        let parent_entry = self.registry.entry(parent)?;

        if parent == class || parent_entry.mro().contains(&class) {
            return Err(ObjectError::InconsistentHierarchy {
                class: entry.name().to_string(),
            });
        }

        let native = !parent_entry.is_class();
        let (new_parents, has_instances, has_subclasses) = {
            let data = data.read();
            if data.parents.contains(&parent) {
                return Err(ObjectError::InvalidOperation(format!(
                    "'{}' is already a parent of '{}'",
                    parent_entry.name(),
                    entry.name()
                )));
            }
            if native {
                if data.layout.count() != 0 {
                    return Err(ObjectError::InvalidOperation(
                        "Subclassing built-in type too late".to_string(),
                    ));
                }
                let mut existing = Vec::new();
                for p in &data.parents {
                    existing.push(self.registry.entry(*p)?);
                }
                if existing.iter().any(|e| !e.is_class()) {
                    return Err(ObjectError::InvalidOperation(format!(
                        "class '{}' can't inherit from more than one native type",
                        entry.name()
                    )));
                }
            }
            let mut parents = data.parents.clone();
            parents.push(parent);
            (parents, data.has_instances, data.has_subclasses)
        };

        let parent_orders = new_parents
            .iter()
            .map(|p| self.registry.entry(*p).map(|e| e.mro()))
            .collect::<ObjectResult<Vec<Mro>>>()?;
        let order_refs: Vec<&[TypeId]> = parent_orders.iter().map(|o| &o[..]).collect();
        let order = mro::linearize(class, &new_parents, &order_refs).ok_or_else(|| {
            ObjectError::InconsistentHierarchy {
                class: entry.name().to_string(),
            }
        })?;
        let mro: Mro = Arc::from(order);

        if has_instances || has_subclasses {
            warn!(
                class = entry.name(),
                parent = parent_entry.name(),
                has_instances,
                has_subclasses,
                "adding a parent to a class that is already in use"
            );
        }

        {
            let mut data = data.write();
            data.parents = new_parents;
            if native {
                data.attributes.push(Arc::from(VALUE_ATTRIBUTE));
            }
            Arc::make_mut(&mut data.object_vtable).set_mro(mro.clone());
        }
        entry.update_vtable(|table| table.set_mro(mro.clone()));
        if let Ok(parent_data) = parent_entry.class_data() {
            parent_data.write().has_subclasses = true;
        }

        self.rebuild_layout(class)?;

        // an already forwarding table only needs the new MRO's overrides restored
        let forwarding = data.read().object_vtable.count(Handler::Forward) > 0;
        let delegation = if native || (!forwarding && self.has_native_ancestor(&mro, 1)?) {
            Some(DelegationMode::Full)
        } else if forwarding {
            Some(DelegationMode::Partial)
        } else {
            None
        };
        if let Some(mode) = delegation {
            let namespace = entry.namespace();
            let mut table = (*data.read().object_vtable).clone();
            self.wire_delegation(&mro, &namespace, &mut table, mode)?;
            data.write().object_vtable = Arc::new(table);
        }

        self.cache.invalidate(None);
        debug!(
            class = entry.name(),
            parent = parent_entry.name(),
            mro_len = mro.len(),
            "parent added"
        );
        Ok(())
    }

    /// Declare an attribute on a class, returning its offset
    pub fn add_attribute(&self, class: TypeId, name: &str) -> ObjectResult<usize> {
        let entry = self.registry.entry(class)?;
        let data = match entry.kind() {
            TypeKind::Class(data) => data,
            TypeKind::Native(_) => {
                return Err(ObjectError::InvalidOperation(format!(
                    "can't add attribute '{}' to native type '{}'",
                    name,
                    entry.name()
                )))
            }
        };

        let full_name = qualified_name(entry.name(), name);
        {
            let data = data.read();
            if data.layout.offset(&full_name).is_some() || data.attributes.iter().any(|a| &**a == name)
            {
                return Err(ObjectError::AttributeAlreadyExists {
                    class: entry.name().to_string(),
                    attribute: name.to_string(),
                });
            }
            if data.has_instances || data.has_subclasses {
                warn!(
                    class = entry.name(),
                    attribute = name,
                    "adding an attribute to a class that is already in use"
                );
            }
        }

        data.write().attributes.push(Arc::from(name));
        self.rebuild_layout(class)?;

        let offset = data.read().layout.offset(&full_name);
        offset.ok_or_else(|| ObjectError::attribute_named(&full_name))
    }

    /// Add a method to a class namespace
    ///
    /// Invalidates every method cache, since subclasses resolve through this
    /// namespace too. A method overriding an op restores that slot on a
    /// delegating class; instances created earlier keep forwarding it.
    pub fn add_method(&self, class: TypeId, method: Method) -> ObjectResult<()> {
        let entry = self.registry.entry(class)?;
        entry.namespace().insert(method.name(), method.clone());

        if let (Some(op), Ok(data)) = (method.overridden_op(), entry.class_data()) {
            let mut data = data.write();
            if data.object_vtable.slot(op) == Handler::Forward {
                let object_slot = self.base.object.slot(op);
                let ro_slot = self
                    .base
                    .object
                    .read_only_variant()
                    .map(|ro| ro.slot(op))
                    .unwrap_or(object_slot);
                let table = Arc::make_mut(&mut data.object_vtable);
                table.set_slot(op, object_slot);
                table.set_read_only_slot(op, ro_slot);
            }
        }

        self.cache.invalidate(None);
        trace!(class = entry.name(), method = method.name(), "method added");
        Ok(())
    }

    /// Declare (or clear) the single `construct` hook
    pub fn set_construct_hook(&self, class: TypeId, hook: Option<&str>) -> ObjectResult<()> {
        let entry = self.registry.entry(class)?;
        entry.class_data()?.write().hooks.construct = hook.map(Arc::from);
        Ok(())
    }

    /// Declare (or clear) the per-ancestor `build` hook
    pub fn set_build_hook(&self, class: TypeId, hook: Option<&str>) -> ObjectResult<()> {
        let entry = self.registry.entry(class)?;
        entry.class_data()?.write().hooks.build = hook.map(Arc::from);
        Ok(())
    }

    // ============================================================================
    // Layout and delegation
    // ============================================================================

    /// Recompute a class's attribute layout and swap it in
    pub(crate) fn rebuild_layout(&self, class: TypeId) -> ObjectResult<()> {
        let _block = CollectionBlock::new(self.collector.as_ref());
        let entry = self.registry.entry(class)?;
        let data = entry.class_data()?;
        let attributes = data.read().attributes.clone();
        let layout = self.compute_layout(&entry.mro(), class, entry.name(), &attributes)?;
        trace!(class = entry.name(), attributes = layout.count(), "layout rebuilt");
        data.write().layout = Arc::new(layout);
        Ok(())
    }

    /// Walk the MRO tail to head; `own` stands in for `class`'s attributes
    fn compute_layout(
        &self,
        mro: &[TypeId],
        class: TypeId,
        class_name: &str,
        own: &[Arc<str>],
    ) -> ObjectResult<AttributeLayout> {
        let mut builder = AttributeLayoutBuilder::new();
        for ancestor in mro.iter().rev() {
            if *ancestor == class {
                builder.push_class(class, class_name, own);
                continue;
            }
            let entry = self.registry.entry(*ancestor)?;
            if let TypeKind::Class(data) = entry.kind() {
                let attributes = data.read().attributes.clone();
                builder.push_class(*ancestor, entry.name(), &attributes);
            }
        }
        Ok(builder.finish())
    }

    fn has_native_ancestor(&self, mro: &[TypeId], from: usize) -> ObjectResult<bool> {
        for ancestor in mro.iter().skip(from) {
            if !self.registry.entry(*ancestor)?.is_class() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rewire `table` so unoverridden slots forward to the wrapped value
    fn wire_delegation(
        &self,
        mro: &[TypeId],
        own_namespace: &Namespace,
        table: &mut VTable,
        mode: DelegationMode,
    ) -> ObjectResult<()> {
        let mut namespaces = Vec::with_capacity(mro.len());
        namespaces.push(own_namespace.clone());
        for ancestor in mro.iter().skip(1) {
            namespaces.push(self.registry.entry(*ancestor)?.namespace());
        }
        let forwards = DelegationVTableBuilder::new(&self.base, &namespaces).build(table, mode);
        debug!(
            class = ?table.class(),
            mode = ?mode,
            forwards,
            "delegation table built"
        );
        Ok(())
    }
}
