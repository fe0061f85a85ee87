//! Runtime state handle
//!
//! [`Runtime`] owns every piece of shared object-system state: the type
//! registry, roles, the method cache and the base tables. It is passed by
//! reference into every operation; there are no globals.

use crate::error::{ObjectError, ObjectResult};
use crate::gc::{CollectorHooks, NoopCollector};
use crate::layout::AttributeLayout;
use crate::method::Method;
use crate::method_cache::{CacheStats, MethodCache};
use crate::name::{Name, NameTable};
use crate::native::{ArrayType, IntegerType, NativeType};
use crate::object::{Object, ObjectRef};
use crate::options::RuntimeOptions;
use crate::registry::{TypeEntry, TypeId, TypeKind, TypeRegistry};
use crate::resolver::MethodResolver;
use crate::role::{RoleId, RoleRegistry};
use crate::value::Value;
use crate::vtable::{BaseTables, Handler, Mro, Op, VTable};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{debug, error};

/// Object system state
pub struct Runtime {
    pub(crate) options: RuntimeOptions,
    pub(crate) names: NameTable,
    pub(crate) registry: TypeRegistry,
    pub(crate) roles: RoleRegistry,
    pub(crate) cache: MethodCache,
    pub(crate) base: BaseTables,
    pub(crate) collector: Arc<dyn CollectorHooks>,
    pub(crate) anon_counter: AtomicU64,
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    /// Create a runtime with custom options
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self::with_collector(options, Arc::new(NoopCollector::new()))
    }

    /// Create a runtime wired to a host collector
    pub fn with_collector(options: RuntimeOptions, collector: Arc<dyn CollectorHooks>) -> Self {
        let runtime = Self {
            registry: TypeRegistry::new(options.initial_type_capacity),
            cache: MethodCache::new(options.cache_capacity_per_type),
            names: NameTable::new(),
            roles: RoleRegistry::new(),
            base: BaseTables::new(),
            anon_counter: AtomicU64::new(0),
            collector,
            options,
        };
        if let Err(err) = runtime.register_builtins() {
            debug_assert!(false, "built-in registration failed: {}", err);
            error!(error = %err, "failed to register built-in types");
        }
        runtime
    }

    fn register_builtins(&self) -> ObjectResult<()> {
        for native in [
            Arc::new(IntegerType) as Arc<dyn NativeType>,
            Arc::new(ArrayType) as Arc<dyn NativeType>,
        ] {
            self.register_native(native)?;
        }
        Ok(())
    }

    /// Options this runtime was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Register a native type, reserving its name
    pub fn register_native(&self, native: Arc<dyn NativeType>) -> ObjectResult<TypeId> {
        let name = native.name().to_string();
        let id = self.registry.register(&name)?;
        let mut vtable = VTable::filled(id, Handler::Missing);
        for op in Op::ALL.iter().copied().filter(|op| native.supports(*op)) {
            vtable.set_slot(op, Handler::Native);
        }
        self.registry.install(TypeEntry::new(
            id,
            Arc::from(name.as_str()),
            vtable,
            TypeKind::Native(native),
        ));
        debug!(native = name.as_str(), id = id.raw(), "native type registered");
        Ok(id)
    }

    // ============================================================================
    // Names and types
    // ============================================================================

    /// Intern a constant name
    pub fn intern(&self, text: &str) -> Name {
        self.names.intern(text)
    }

    /// Type bound to `name`
    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.registry.lookup(name)
    }

    /// Registered type entry
    pub fn type_entry(&self, id: TypeId) -> ObjectResult<Arc<TypeEntry>> {
        self.registry.entry(id)
    }

    /// Type registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Registered name of a type
    pub fn class_name(&self, id: TypeId) -> ObjectResult<String> {
        Ok(self.registry.entry(id)?.name().to_string())
    }

    /// Method resolution order of a type
    pub fn mro(&self, id: TypeId) -> ObjectResult<Mro> {
        Ok(self.registry.entry(id)?.mro())
    }

    /// Immediate parents of a class
    pub fn parents(&self, class: TypeId) -> ObjectResult<Vec<TypeId>> {
        let entry = self.registry.entry(class)?;
        let parents = entry.class_data()?.read().parents.clone();
        Ok(parents)
    }

    /// Current attribute layout of a class
    pub fn layout(&self, class: TypeId) -> ObjectResult<Arc<AttributeLayout>> {
        let entry = self.registry.entry(class)?;
        let layout = entry.class_data()?.read().layout.clone();
        Ok(layout)
    }

    /// Total attribute count of a class
    pub fn attribute_count(&self, class: TypeId) -> ObjectResult<usize> {
        Ok(self.layout(class)?.count())
    }

    /// Offset of a bare or qualified attribute in a class's layout
    pub fn attribute_offset(&self, class: TypeId, name: &str) -> ObjectResult<usize> {
        self.layout(class)?
            .offset(name)
            .ok_or_else(|| ObjectError::attribute_named(name))
    }

    /// Table installed on new instances of a class
    pub fn object_vtable(&self, class: TypeId) -> ObjectResult<Arc<VTable>> {
        let entry = self.registry.entry(class)?;
        let table = entry.class_data()?.read().object_vtable.clone();
        Ok(table)
    }

    // ============================================================================
    // Method lookup
    // ============================================================================

    /// Resolve `name` along the MRO of `class`
    ///
    /// With `use_cache`, interned names go through the per-type cache;
    /// transient names and a disabled cache always resolve directly.
    pub fn find_method(
        &self,
        class: TypeId,
        name: &Name,
        use_cache: bool,
    ) -> ObjectResult<Option<Method>> {
        let resolver = self.resolver();
        if !(use_cache && self.options.method_cache && name.is_interned()) {
            return resolver.resolve_direct(class, name.as_str());
        }

        if let Some(method) = self.cache.get(class, name) {
            return Ok(Some(method));
        }
        let generation = self.cache.generation();
        let found = resolver.resolve_direct(class, name.as_str())?;
        if let Some(method) = &found {
            self.cache.insert(class, name, method.clone(), generation);
        }
        Ok(found)
    }

    /// Uncached user override of `op` along the MRO of `class`
    pub fn find_vtable_override(&self, class: TypeId, op: Op) -> ObjectResult<Option<Method>> {
        self.resolver().find_vtable_override(class, op)
    }

    /// Resolve and call a method on an object
    pub fn call_method(&self, object: &ObjectRef, name: &Name, args: &[Value]) -> ObjectResult<Value> {
        let method = self.find_method(object.class(), name, true)?.ok_or_else(|| {
            ObjectError::MethodNotFound {
                class: self.class_name(object.class()).unwrap_or_default(),
                method: name.to_string(),
            }
        })?;
        method.call(self, &Value::Object(object.clone()), args)
    }

    /// Drop the method cache of one type, or of every type
    pub fn invalidate_method_cache(&self, class: Option<TypeId>) {
        self.cache.invalidate(class);
        debug!(class = ?class, "method cache invalidated");
    }

    /// Drop the method cache of the type named `name`, or of every type
    ///
    /// An unknown name is ignored.
    pub fn invalidate_method_cache_by_name(&self, name: Option<&str>) {
        match name {
            None => self.invalidate_method_cache(None),
            Some(name) => {
                if let Some(id) = self.registry.lookup(name) {
                    self.invalidate_method_cache(Some(id));
                }
            }
        }
    }

    /// Method cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of cached entries for a type
    pub fn cached_methods(&self, class: TypeId) -> usize {
        self.cache.len_for(class)
    }

    fn resolver(&self) -> MethodResolver<'_> {
        MethodResolver::new(&self.registry, self.options.trace_method_lookup)
    }

    // ============================================================================
    // Type checks
    // ============================================================================

    /// Check if `object`'s class has `class` in its MRO
    pub fn is_instance_of(&self, object: &Object, class: TypeId) -> ObjectResult<bool> {
        Ok(self.registry.entry(object.class())?.mro().contains(&class))
    }

    /// Check if `sub` has `class` in its MRO
    pub fn is_subclass_of(&self, sub: TypeId, class: TypeId) -> ObjectResult<bool> {
        Ok(self.registry.entry(sub)?.mro().contains(&class))
    }

    /// Check if `object`'s class does `role`
    pub fn does(&self, object: &Object, role: RoleId) -> ObjectResult<bool> {
        self.class_does(object.class(), role)
    }

    // ============================================================================
    // Attributes
    // ============================================================================

    /// Read an attribute by bare or `Class\0attr` name
    pub fn get_attribute(&self, object: &Object, name: &str) -> ObjectResult<Value> {
        let offset = self.attribute_offset(object.class(), name)?;
        object.slot(offset)
    }

    /// Write an attribute by bare or `Class\0attr` name
    pub fn set_attribute(&self, object: &Object, name: &str, value: Value) -> ObjectResult<()> {
        let offset = self.attribute_offset(object.class(), name)?;
        object.set_slot(offset, value)
    }

    /// Read an attribute slot by index
    pub fn get_attribute_at(&self, object: &Object, index: usize) -> ObjectResult<Value> {
        object.slot(index)
    }

    /// Write an attribute slot by index
    pub fn set_attribute_at(&self, object: &Object, index: usize, value: Value) -> ObjectResult<()> {
        object.set_slot(index, value)
    }

    /// First slot of the named ancestor's attributes within `object`
    pub fn class_offset(&self, object: &Object, class_name: &str) -> ObjectResult<Option<usize>> {
        let Some(ancestor) = self.registry.lookup(class_name) else {
            return Ok(None);
        };
        Ok(self.layout(object.class())?.class_offset(ancestor))
    }

    // ============================================================================
    // Dispatch
    // ============================================================================

    /// Execute operation `op` on `receiver`
    ///
    /// Receivers are objects (per-instance table), types (class-level table)
    /// or native values (their type's table).
    pub fn dispatch(&self, receiver: &Value, op: Op, args: &[Value]) -> ObjectResult<Value> {
        match receiver {
            Value::Object(object) => self.dispatch_object(object, op, args),
            Value::Type(class) => self.dispatch_type(*class, op, args),
            Value::Native(native) => {
                let entry = self.registry.entry(native.type_id())?;
                match entry.vtable().slot(op) {
                    Handler::Native => native.invoke(op, args),
                    _ => Err(not_implemented(op, entry.name())),
                }
            }
            other => Err(ObjectError::InvalidOperation(format!(
                "can't dispatch {} on {:?}",
                op.slot_name(),
                other
            ))),
        }
    }

    fn dispatch_object(&self, object: &ObjectRef, op: Op, args: &[Value]) -> ObjectResult<Value> {
        let class = object.class();
        match object.handler(op) {
            Handler::ObjectCore => self.object_core(object, op, args),
            Handler::Override => match self.find_vtable_override(class, op)? {
                Some(method) => method.call(self, &Value::Object(object.clone()), args),
                None if matches!(op, Op::Init | Op::InitPmc) => Ok(Value::Null),
                None => Err(ObjectError::MethodNotFound {
                    class: self.class_name(class)?,
                    method: op.slot_name().to_string(),
                }),
            },
            Handler::Forward => {
                let delegate_slot = self.layout(class)?.delegate_slot();
                match object.slot(delegate_slot)? {
                    Value::Native(native) => native.invoke(op, args),
                    Value::Object(inner) => self.dispatch_object(&inner, op, args),
                    _ => Err(ObjectError::InvalidOperation(format!(
                        "no wrapped value to forward {} to in '{}'",
                        op.slot_name(),
                        self.class_name(class)?
                    ))),
                }
            }
            Handler::ReadOnly => Err(ObjectError::InvalidOperation(format!(
                "{} on read-only instance of '{}'",
                op.slot_name(),
                self.class_name(class)?
            ))),
            Handler::Instantiate => Ok(Value::Object(self.instantiate(class, args.first().cloned())?)),
            Handler::Native | Handler::Missing => {
                Err(not_implemented(op, &self.class_name(class)?))
            }
        }
    }

    fn dispatch_type(&self, class: TypeId, op: Op, args: &[Value]) -> ObjectResult<Value> {
        let entry = self.registry.entry(class)?;
        match entry.vtable().slot(op) {
            Handler::Instantiate => Ok(Value::Object(self.instantiate(class, args.first().cloned())?)),
            Handler::ObjectCore => match op {
                Op::Name => Ok(Value::str(entry.name())),
                Op::Type => Ok(Value::Type(class)),
                Op::FindMethod => self.find_method_value(class, args),
                _ => Err(not_implemented(op, entry.name())),
            },
            _ => Err(not_implemented(op, entry.name())),
        }
    }

    /// Built-in object behaviour
    fn object_core(&self, object: &ObjectRef, op: Op, args: &[Value]) -> ObjectResult<Value> {
        let class = object.class();
        match op {
            Op::Mark => {
                for value in object.slots() {
                    self.collector.keep_alive(&value);
                }
                Ok(Value::Null)
            }
            Op::Destroy => Ok(Value::Null),
            Op::Clone => Ok(Value::Object(Arc::new(object.shallow_clone()))),
            Op::Name => Ok(Value::Str(self.registry.entry(class)?.shared_name())),
            Op::Type | Op::GetClass => Ok(Value::Type(class)),
            Op::Isa => {
                let target = match args.first() {
                    Some(Value::Type(id)) => Some(*id),
                    Some(Value::Str(name)) => self.registry.lookup(name),
                    _ => None,
                };
                match target {
                    Some(target) => Ok(Value::Bool(self.is_instance_of(object, target)?)),
                    None => Ok(Value::Bool(false)),
                }
            }
            Op::Can => {
                let name = string_arg(args, op)?;
                let found = self.find_method(class, &Name::transient(name), false)?;
                Ok(Value::Bool(found.is_some()))
            }
            Op::Does => match self.roles.lookup(string_arg(args, op)?) {
                Some(role) => Ok(Value::Bool(self.does(object, role)?)),
                None => Ok(Value::Bool(false)),
            },
            Op::FindMethod => self.find_method_value(class, args),
            Op::GetAttr => {
                let index = index_arg(args, op)?;
                self.get_attribute_at(object, index)
            }
            Op::SetAttr => {
                let index = index_arg(args, op)?;
                let value = args.get(1).cloned().unwrap_or_default();
                self.set_attribute_at(object, index, value)?;
                Ok(Value::Null)
            }
            Op::GetAttrStr => self.get_attribute(object, string_arg(args, op)?),
            Op::SetAttrStr => {
                let name = string_arg(args, op)?;
                let value = args.get(1).cloned().unwrap_or_default();
                self.set_attribute(object, name, value)?;
                Ok(Value::Null)
            }
            _ => Err(not_implemented(op, &self.class_name(class)?)),
        }
    }

    fn find_method_value(&self, class: TypeId, args: &[Value]) -> ObjectResult<Value> {
        let name = self.intern(string_arg(args, Op::FindMethod)?);
        Ok(self
            .find_method(class, &name, true)?
            .map(Value::Method)
            .unwrap_or(Value::Null))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("roles", &self.roles.len())
            .field("cache", &self.cache)
            .finish()
    }
}

fn not_implemented(op: Op, type_name: &str) -> ObjectError {
    ObjectError::InvalidOperation(format!(
        "{} not implemented in class '{}'",
        op.slot_name(),
        type_name
    ))
}

fn string_arg(args: &[Value], op: Op) -> ObjectResult<&str> {
    args.first().and_then(Value::as_str).ok_or_else(|| {
        ObjectError::InvalidOperation(format!("{} expects a name argument", op.slot_name()))
    })
}

fn index_arg(args: &[Value], op: Op) -> ObjectResult<usize> {
    args.first()
        .and_then(Value::as_int)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            ObjectError::InvalidOperation(format!("{} expects an index argument", op.slot_name()))
        })
}
