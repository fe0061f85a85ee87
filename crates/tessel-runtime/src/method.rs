//! Method handles and namespaces
//!
//! A [`Method`] is a shared, callable handle. The loader hands methods out
//! already compiled; here a method body is any Rust closure, optionally tagged
//! with the operation slot it overrides.

use crate::error::ObjectResult;
use crate::runtime::Runtime;
use crate::value::Value;
use crate::vtable::Op;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Method body: `(runtime, receiver, args) -> result`
pub type MethodFn = dyn Fn(&Runtime, &Value, &[Value]) -> ObjectResult<Value> + Send + Sync;

struct MethodInner {
    name: Arc<str>,
    vtable_slot: Option<Op>,
    body: Box<MethodFn>,
}

/// Callable method handle (cheap to clone)
#[derive(Clone)]
pub struct Method(Arc<MethodInner>);

impl Method {
    /// Create a plain method
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> ObjectResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(MethodInner {
            name: Arc::from(name),
            vtable_slot: None,
            body: Box::new(body),
        }))
    }

    /// Create a method tagged as the override for `op`
    pub fn with_vtable_slot<F>(name: &str, op: Op, body: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> ObjectResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(MethodInner {
            name: Arc::from(name),
            vtable_slot: Some(op),
            body: Box::new(body),
        }))
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Operation this method overrides, if tagged
    pub fn vtable_slot(&self) -> Option<Op> {
        self.0.vtable_slot
    }

    /// Operation this method overrides, by tag or by `__op` name
    pub fn overridden_op(&self) -> Option<Op> {
        self.0
            .vtable_slot
            .or_else(|| Op::from_slot_name(&self.0.name))
    }

    /// Invoke the method
    pub fn call(&self, runtime: &Runtime, receiver: &Value, args: &[Value]) -> ObjectResult<Value> {
        (self.0.body)(runtime, receiver, args)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.vtable_slot {
            Some(op) => write!(f, "Method({} => {})", self.0.name, op.slot_name()),
            None => write!(f, "Method({})", self.0.name),
        }
    }
}

/// Name to method mapping
pub type MethodMap = FxHashMap<Arc<str>, Method>;

/// Shared, mutable method namespace
///
/// Cloning a namespace yields another handle to the same map; the class-level
/// and per-instance tables of a class share one namespace.
#[derive(Clone, Default)]
pub struct Namespace(Arc<RwLock<MethodMap>>);

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a method by name
    pub fn get(&self, name: &str) -> Option<Method> {
        self.0.read().get(name).cloned()
    }

    /// Check if a name is bound
    pub fn contains(&self, name: &str) -> bool {
        self.0.read().contains_key(name)
    }

    /// Bind a method, returning the one it replaced
    pub fn insert(&self, name: &str, method: Method) -> Option<Method> {
        self.0.write().insert(Arc::from(name), method)
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Check if the namespace is empty
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copy of the current map
    pub fn snapshot(&self) -> MethodMap {
        self.0.read().clone()
    }

    /// Method names, sorted
    pub fn names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.0.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run `f` with exclusive access to the map
    ///
    /// `f` must not call back into user code.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut MethodMap) -> R) -> R {
        f(&mut self.0.write())
    }

    /// Method overriding `op` declared directly in this namespace
    pub fn find_slot_override(&self, op: Op) -> Option<Method> {
        let map = self.0.read();
        map.values()
            .find(|m| m.vtable_slot() == Some(op))
            .or_else(|| map.get(op.slot_name()))
            .cloned()
    }

    /// Check if two handles refer to the same map
    pub fn same_as(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names().iter()).finish()
    }
}
