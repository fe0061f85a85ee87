//! Global type registry
//!
//! Types live in one growable table addressed by [`TypeId`]. Registration takes
//! a single coarse mutex for the id-assignment and name-bind step only; the
//! caller builds the type's tables afterwards and installs the finished entry.

use crate::class::ClassData;
use crate::error::{ObjectError, ObjectResult};
use crate::method::Namespace;
use crate::native::NativeType;
use crate::vtable::{Mro, VTable};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Numeric type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Placeholder id carried by tables that belong to no registered type
    pub const UNREGISTERED: TypeId = TypeId(u32::MAX);

    /// Wrap a raw id
    pub const fn from_raw(raw: u32) -> Self {
        TypeId(raw)
    }

    /// Raw id
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Class or native leaf
pub enum TypeKind {
    /// Built-in type implemented in Rust
    Native(Arc<dyn NativeType>),
    /// User-defined class
    Class(RwLock<ClassData>),
}

/// A registered type
pub struct TypeEntry {
    id: TypeId,
    name: Arc<str>,
    vtable: RwLock<Arc<VTable>>,
    kind: TypeKind,
}

impl TypeEntry {
    /// Create an entry for an id handed out by [`TypeRegistry::register`]
    pub fn new(id: TypeId, name: Arc<str>, vtable: VTable, kind: TypeKind) -> Self {
        Self {
            id,
            name,
            vtable: RwLock::new(Arc::new(vtable)),
            kind,
        }
    }

    /// Type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared registered name
    pub fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Current operation table
    pub fn vtable(&self) -> Arc<VTable> {
        self.vtable.read().clone()
    }

    /// Swap in a replacement table
    pub fn set_vtable(&self, table: VTable) {
        *self.vtable.write() = Arc::new(table);
    }

    /// Patch the operation table in place (copy-on-write)
    pub fn update_vtable(&self, f: impl FnOnce(&mut VTable)) {
        let mut guard = self.vtable.write();
        f(Arc::make_mut(&mut guard));
    }

    /// Method resolution order
    pub fn mro(&self) -> Mro {
        self.vtable.read().mro().clone()
    }

    /// Method namespace
    pub fn namespace(&self) -> Namespace {
        self.vtable.read().namespace().clone()
    }

    /// Class or native
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Check if this type is a class
    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class(_))
    }

    /// Native implementation, if this is a native leaf
    pub fn native(&self) -> Option<&Arc<dyn NativeType>> {
        match &self.kind {
            TypeKind::Native(native) => Some(native),
            TypeKind::Class(_) => None,
        }
    }

    /// Class state, or `InvalidOperation` for native types
    pub fn class_data(&self) -> ObjectResult<&RwLock<ClassData>> {
        match &self.kind {
            TypeKind::Class(data) => Ok(data),
            TypeKind::Native(_) => Err(ObjectError::not_a_class(&self.name)),
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("class", &self.is_class())
            .finish()
    }
}

struct Bindings {
    by_name: FxHashMap<Arc<str>, TypeId>,
    next: u32,
}

/// Name to id bindings plus the global table of types
pub struct TypeRegistry {
    bindings: Mutex<Bindings>,
    table: RwLock<Vec<Option<Arc<TypeEntry>>>>,
}

impl TypeRegistry {
    /// Create a registry with room for `capacity` types before growing
    pub fn new(capacity: usize) -> Self {
        let mut table = Vec::new();
        table.resize_with(capacity.max(1), || None);
        Self {
            bindings: Mutex::new(Bindings {
                by_name: FxHashMap::default(),
                next: 0,
            }),
            table: RwLock::new(table),
        }
    }

    /// Reserve a new id and bind `name` to it
    ///
    /// The entry itself is installed later with [`install`](Self::install);
    /// until then `get` returns `None` for the id but the name is taken.
    pub fn register(&self, name: &str) -> ObjectResult<TypeId> {
        let mut bindings = self.bindings.lock();
        if let Some(existing) = bindings.by_name.get(name).copied() {
            let native = self
                .get(existing)
                .map(|entry| !entry.is_class())
                .unwrap_or(false);
            return Err(if native {
                ObjectError::NativeTypeConflict {
                    name: name.to_string(),
                }
            } else {
                ObjectError::DuplicateClass {
                    name: name.to_string(),
                }
            });
        }

        let id = TypeId(bindings.next);
        bindings.next += 1;
        {
            let mut table = self.table.write();
            if id.index() >= table.len() {
                let grown = (table.len() * 2).max(id.index() + 1);
                table.resize_with(grown, || None);
            }
        }
        bindings.by_name.insert(Arc::from(name), id);
        Ok(id)
    }

    /// Install the finished entry for a registered id
    pub fn install(&self, entry: TypeEntry) -> Arc<TypeEntry> {
        let entry = Arc::new(entry);
        let mut table = self.table.write();
        let index = entry.id.index();
        if index >= table.len() {
            table.resize_with(index + 1, || None);
        }
        table[index] = Some(entry.clone());
        entry
    }

    /// Release a registered id whose entry was never installed
    pub fn abandon(&self, id: TypeId) {
        let mut bindings = self.bindings.lock();
        bindings.by_name.retain(|_, bound| *bound != id);
    }

    /// Find the id bound to `name`
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.bindings.lock().by_name.get(name).copied()
    }

    /// Installed entry for `id`
    pub fn get(&self, id: TypeId) -> Option<Arc<TypeEntry>> {
        self.table.read().get(id.index()).and_then(|slot| slot.clone())
    }

    /// Installed entry for `id`, or an error naming the id
    pub fn entry(&self, id: TypeId) -> ObjectResult<Arc<TypeEntry>> {
        self.get(id).ok_or_else(|| ObjectError::unknown_type(id))
    }

    /// Entry bound to `name`
    pub fn entry_named(&self, name: &str) -> Option<Arc<TypeEntry>> {
        self.lookup(name).and_then(|id| self.get(id))
    }

    /// Number of ids handed out
    pub fn len(&self) -> usize {
        self.bindings.lock().next as usize
    }

    /// Check if no type has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size of the global table
    pub fn capacity(&self) -> usize {
        self.table.read().len()
    }

    /// Every installed entry, in id order
    pub fn entries(&self) -> Vec<Arc<TypeEntry>> {
        self.table.read().iter().flatten().cloned().collect()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
