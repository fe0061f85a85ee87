//! Tessel object runtime
//!
//! This crate provides the object/class layer of the Tessel VM:
//! - Type registry and per-type operation tables
//! - C3 method resolution order
//! - Attribute layout across multiple inheritance
//! - Instantiation and the constructor protocol
//! - Cached method lookup
//! - Delegation to wrapped native values
//! - Role composition

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod delegate;
pub mod error;
pub mod gc;
pub mod layout;
pub mod method;
pub mod method_cache;
pub mod mro;
pub mod name;
pub mod native;
pub mod object;
pub mod options;
pub mod registry;
pub mod resolver;
pub mod role;
pub mod value;
pub mod vtable;

mod instantiate;
mod runtime;

pub use class::{ClassData, ClassHooks};
pub use delegate::{DelegationMode, DelegationVTableBuilder};
pub use error::{ObjectError, ObjectResult, RoleConflict};
pub use gc::{CollectionBlock, CollectorHooks, NoopCollector};
pub use layout::{AttributeLayout, AttributeLayoutBuilder};
pub use method::{Method, MethodMap, Namespace};
pub use method_cache::{CacheStats, MethodCache};
pub use name::{Name, NameTable};
pub use native::{ArrayType, IntegerType, NativeInstance, NativeRef, NativeType, MAX_ARRAY_LEN};
pub use object::{Object, ObjectRef};
pub use options::RuntimeOptions;
pub use registry::{TypeEntry, TypeId, TypeKind, TypeRegistry};
pub use resolver::MethodResolver;
pub use role::{ComposeTarget, Composition, Role, RoleId};
pub use runtime::Runtime;
pub use value::Value;
pub use vtable::{BaseTables, Handler, Mro, Op, VTable};
