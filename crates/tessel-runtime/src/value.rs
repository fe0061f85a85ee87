//! Runtime values passed to and returned from operations

use crate::method::Method;
use crate::native::NativeRef;
use crate::object::ObjectRef;
use crate::registry::TypeId;
use std::sync::Arc;

/// A runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Null sentinel; every attribute slot starts here
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(Arc<str>),
    /// Class instance
    Object(ObjectRef),
    /// Native (non-class) instance
    Native(NativeRef),
    /// Method handle
    Method(Method),
    /// A type, used as a class-level receiver
    Type(TypeId),
}

impl Value {
    /// Build a string value
    pub fn str(text: &str) -> Self {
        Value::Str(Arc::from(text))
    }

    /// Check for the null sentinel
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object payload
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Native payload
    pub fn as_native(&self) -> Option<&NativeRef> {
        match self {
            Value::Native(native) => Some(native),
            _ => None,
        }
    }

    /// Truthiness used by boolean ops
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty() && &**s != "0",
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Value::Method(a), Value::Method(b)) => a.ptr_eq(b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}
