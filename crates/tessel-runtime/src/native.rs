//! Native (non-class) types
//!
//! Native types are implemented in Rust and never have attributes or an MRO
//! beyond themselves. A class that inherits from one wraps an instance of it
//! and forwards unoverridden operations to that instance.

use crate::error::{ObjectError, ObjectResult};
use crate::registry::TypeId;
use crate::value::Value;
use crate::vtable::Op;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Shared native instance
pub type NativeRef = Arc<dyn NativeInstance>;

/// A built-in type
pub trait NativeType: Send + Sync {
    /// Registered name
    fn name(&self) -> &str;

    /// Whether the type implements `op`
    fn supports(&self, op: Op) -> bool;

    /// Allocate and initialize a fresh instance
    fn instantiate(&self, type_id: TypeId) -> ObjectResult<NativeRef>;
}

/// An instance of a built-in type
pub trait NativeInstance: Send + Sync + fmt::Debug {
    /// Type this instance belongs to
    fn type_id(&self) -> TypeId;

    /// Execute an operation
    fn invoke(&self, op: Op, args: &[Value]) -> ObjectResult<Value>;
}

fn unsupported(type_name: &str, op: Op) -> ObjectError {
    ObjectError::InvalidOperation(format!(
        "{} not implemented in type '{}'",
        op.slot_name(),
        type_name
    ))
}

fn int_arg(args: &[Value], index: usize, op: Op) -> ObjectResult<i64> {
    args.get(index).and_then(Value::as_int).ok_or_else(|| {
        ObjectError::InvalidOperation(format!(
            "{} expects an integer argument at position {}",
            op.slot_name(),
            index
        ))
    })
}

/// Largest element count an [`ArrayValue`] may grow to
pub const MAX_ARRAY_LEN: usize = 1 << 28;

/// Resize `items` to `len`, failing instead of aborting on huge requests
fn grow_to(items: &mut Vec<Value>, len: usize, op: Op) -> ObjectResult<()> {
    if len > MAX_ARRAY_LEN {
        return Err(ObjectError::InvalidOperation(format!(
            "{}: size {} exceeds the array limit of {}",
            op.slot_name(),
            len,
            MAX_ARRAY_LEN
        )));
    }
    if len > items.len() {
        items.try_reserve(len - items.len()).map_err(|_| {
            ObjectError::InvalidOperation(format!(
                "{}: can't allocate {} elements",
                op.slot_name(),
                len
            ))
        })?;
    }
    items.resize(len, Value::Null);
    Ok(())
}

/// Resolve a possibly negative index against `len`
fn normalize_index(len: usize, raw: i64) -> Option<usize> {
    let len = len as i64;
    let idx = if raw < 0 { len + raw } else { raw };
    (0..len).contains(&idx).then_some(idx as usize)
}

// ============================================================================
// Integer
// ============================================================================

/// Boxed integer
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerType;

const INTEGER_OPS: &[Op] = &[
    Op::Init,
    Op::InitPmc,
    Op::Clone,
    Op::Name,
    Op::GetInteger,
    Op::SetIntegerNative,
    Op::GetNumber,
    Op::GetString,
    Op::GetRepr,
    Op::GetBool,
    Op::Defined,
    Op::Add,
    Op::Subtract,
    Op::Multiply,
    Op::Neg,
    Op::Absolute,
    Op::InPlaceAdd,
    Op::Increment,
    Op::Decrement,
    Op::IsEqual,
    Op::Cmp,
    Op::Assign,
];

impl NativeType for IntegerType {
    fn name(&self) -> &str {
        "Integer"
    }

    fn supports(&self, op: Op) -> bool {
        INTEGER_OPS.contains(&op)
    }

    fn instantiate(&self, type_id: TypeId) -> ObjectResult<NativeRef> {
        Ok(Arc::new(IntegerValue::new(type_id, 0)))
    }
}

/// Instance of [`IntegerType`]
#[derive(Debug)]
pub struct IntegerValue {
    type_id: TypeId,
    value: Mutex<i64>,
}

impl IntegerValue {
    /// Create a boxed integer
    pub fn new(type_id: TypeId, value: i64) -> Self {
        Self {
            type_id,
            value: Mutex::new(value),
        }
    }

    /// Current value
    pub fn get(&self) -> i64 {
        *self.value.lock()
    }
}

impl NativeInstance for IntegerValue {
    fn type_id(&self) -> TypeId {
        self.type_id
    }

    fn invoke(&self, op: Op, args: &[Value]) -> ObjectResult<Value> {
        let mut value = self.value.lock();
        match op {
            Op::Init => {
                *value = 0;
                Ok(Value::Null)
            }
            Op::InitPmc | Op::SetIntegerNative | Op::Assign => {
                *value = int_arg(args, 0, op)?;
                Ok(Value::Null)
            }
            Op::Clone => Ok(Value::Native(Arc::new(IntegerValue::new(
                self.type_id,
                *value,
            )))),
            Op::Name => Ok(Value::str("Integer")),
            Op::GetInteger => Ok(Value::Int(*value)),
            Op::GetNumber => Ok(Value::Float(*value as f64)),
            Op::GetString | Op::GetRepr => Ok(Value::str(&value.to_string())),
            Op::GetBool => Ok(Value::Bool(*value != 0)),
            Op::Defined => Ok(Value::Bool(true)),
            Op::Add => Ok(Value::Int(value.wrapping_add(int_arg(args, 0, op)?))),
            Op::Subtract => Ok(Value::Int(value.wrapping_sub(int_arg(args, 0, op)?))),
            Op::Multiply => Ok(Value::Int(value.wrapping_mul(int_arg(args, 0, op)?))),
            Op::Neg => Ok(Value::Int(value.wrapping_neg())),
            Op::Absolute => Ok(Value::Int(value.wrapping_abs())),
            Op::InPlaceAdd => {
                *value = value.wrapping_add(int_arg(args, 0, op)?);
                Ok(Value::Null)
            }
            Op::Increment => {
                *value = value.wrapping_add(1);
                Ok(Value::Null)
            }
            Op::Decrement => {
                *value = value.wrapping_sub(1);
                Ok(Value::Null)
            }
            Op::IsEqual => Ok(Value::Bool(*value == int_arg(args, 0, op)?)),
            Op::Cmp => Ok(Value::Int(match value.cmp(&int_arg(args, 0, op)?) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            })),
            _ => Err(unsupported("Integer", op)),
        }
    }
}

// ============================================================================
// Array
// ============================================================================

/// Growable array of values
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayType;

const ARRAY_OPS: &[Op] = &[
    Op::Init,
    Op::Clone,
    Op::Name,
    Op::GetBool,
    Op::GetInteger,
    Op::Defined,
    Op::Elements,
    Op::SetIntegerSize,
    Op::GetPmcKeyedInt,
    Op::SetPmcKeyedInt,
    Op::ExistsKeyed,
    Op::PushPmc,
    Op::PopPmc,
    Op::ShiftPmc,
    Op::UnshiftPmc,
];

impl NativeType for ArrayType {
    fn name(&self) -> &str {
        "Array"
    }

    fn supports(&self, op: Op) -> bool {
        ARRAY_OPS.contains(&op)
    }

    fn instantiate(&self, type_id: TypeId) -> ObjectResult<NativeRef> {
        Ok(Arc::new(ArrayValue::new(type_id)))
    }
}

/// Instance of [`ArrayType`]
#[derive(Debug)]
pub struct ArrayValue {
    type_id: TypeId,
    items: Mutex<Vec<Value>>,
}

impl ArrayValue {
    /// Create an empty array
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl NativeInstance for ArrayValue {
    fn type_id(&self) -> TypeId {
        self.type_id
    }

    fn invoke(&self, op: Op, args: &[Value]) -> ObjectResult<Value> {
        let mut items = self.items.lock();
        match op {
            Op::Init => {
                items.clear();
                Ok(Value::Null)
            }
            Op::Clone => Ok(Value::Native(Arc::new(ArrayValue {
                type_id: self.type_id,
                items: Mutex::new(items.clone()),
            }))),
            Op::Name => Ok(Value::str("Array")),
            Op::GetBool => Ok(Value::Bool(!items.is_empty())),
            Op::GetInteger | Op::Elements => Ok(Value::Int(items.len() as i64)),
            Op::Defined => Ok(Value::Bool(true)),
            Op::SetIntegerSize => {
                let size = usize::try_from(int_arg(args, 0, op)?.max(0)).unwrap_or(usize::MAX);
                grow_to(&mut items, size, op)?;
                Ok(Value::Null)
            }
            Op::GetPmcKeyedInt => {
                let raw = int_arg(args, 0, op)?;
                Ok(normalize_index(items.len(), raw)
                    .map(|i| items[i].clone())
                    .unwrap_or(Value::Null))
            }
            Op::SetPmcKeyedInt => {
                let raw = int_arg(args, 0, op)?;
                let value = args.get(1).cloned().unwrap_or_default();
                if raw >= 0 && raw as usize >= items.len() {
                    let len = (raw as usize).saturating_add(1);
                    grow_to(&mut items, len, op)?;
                }
                let i = normalize_index(items.len(), raw).ok_or_else(|| {
                    ObjectError::InvalidOperation(format!("index {} out of bounds", raw))
                })?;
                items[i] = value;
                Ok(Value::Null)
            }
            Op::ExistsKeyed => {
                let raw = int_arg(args, 0, op)?;
                Ok(Value::Bool(normalize_index(items.len(), raw).is_some()))
            }
            Op::PushPmc => {
                items.push(args.first().cloned().unwrap_or_default());
                Ok(Value::Null)
            }
            Op::PopPmc => Ok(items.pop().unwrap_or_default()),
            Op::ShiftPmc => Ok(if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }),
            Op::UnshiftPmc => {
                items.insert(0, args.first().cloned().unwrap_or_default());
                Ok(Value::Null)
            }
            _ => Err(unsupported("Array", op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ops() {
        let int = IntegerType.instantiate(TypeId::from_raw(0)).unwrap();
        int.invoke(Op::SetIntegerNative, &[Value::Int(41)]).unwrap();
        int.invoke(Op::Increment, &[]).unwrap();
        assert_eq!(int.invoke(Op::GetInteger, &[]).unwrap(), Value::Int(42));
        assert_eq!(int.invoke(Op::GetString, &[]).unwrap(), Value::str("42"));
        assert_eq!(
            int.invoke(Op::Cmp, &[Value::Int(50)]).unwrap(),
            Value::Int(-1)
        );
    }

    #[test]
    fn test_integer_rejects_unsupported() {
        let int = IntegerType.instantiate(TypeId::from_raw(0)).unwrap();
        assert!(!IntegerType.supports(Op::PushPmc));
        let err = int.invoke(Op::PushPmc, &[]).unwrap_err();
        assert!(err.to_string().contains("__push_pmc"));
    }

    #[test]
    fn test_array_push_pop_shift() {
        let array = ArrayType.instantiate(TypeId::from_raw(1)).unwrap();
        array.invoke(Op::PushPmc, &[Value::Int(1)]).unwrap();
        array.invoke(Op::PushPmc, &[Value::Int(2)]).unwrap();
        array.invoke(Op::UnshiftPmc, &[Value::Int(0)]).unwrap();
        assert_eq!(array.invoke(Op::Elements, &[]).unwrap(), Value::Int(3));
        assert_eq!(array.invoke(Op::PopPmc, &[]).unwrap(), Value::Int(2));
        assert_eq!(array.invoke(Op::ShiftPmc, &[]).unwrap(), Value::Int(0));
        assert_eq!(
            array.invoke(Op::GetPmcKeyedInt, &[Value::Int(-1)]).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_array_keyed_set_grows() {
        let array = ArrayType.instantiate(TypeId::from_raw(1)).unwrap();
        array
            .invoke(Op::SetPmcKeyedInt, &[Value::Int(3), Value::str("x")])
            .unwrap();
        assert_eq!(array.invoke(Op::Elements, &[]).unwrap(), Value::Int(4));
        assert!(array
            .invoke(Op::GetPmcKeyedInt, &[Value::Int(0)])
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_array_huge_size_rejected() {
        let array = ArrayType.instantiate(TypeId::from_raw(1)).unwrap();
        array.invoke(Op::PushPmc, &[Value::Int(7)]).unwrap();

        let err = array
            .invoke(Op::SetIntegerSize, &[Value::Int(i64::MAX)])
            .unwrap_err();
        assert!(matches!(err, ObjectError::InvalidOperation(_)));
        let err = array
            .invoke(Op::SetPmcKeyedInt, &[Value::Int(i64::MAX), Value::Int(1)])
            .unwrap_err();
        assert!(matches!(err, ObjectError::InvalidOperation(_)));

        // a rejected resize leaves the contents alone
        assert_eq!(array.invoke(Op::Elements, &[]).unwrap(), Value::Int(1));
        array.invoke(Op::SetIntegerSize, &[Value::Int(3)]).unwrap();
        assert_eq!(array.invoke(Op::Elements, &[]).unwrap(), Value::Int(3));
    }
}
