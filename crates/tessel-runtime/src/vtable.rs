//! Operation tables for dynamic dispatch
//!
//! Every type owns exactly one [`VTable`]: a fixed array of [`Handler`] tags
//! indexed by [`Op`]. Tables are created by cloning a parent's table and then
//! patching individual slots, so cloning is a shallow array copy and an
//! override is a single slot assignment.
//!
//! A table may carry a read-only variant. The variant shares the identity
//! fields of its primary table (type id, owning class, MRO and namespace);
//! every setter on [`VTable`] keeps the two in step.

use crate::method::Namespace;
use crate::registry::TypeId;
use std::fmt;
use std::sync::Arc;

/// Method resolution order: ancestor ids, the type itself first
pub type Mro = Arc<[TypeId]>;

macro_rules! define_ops {
    ($($variant:ident => $name:literal $(, $mutating:ident)?;)*) => {
        /// Behavioural operations a type can implement
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Op {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl Op {
            /// Every operation, in slot order
            pub const ALL: &'static [Op] = &[$(Op::$variant,)*];

            /// Number of slots in a table
            pub const COUNT: usize = Op::ALL.len();

            /// Method name a user override is declared under (`get_integer`)
            pub fn method_name(self) -> &'static str {
                match self {
                    $(Op::$variant => $name,)*
                }
            }

            /// Slot name with the internal prefix (`__get_integer`)
            pub fn slot_name(self) -> &'static str {
                match self {
                    $(Op::$variant => concat!("__", $name),)*
                }
            }

            /// Whether the operation modifies its receiver
            pub fn is_mutating(self) -> bool {
                match self {
                    $(Op::$variant => define_ops!(@mutating $($mutating)?),)*
                }
            }
        }
    };
    (@mutating mutating) => { true };
    (@mutating) => { false };
}

define_ops! {
    Init => "init", mutating;
    InitPmc => "init_pmc", mutating;
    Mark => "mark";
    Destroy => "destroy", mutating;
    Clone => "clone";
    Name => "name";
    Type => "type";
    GetClass => "get_class";
    GetNamespace => "get_namespace";
    Isa => "isa";
    Can => "can";
    Does => "does";
    FindMethod => "find_method";
    GetAttr => "get_attr";
    SetAttr => "set_attr", mutating;
    GetAttrStr => "get_attr_str";
    SetAttrStr => "set_attr_str", mutating;
    GetInteger => "get_integer";
    SetIntegerNative => "set_integer_native", mutating;
    GetNumber => "get_number";
    SetNumberNative => "set_number_native", mutating;
    GetString => "get_string";
    SetStringNative => "set_string_native", mutating;
    GetRepr => "get_repr";
    GetBool => "get_bool";
    SetBool => "set_bool", mutating;
    Defined => "defined";
    Elements => "elements";
    SetIntegerSize => "set_integer_size", mutating;
    GetIntegerKeyedInt => "get_integer_keyed_int";
    SetIntegerKeyedInt => "set_integer_keyed_int", mutating;
    GetPmcKeyedInt => "get_pmc_keyed_int";
    SetPmcKeyedInt => "set_pmc_keyed_int", mutating;
    GetPmcKeyedStr => "get_pmc_keyed_str";
    SetPmcKeyedStr => "set_pmc_keyed_str", mutating;
    ExistsKeyed => "exists_keyed";
    DeleteKeyed => "delete_keyed", mutating;
    PushPmc => "push_pmc", mutating;
    PopPmc => "pop_pmc", mutating;
    ShiftPmc => "shift_pmc", mutating;
    UnshiftPmc => "unshift_pmc", mutating;
    Splice => "splice", mutating;
    Add => "add";
    Subtract => "subtract";
    Multiply => "multiply";
    Divide => "divide";
    FloorDivide => "floor_divide";
    Modulus => "modulus";
    Pow => "pow";
    Neg => "neg";
    Absolute => "absolute";
    InPlaceAdd => "i_add", mutating;
    InPlaceSubtract => "i_subtract", mutating;
    InPlaceMultiply => "i_multiply", mutating;
    InPlaceDivide => "i_divide", mutating;
    Increment => "increment", mutating;
    Decrement => "decrement", mutating;
    BitwiseAnd => "bitwise_and";
    BitwiseOr => "bitwise_or";
    BitwiseXor => "bitwise_xor";
    BitwiseNot => "bitwise_not";
    ShiftLeft => "bitwise_shl";
    ShiftRight => "bitwise_shr";
    LogicalAnd => "logical_and";
    LogicalOr => "logical_or";
    LogicalNot => "logical_not";
    Cmp => "cmp";
    CmpNum => "cmp_num";
    CmpString => "cmp_string";
    IsEqual => "is_equal";
    IsSame => "is_same";
    Concatenate => "concatenate";
    InPlaceConcatenate => "i_concatenate", mutating;
    Repeat => "repeat";
    Substr => "substr";
    Invoke => "invoke";
    GetIter => "get_iter";
    Freeze => "freeze";
    Thaw => "thaw", mutating;
    Visit => "visit";
    Share => "share", mutating;
    Morph => "morph", mutating;
    Assign => "assign", mutating;
}

impl Op {
    /// Look up an operation by its bare method name
    pub fn from_method_name(name: &str) -> Option<Op> {
        Op::ALL.iter().copied().find(|op| op.method_name() == name)
    }

    /// Look up an operation by its prefixed slot name
    pub fn from_slot_name(name: &str) -> Option<Op> {
        name.strip_prefix("__").and_then(Op::from_method_name)
    }

    /// Slot index
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// What a table slot does when the operation is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    /// Not implemented for this type
    Missing,
    /// Create an instance of the owning class
    Instantiate,
    /// Call the user method overriding this operation
    Override,
    /// Built-in object behaviour (attributes, isa, can, ...)
    ObjectCore,
    /// Forward to the value wrapped in the `__value` slot
    Forward,
    /// The native type's own implementation
    Native,
    /// Reject: the receiver is read-only
    ReadOnly,
}

/// Per-type operation table
#[derive(Clone)]
pub struct VTable {
    base_type: TypeId,
    class: Option<TypeId>,
    mro: Mro,
    namespace: Namespace,
    slots: [Handler; Op::COUNT],
    ro_variant: Option<Box<VTable>>,
}

impl VTable {
    /// Create a table with every slot set to `handler`
    pub fn filled(base_type: TypeId, handler: Handler) -> Self {
        Self {
            base_type,
            class: None,
            mro: Arc::from(vec![base_type]),
            namespace: Namespace::new(),
            slots: [handler; Op::COUNT],
            ro_variant: None,
        }
    }

    /// Attach a read-only variant rejecting every mutating operation
    pub fn with_read_only_variant(mut self) -> Self {
        let mut ro = self.clone();
        ro.ro_variant = None;
        for op in Op::ALL.iter().copied().filter(|op| op.is_mutating()) {
            ro.slots[op.index()] = Handler::ReadOnly;
        }
        self.ro_variant = Some(Box::new(ro));
        self
    }

    /// Clone this table for a new type, rebinding the identity fields
    pub fn derive(
        &self,
        base_type: TypeId,
        class: Option<TypeId>,
        mro: Mro,
        namespace: Namespace,
    ) -> Self {
        let mut table = self.clone();
        table.base_type = base_type;
        table.class = class;
        table.mro = mro;
        table.namespace = namespace;
        table.sync_read_only_variant();
        table
    }

    /// Type id this table belongs to
    pub fn base_type(&self) -> TypeId {
        self.base_type
    }

    /// Owning class, if the type is a class
    pub fn class(&self) -> Option<TypeId> {
        self.class
    }

    /// Method resolution order
    pub fn mro(&self) -> &Mro {
        &self.mro
    }

    /// Namespace searched by method lookup
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Handler in a slot
    #[inline]
    pub fn slot(&self, op: Op) -> Handler {
        self.slots[op.index()]
    }

    /// Replace a slot handler
    #[inline]
    pub fn set_slot(&mut self, op: Op, handler: Handler) {
        self.slots[op.index()] = handler;
    }

    /// Read-only variant, if any
    pub fn read_only_variant(&self) -> Option<&VTable> {
        self.ro_variant.as_deref()
    }

    /// Replace a slot of the read-only variant (no-op without a variant)
    pub fn set_read_only_slot(&mut self, op: Op, handler: Handler) {
        if let Some(ro) = self.ro_variant.as_deref_mut() {
            ro.slots[op.index()] = handler;
        }
    }

    /// Replace the MRO, keeping the read-only variant in step
    pub fn set_mro(&mut self, mro: Mro) {
        self.mro = mro;
        self.sync_read_only_variant();
    }

    /// Replace the namespace, keeping the read-only variant in step
    pub fn set_namespace(&mut self, namespace: Namespace) {
        self.namespace = namespace;
        self.sync_read_only_variant();
    }

    /// Check that the read-only variant mirrors the identity fields
    pub fn read_only_consistent(&self) -> bool {
        match self.ro_variant.as_deref() {
            None => true,
            Some(ro) => {
                ro.base_type == self.base_type
                    && ro.class == self.class
                    && Arc::ptr_eq(&ro.mro, &self.mro)
                    && ro.namespace.same_as(&self.namespace)
            }
        }
    }

    /// Iterate `(op, handler)` pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Op, Handler)> + '_ {
        Op::ALL.iter().copied().map(move |op| (op, self.slots[op.index()]))
    }

    /// Number of slots holding `handler`
    pub fn count(&self, handler: Handler) -> usize {
        self.slots.iter().filter(|h| **h == handler).count()
    }

    fn sync_read_only_variant(&mut self) {
        if let Some(ro) = self.ro_variant.as_deref_mut() {
            ro.base_type = self.base_type;
            ro.class = self.class;
            ro.mro = self.mro.clone();
            ro.namespace = self.namespace.clone();
        }
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VTable")
            .field("base_type", &self.base_type)
            .field("class", &self.class)
            .field("mro", &self.mro)
            .field("overrides", &self.count(Handler::Override))
            .field("forwards", &self.count(Handler::Forward))
            .field("has_ro_variant", &self.ro_variant.is_some())
            .finish()
    }
}

/// Slots the generic object table handles itself instead of deferring to
/// user overrides
const OBJECT_CORE_OPS: &[Op] = &[
    Op::Mark,
    Op::Destroy,
    Op::Clone,
    Op::Name,
    Op::Type,
    Op::GetClass,
    Op::Isa,
    Op::Can,
    Op::Does,
    Op::FindMethod,
    Op::GetAttr,
    Op::SetAttr,
    Op::GetAttrStr,
    Op::SetAttrStr,
];

/// Tables every class table is derived from
#[derive(Debug, Clone)]
pub struct BaseTables {
    /// Default object behaviour: every slot defers to a user override
    pub default_object: VTable,
    /// Generic object table: default behaviour plus built-in object slots
    pub object: VTable,
    /// Class-level table: init slots instantiate
    pub class: VTable,
}

impl BaseTables {
    /// Build the base tables
    pub fn new() -> Self {
        let default_object = VTable::filled(TypeId::UNREGISTERED, Handler::Override);

        let mut object = default_object.clone();
        for op in OBJECT_CORE_OPS {
            object.set_slot(*op, Handler::ObjectCore);
        }
        let object = object.with_read_only_variant();

        let mut class = VTable::filled(TypeId::UNREGISTERED, Handler::Missing);
        class.set_slot(Op::Init, Handler::Instantiate);
        class.set_slot(Op::InitPmc, Handler::Instantiate);
        class.set_slot(Op::Name, Handler::ObjectCore);
        class.set_slot(Op::Type, Handler::ObjectCore);
        class.set_slot(Op::FindMethod, Handler::ObjectCore);

        Self {
            default_object,
            object,
            class,
        }
    }
}

impl Default for BaseTables {
    fn default() -> Self {
        Self::new()
    }
}
