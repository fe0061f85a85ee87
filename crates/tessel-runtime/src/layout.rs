//! Attribute layout
//!
//! A class's attribute slots are the concatenation of every ancestor's own
//! attributes, most ancestral first. Each attribute is reachable under its
//! bare name and under `Class\0attr`; a bare name shadowed by a descendant
//! resolves to the descendant's slot.

use crate::registry::TypeId;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Attribute that holds a wrapped native value
pub const VALUE_ATTRIBUTE: &str = "__value";

/// Build a class-qualified attribute name
pub fn qualified_name(class: &str, attribute: &str) -> String {
    format!("{}\0{}", class, attribute)
}

/// Flat attribute offsets for one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeLayout {
    offsets: FxHashMap<Arc<str>, usize>,
    class_offsets: FxHashMap<TypeId, usize>,
    count: usize,
}

impl AttributeLayout {
    /// Layout with no attributes
    pub fn empty() -> Self {
        Self::default()
    }

    /// Offset of a bare or qualified attribute name
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// First slot of an ancestor's attribute block
    pub fn class_offset(&self, class: TypeId) -> Option<usize> {
        self.class_offsets.get(&class).copied()
    }

    /// Total attribute count across the hierarchy
    pub fn count(&self) -> usize {
        self.count
    }

    /// Slot holding the wrapped native value
    ///
    /// The `__value` attribute when declared, slot 0 otherwise.
    pub fn delegate_slot(&self) -> usize {
        self.offset(VALUE_ATTRIBUTE).unwrap_or(0)
    }
}

/// Accumulates a layout from MRO entries, most ancestral first
#[derive(Debug, Default)]
pub struct AttributeLayoutBuilder {
    layout: AttributeLayout,
}

impl AttributeLayoutBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a class's own attributes
    pub fn push_class(&mut self, class: TypeId, class_name: &str, attributes: &[Arc<str>]) {
        let layout = &mut self.layout;
        layout.class_offsets.insert(class, layout.count);
        for attribute in attributes {
            let offset = layout.count;
            layout.offsets.insert(attribute.clone(), offset);
            layout
                .offsets
                .insert(Arc::from(qualified_name(class_name, attribute)), offset);
            layout.count += 1;
        }
    }

    /// Finished layout
    pub fn finish(self) -> AttributeLayout {
        self.layout
    }
}
