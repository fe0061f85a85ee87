//! Error types for the object runtime
//!
//! Every fallible operation returns [`ObjectResult`]. Errors are raised at the
//! detecting operation and unwind to the caller; the runtime never retries.

use crate::registry::TypeId;

/// Object runtime errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    /// A usable type is already bound to this name
    #[error("Class {name} already registered")]
    DuplicateClass {
        /// The contested name
        name: String,
    },

    /// The name is reserved by a native (non-class) type
    #[error("native type with name '{name}' already exists - can't register class")]
    NativeTypeConflict {
        /// The contested name
        name: String,
    },

    /// No C3 linearization exists for the requested parents
    #[error("Could not build C3 linearization for '{class}': ambiguous hierarchy")]
    InconsistentHierarchy {
        /// Class whose MRO could not be computed
        class: String,
    },

    /// Attribute lookup by name or index failed
    #[error("No such attribute {0}")]
    AttributeNotFound(String),

    /// The class already declares this attribute
    #[error("Attribute '{class}\\0{attribute}' already exists")]
    AttributeAlreadyExists {
        /// Declaring class
        class: String,
        /// Attribute name
        attribute: String,
    },

    /// A declared method could not be resolved
    #[error("Method '{method}' not found for class '{class}'")]
    MethodNotFound {
        /// Class searched
        class: String,
        /// Method name
        method: String,
    },

    /// Role composition detected a conflict; nothing was changed
    #[error(transparent)]
    RoleConflict(#[from] RoleConflict),

    /// Operation not permitted in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Error raised by user code (a constructor hook or method body)
    #[error("{0}")]
    Raised(String),
}

impl ObjectError {
    /// Attribute miss for a (possibly class-qualified) attribute name
    pub fn attribute_named(name: &str) -> Self {
        match name.split_once('\0') {
            Some((class, attr)) => {
                ObjectError::AttributeNotFound(format!("'{}\\0{}'", class, attr))
            }
            None => ObjectError::AttributeNotFound(format!("'{}'", name)),
        }
    }

    /// Attribute miss for a numeric slot
    pub fn attribute_index(index: usize) -> Self {
        ObjectError::AttributeNotFound(format!("#{}", index))
    }

    /// Reference to a type id that is not installed in the registry
    pub fn unknown_type(id: TypeId) -> Self {
        ObjectError::InvalidOperation(format!("unknown type {}", id))
    }

    /// Type exists but is not a class
    pub fn not_a_class(name: &str) -> Self {
        ObjectError::InvalidOperation(format!("'{}' isn't a class", name))
    }
}

/// Role composition conflicts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleConflict {
    /// The target already has a method with this name
    #[error("A conflict occurred during role composition due to method '{method}'.")]
    ExistingMethod {
        /// Method name
        method: String,
    },

    /// Aliasing produced a name the target already has
    #[error(
        "A conflict occurred during role composition due to the aliasing of '{method}' to '{alias}'."
    )]
    ExistingAlias {
        /// Original method name
        method: String,
        /// Alias target
        alias: String,
    },

    /// Aliasing produced a name the role itself also proposes
    #[error(
        "A conflict occurred during role composition; '{method}' was aliased to '{alias}', but the role already has a '{alias}'."
    )]
    AliasShadowsRoleMethod {
        /// Original method name
        method: String,
        /// Alias target
        alias: String,
    },

    /// The same name was proposed twice without aliasing
    #[error(
        "A conflict occurred during role composition; the method '{method}' from the role conflicts with itself."
    )]
    SelfConflict {
        /// Method name
        method: String,
    },
}

/// Object runtime result
pub type ObjectResult<T> = Result<T, ObjectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_messages() {
        let bare = ObjectError::attribute_named("name");
        assert_eq!(bare.to_string(), "No such attribute 'name'");

        let qualified = ObjectError::attribute_named("Dog\0breed");
        assert_eq!(qualified.to_string(), "No such attribute 'Dog\\0breed'");

        let numbered = ObjectError::attribute_index(7);
        assert_eq!(numbered.to_string(), "No such attribute #7");
    }

    #[test]
    fn test_role_conflict_converts() {
        let err: ObjectError = RoleConflict::ExistingMethod {
            method: "foo".to_string(),
        }
        .into();
        assert!(matches!(err, ObjectError::RoleConflict(_)));
        assert!(err.to_string().contains("'foo'"));
    }

    #[test]
    fn test_alias_messages_name_both_sides() {
        let err = RoleConflict::ExistingAlias {
            method: "speak".to_string(),
            alias: "talk".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'speak'"));
        assert!(msg.contains("'talk'"));
    }
}
