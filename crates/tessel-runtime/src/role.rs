//! Roles
//!
//! A role is a named bag of methods that can be composed into classes and
//! other roles. Composition is check-then-commit: every conflict is found
//! before the target's method table is touched.

use crate::error::{ObjectError, ObjectResult, RoleConflict};
use crate::method::{Method, MethodMap, Namespace};
use crate::registry::TypeId;
use crate::runtime::Runtime;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Role identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(u32);

impl RoleId {
    /// Raw id
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role#{}", self.0)
    }
}

/// A composable bag of methods
#[derive(Debug)]
pub struct Role {
    id: RoleId,
    name: Arc<str>,
    namespace: Namespace,
    roles: RwLock<Vec<RoleId>>,
}

impl Role {
    /// Role id
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Role name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods provided by the role (flattened from composed roles)
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Roles this role has absorbed
    pub fn roles(&self) -> Vec<RoleId> {
        self.roles.read().clone()
    }
}

/// All roles known to a runtime
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: RwLock<Vec<Arc<Role>>>,
    by_name: RwLock<FxHashMap<Arc<str>, RoleId>>,
}

impl RoleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty role
    pub fn create(&self, name: &str) -> ObjectResult<RoleId> {
        let mut by_name = self.by_name.write();
        if by_name.contains_key(name) {
            return Err(ObjectError::InvalidOperation(format!(
                "role '{}' already exists",
                name
            )));
        }
        let mut roles = self.roles.write();
        let id = RoleId(roles.len() as u32);
        let name: Arc<str> = Arc::from(name);
        roles.push(Arc::new(Role {
            id,
            name: name.clone(),
            namespace: Namespace::new(),
            roles: RwLock::new(Vec::new()),
        }));
        by_name.insert(name, id);
        Ok(id)
    }

    /// Role by id
    pub fn get(&self, id: RoleId) -> ObjectResult<Arc<Role>> {
        self.roles
            .read()
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| ObjectError::InvalidOperation(format!("unknown role {}", id)))
    }

    /// Role bound to `name`
    pub fn lookup(&self, name: &str) -> Option<RoleId> {
        self.by_name.read().get(name).copied()
    }

    /// Number of roles
    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    /// Check if no role exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a role is composed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeTarget {
    /// A class namespace
    Class(TypeId),
    /// Another role
    Role(RoleId),
}

/// Methods to leave out and methods to rename during composition
#[derive(Debug, Clone, Default)]
pub struct Composition {
    excludes: Vec<String>,
    aliases: FxHashMap<String, String>,
}

impl Composition {
    /// Compose everything under its own name
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave `method` out
    pub fn exclude(mut self, method: &str) -> Self {
        self.excludes.push(method.to_string());
        self
    }

    /// Compose `method` under `alias` instead of its own name
    pub fn alias(mut self, method: &str, alias: &str) -> Self {
        self.aliases.insert(method.to_string(), alias.to_string());
        self
    }

    fn effective_name<'a>(&'a self, method: &'a str) -> Option<&'a str> {
        if self.excludes.iter().any(|e| e == method) {
            return None;
        }
        Some(self.aliases.get(method).map(String::as_str).unwrap_or(method))
    }
}

/// Merge a role's methods into a target method table
///
/// Returns `Ok(false)` without touching anything if the role was already
/// composed. On conflict nothing is modified. `role_methods` are visited in
/// name order so conflict reports are deterministic.
pub fn compose(
    role: RoleId,
    role_methods: &MethodMap,
    role_roles: &[RoleId],
    composition: &Composition,
    target_methods: &mut MethodMap,
    target_roles_done: &mut Vec<RoleId>,
) -> Result<bool, RoleConflict> {
    if target_roles_done.contains(&role) {
        return Ok(false);
    }

    let mut names: Vec<&Arc<str>> = role_methods.keys().collect();
    names.sort();

    let mut proposed: Vec<(Arc<str>, Method)> = Vec::with_capacity(names.len());
    for name in names {
        let Some(effective) = composition.effective_name(name) else {
            continue;
        };
        let aliased = effective != &**name;

        if target_methods.contains_key(effective) {
            return Err(if aliased {
                RoleConflict::ExistingAlias {
                    method: name.to_string(),
                    alias: effective.to_string(),
                }
            } else {
                RoleConflict::ExistingMethod {
                    method: name.to_string(),
                }
            });
        }
        if proposed.iter().any(|(n, _)| &**n == effective) {
            return Err(if aliased {
                RoleConflict::AliasShadowsRoleMethod {
                    method: name.to_string(),
                    alias: effective.to_string(),
                }
            } else {
                RoleConflict::SelfConflict {
                    method: name.to_string(),
                }
            });
        }

        if let Some(method) = role_methods.get(name) {
            proposed.push((Arc::from(effective), method.clone()));
        }
    }

    target_methods.extend(proposed);
    target_roles_done.push(role);
    for absorbed in role_roles {
        if !target_roles_done.contains(absorbed) {
            target_roles_done.push(*absorbed);
        }
    }
    Ok(true)
}

impl Runtime {
    /// Create an empty role
    pub fn create_role(&self, name: &str) -> ObjectResult<RoleId> {
        let id = self.roles.create(name)?;
        debug!(role = name, id = id.raw(), "role created");
        Ok(id)
    }

    /// Role by id
    pub fn role(&self, id: RoleId) -> ObjectResult<Arc<Role>> {
        self.roles.get(id)
    }

    /// Role bound to `name`
    pub fn lookup_role(&self, name: &str) -> Option<RoleId> {
        self.roles.lookup(name)
    }

    /// Add a method to a role
    pub fn add_role_method(&self, role: RoleId, method: Method) -> ObjectResult<()> {
        let role = self.roles.get(role)?;
        let name = method.name().to_string();
        role.namespace.insert(&name, method);
        Ok(())
    }

    /// Compose `role` into a class or another role
    ///
    /// Composing a role that is already present is a no-op. Class caches are
    /// invalidated when methods were added.
    pub fn compose_role(
        &self,
        role: RoleId,
        composition: &Composition,
        target: ComposeTarget,
    ) -> ObjectResult<()> {
        let source = self.roles.get(role)?;
        let role_methods = source.namespace.snapshot();
        let role_roles = source.roles();

        let (target_name, composed) = match target {
            ComposeTarget::Class(class) => {
                let entry = self.registry.entry(class)?;
                let data = entry.class_data()?;
                let namespace = entry.namespace();
                let mut data = data.write();
                let composed = namespace.with_write(|methods| {
                    compose(
                        role,
                        &role_methods,
                        &role_roles,
                        composition,
                        methods,
                        &mut data.roles,
                    )
                })?;
                (entry.shared_name(), composed)
            }
            ComposeTarget::Role(target_role) => {
                if target_role == role {
                    return Err(ObjectError::InvalidOperation(format!(
                        "role '{}' can't be composed into itself",
                        source.name
                    )));
                }
                let target = self.roles.get(target_role)?;
                let mut roles_done = target.roles.write();
                let composed = target.namespace.with_write(|methods| {
                    compose(
                        role,
                        &role_methods,
                        &role_roles,
                        composition,
                        methods,
                        &mut roles_done,
                    )
                })?;
                (target.name.clone(), composed)
            }
        };

        if composed {
            if let ComposeTarget::Class(_) = target {
                self.cache.invalidate(None);
            }
            debug!(
                role = source.name(),
                into = &*target_name,
                methods = role_methods.len(),
                "role composed"
            );
        }
        Ok(())
    }

    /// Check if a class (or any ancestor) does `role`
    pub fn class_does(&self, class: TypeId, role: RoleId) -> ObjectResult<bool> {
        let mro = self.registry.entry(class)?.mro();
        for ancestor in mro.iter() {
            if let Ok(data) = self.registry.entry(*ancestor)?.class_data() {
                if data.read().roles.contains(&role) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
