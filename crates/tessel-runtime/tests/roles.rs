//! Integration tests for role composition
//!
//! Tests cover:
//! - Composing roles into classes and other roles
//! - Conflict detection leaving the target untouched
//! - Exclusions and aliases
//! - `does` checks through inheritance and absorbed roles

use pretty_assertions::assert_eq;
use tessel_runtime::{
    ComposeTarget, Composition, Method, ObjectError, Op, RoleConflict, RoleId, Runtime, TypeId,
    Value,
};

fn constant(name: &str, text: &'static str) -> Method {
    Method::new(name, move |_, _, _| Ok(Value::str(text)))
}

fn role_with(rt: &Runtime, name: &str, methods: &[(&str, &'static str)]) -> RoleId {
    let role = rt.create_role(name).unwrap();
    for (method, text) in methods {
        rt.add_role_method(role, constant(method, *text)).unwrap();
    }
    role
}

fn call(rt: &Runtime, class: TypeId, name: &str) -> Value {
    let obj = rt.instantiate(class, None).unwrap();
    rt.call_method(&obj, &rt.intern(name), &[]).unwrap()
}

// ===== Composition into classes =====

#[test]
fn test_role_methods_become_class_methods() {
    let rt = Runtime::new();
    let walker = role_with(&rt, "Walker", &[("walk", "walking"), ("stop", "stopped")]);
    let dog = rt.create_class("Dog", &[]).unwrap();

    rt.compose_role(walker, &Composition::new(), ComposeTarget::Class(dog))
        .unwrap();

    assert_eq!(call(&rt, dog, "walk"), Value::str("walking"));
    assert_eq!(call(&rt, dog, "stop"), Value::str("stopped"));
    assert!(rt.class_does(dog, walker).unwrap());
}

#[test]
fn test_conflict_leaves_class_untouched() {
    let rt = Runtime::new();
    let role = role_with(&rt, "R", &[("bar", "role bar"), ("foo", "role foo")]);
    let class = rt.create_class("C", &[]).unwrap();
    rt.add_method(class, constant("foo", "class foo")).unwrap();

    let err = rt
        .compose_role(role, &Composition::new(), ComposeTarget::Class(class))
        .unwrap_err();
    assert_eq!(
        err,
        ObjectError::RoleConflict(RoleConflict::ExistingMethod {
            method: "foo".to_string()
        })
    );
    assert_eq!(
        err.to_string(),
        "A conflict occurred during role composition due to method 'foo'."
    );

    assert_eq!(call(&rt, class, "foo"), Value::str("class foo"));
    assert!(rt.find_method(class, &rt.intern("bar"), false).unwrap().is_none());
    assert!(!rt.class_does(class, role).unwrap());
}

#[test]
fn test_exclude_and_alias_resolve_conflict() {
    let rt = Runtime::new();
    let role = role_with(&rt, "R", &[("bar", "role bar"), ("foo", "role foo")]);
    let class = rt.create_class("C", &[]).unwrap();
    rt.add_method(class, constant("foo", "class foo")).unwrap();

    let composition = Composition::new().alias("foo", "role_foo").exclude("bar");
    rt.compose_role(role, &composition, ComposeTarget::Class(class))
        .unwrap();

    assert_eq!(call(&rt, class, "foo"), Value::str("class foo"));
    assert_eq!(call(&rt, class, "role_foo"), Value::str("role foo"));
    assert!(rt.find_method(class, &rt.intern("bar"), false).unwrap().is_none());
}

#[test]
fn test_alias_onto_existing_method_conflicts() {
    let rt = Runtime::new();
    let role = role_with(&rt, "R", &[("speak", "role")]);
    let class = rt.create_class("C", &[]).unwrap();
    rt.add_method(class, constant("talk", "class")).unwrap();

    let err = rt
        .compose_role(
            role,
            &Composition::new().alias("speak", "talk"),
            ComposeTarget::Class(class),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ObjectError::RoleConflict(RoleConflict::ExistingAlias { .. })
    ));
}

#[test]
fn test_composing_twice_is_noop() {
    let rt = Runtime::new();
    let role = role_with(&rt, "R", &[("foo", "role foo")]);
    let class = rt.create_class("C", &[]).unwrap();
    let target = ComposeTarget::Class(class);

    rt.compose_role(role, &Composition::new(), target).unwrap();
    // the second pass would conflict on foo if it ran
    rt.compose_role(role, &Composition::new(), target).unwrap();

    let entry = rt.type_entry(class).unwrap();
    let data = entry.class_data().unwrap().read();
    assert_eq!(data.roles(), &[role]);
}

#[test]
fn test_composition_invalidates_cache() {
    let rt = Runtime::new();
    let role = role_with(&rt, "Greeter", &[("greet", "hello")]);
    let class = rt.create_class("C", &[]).unwrap();
    rt.add_method(class, constant("name", "c")).unwrap();
    rt.find_method(class, &rt.intern("name"), true).unwrap();
    assert_eq!(rt.cached_methods(class), 1);

    rt.compose_role(role, &Composition::new(), ComposeTarget::Class(class))
        .unwrap();
    assert_eq!(rt.cached_methods(class), 0);
}

#[test]
fn test_role_can_supply_op_override() {
    let rt = Runtime::new();
    let role = role_with(&rt, "Printable", &[("__get_string", "printed")]);
    let class = rt.create_class("Doc", &[]).unwrap();
    rt.compose_role(role, &Composition::new(), ComposeTarget::Class(class))
        .unwrap();

    let obj = Value::Object(rt.instantiate(class, None).unwrap());
    assert_eq!(rt.dispatch(&obj, Op::GetString, &[]).unwrap(), Value::str("printed"));
}

// ===== Roles in roles =====

#[test]
fn test_role_absorbs_role() {
    let rt = Runtime::new();
    let inner = role_with(&rt, "Inner", &[("a", "from inner")]);
    let outer = role_with(&rt, "Outer", &[("b", "from outer")]);
    rt.compose_role(inner, &Composition::new(), ComposeTarget::Role(outer))
        .unwrap();

    let outer_role = rt.role(outer).unwrap();
    assert_eq!(outer_role.roles(), vec![inner]);
    let names: Vec<String> = outer_role
        .namespace()
        .names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    let class = rt.create_class("C", &[]).unwrap();
    rt.compose_role(outer, &Composition::new(), ComposeTarget::Class(class))
        .unwrap();
    assert!(rt.class_does(class, outer).unwrap());
    assert!(rt.class_does(class, inner).unwrap());
    assert_eq!(call(&rt, class, "a"), Value::str("from inner"));

    // already absorbed through Outer
    rt.compose_role(inner, &Composition::new(), ComposeTarget::Class(class))
        .unwrap();
    let entry = rt.type_entry(class).unwrap();
    assert_eq!(entry.class_data().unwrap().read().roles(), &[outer, inner]);
}

#[test]
fn test_role_into_itself_rejected() {
    let rt = Runtime::new();
    let role = role_with(&rt, "R", &[("a", "a")]);
    let err = rt
        .compose_role(role, &Composition::new(), ComposeTarget::Role(role))
        .unwrap_err();
    assert!(matches!(err, ObjectError::InvalidOperation(_)));
}

#[test]
fn test_duplicate_role_name_rejected() {
    let rt = Runtime::new();
    let first = rt.create_role("R").unwrap();
    assert!(rt.create_role("R").is_err());
    assert_eq!(rt.lookup_role("R"), Some(first));
    assert_eq!(rt.lookup_role("S"), None);
}

// ===== does =====

#[test]
fn test_subclass_does_parent_role() {
    let rt = Runtime::new();
    let role = role_with(&rt, "Swimmer", &[("swim", "splash")]);
    let animal = rt.create_class("Animal", &[]).unwrap();
    let dog = rt.create_class("Dog", &[animal]).unwrap();
    let rock = rt.create_class("Rock", &[]).unwrap();
    rt.compose_role(role, &Composition::new(), ComposeTarget::Class(animal))
        .unwrap();

    let rex = rt.instantiate(dog, None).unwrap();
    assert!(rt.does(&rex, role).unwrap());
    assert!(!rt.class_does(rock, role).unwrap());
    assert_eq!(call(&rt, dog, "swim"), Value::str("splash"));

    let rex = Value::Object(rex);
    assert_eq!(
        rt.dispatch(&rex, Op::Does, &[Value::str("Swimmer")]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        rt.dispatch(&rex, Op::Does, &[Value::str("Flyer")]).unwrap(),
        Value::Bool(false)
    );
}
