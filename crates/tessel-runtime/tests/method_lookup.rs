//! Integration tests for method resolution and dispatch
//!
//! Tests cover:
//! - Direct and cached lookup along the MRO
//! - Cache counters, bounded capacity and invalidation
//! - The `__get_string` to `__get_repr` fallback
//! - Op dispatch through overrides and built-in object slots
//! - Read-only instances

use pretty_assertions::assert_eq;
use tessel_runtime::{Method, Name, ObjectError, Op, Runtime, RuntimeOptions, TypeId, Value};

fn constant(name: &str, text: &'static str) -> Method {
    Method::new(name, move |_, _, _| Ok(Value::str(text)))
}

fn animals(rt: &Runtime) -> (TypeId, TypeId) {
    let animal = rt.create_class("Animal", &[]).unwrap();
    rt.add_attribute(animal, "name").unwrap();
    rt.add_method(animal, constant("speak", "...")).unwrap();
    rt.add_method(animal, constant("describe", "an animal")).unwrap();
    let dog = rt.create_class("Dog", &[animal]).unwrap();
    rt.add_method(dog, constant("speak", "woof")).unwrap();
    (animal, dog)
}

fn call(rt: &Runtime, class: TypeId, name: &str) -> Value {
    let obj = rt.instantiate(class, None).unwrap();
    rt.call_method(&obj, &rt.intern(name), &[]).unwrap()
}

// ===== Resolution =====

#[test]
fn test_subclass_overrides_parent() {
    let rt = Runtime::new();
    let (animal, dog) = animals(&rt);
    assert_eq!(call(&rt, dog, "speak"), Value::str("woof"));
    assert_eq!(call(&rt, dog, "describe"), Value::str("an animal"));
    assert_eq!(call(&rt, animal, "speak"), Value::str("..."));
}

#[test]
fn test_cached_and_direct_lookup_agree() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let speak = rt.intern("speak");

    let direct = rt.find_method(dog, &speak, false).unwrap().unwrap();
    let cached = rt.find_method(dog, &speak, true).unwrap().unwrap();
    let again = rt.find_method(dog, &speak, true).unwrap().unwrap();
    assert!(direct.ptr_eq(&cached));
    assert!(cached.ptr_eq(&again));

    let missing = rt.intern("fly");
    assert!(rt.find_method(dog, &missing, true).unwrap().is_none());
    assert!(rt.find_method(dog, &missing, false).unwrap().is_none());
}

#[test]
fn test_cache_counts_miss_then_hit() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let speak = rt.intern("speak");
    let before = rt.cache_stats();

    rt.find_method(dog, &speak, true).unwrap();
    rt.find_method(dog, &speak, true).unwrap();

    let after = rt.cache_stats();
    assert_eq!(after.misses - before.misses, 1);
    assert_eq!(after.hits - before.hits, 1);
    assert_eq!(rt.cached_methods(dog), 1);
}

#[test]
fn test_misses_are_not_cached() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let fly = rt.intern("fly");
    rt.find_method(dog, &fly, true).unwrap();
    rt.find_method(dog, &fly, true).unwrap();
    assert_eq!(rt.cached_methods(dog), 0);
}

#[test]
fn test_transient_names_bypass_cache() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let before = rt.cache_stats();

    let found = rt.find_method(dog, &Name::transient("speak"), true).unwrap();
    assert!(found.is_some());
    assert_eq!(rt.cache_stats(), before);
    assert_eq!(rt.cached_methods(dog), 0);
}

#[test]
fn test_disabled_cache_resolves_directly() {
    let rt = Runtime::with_options(RuntimeOptions::without_cache());
    let (_, dog) = animals(&rt);
    let speak = rt.intern("speak");
    for _ in 0..3 {
        assert!(rt.find_method(dog, &speak, true).unwrap().is_some());
    }
    assert_eq!(rt.cached_methods(dog), 0);
    assert_eq!(rt.cache_stats().hits, 0);
}

#[test]
fn test_bounded_cache_flushes_full_type() {
    let rt = Runtime::with_options(RuntimeOptions::with_cache_capacity(2));
    let (_, dog) = animals(&rt);
    rt.add_method(dog, constant("fetch", "stick")).unwrap();

    rt.find_method(dog, &rt.intern("speak"), true).unwrap();
    rt.find_method(dog, &rt.intern("describe"), true).unwrap();
    assert_eq!(rt.cached_methods(dog), 2);

    rt.find_method(dog, &rt.intern("fetch"), true).unwrap();
    assert_eq!(rt.cached_methods(dog), 1);
}

#[test]
fn test_lookup_tracing_still_resolves() {
    let rt = Runtime::with_options(RuntimeOptions::with_lookup_tracing());
    let (_, dog) = animals(&rt);
    assert_eq!(call(&rt, dog, "describe"), Value::str("an animal"));
}

#[test]
fn test_get_string_falls_back_to_get_repr() {
    let rt = Runtime::new();
    let point = rt.create_class("Point", &[]).unwrap();
    let repr = constant("__get_repr", "Point(0, 0)");
    rt.add_method(point, repr.clone()).unwrap();

    let found = rt
        .find_method(point, &rt.intern("__get_string"), true)
        .unwrap()
        .unwrap();
    assert!(found.ptr_eq(&repr));

    // an explicit __get_string wins
    rt.add_method(point, constant("__get_string", "(0, 0)")).unwrap();
    assert_eq!(call(&rt, point, "__get_string"), Value::str("(0, 0)"));
}

// ===== Invalidation =====

#[test]
fn test_add_method_invalidates_subclass_entries() {
    let rt = Runtime::new();
    let (animal, dog) = animals(&rt);
    let describe = rt.intern("describe");
    rt.find_method(dog, &describe, true).unwrap();
    assert_eq!(rt.cached_methods(dog), 1);

    rt.add_method(animal, constant("describe", "a creature")).unwrap();
    assert_eq!(rt.cached_methods(dog), 0);
    assert_eq!(call(&rt, dog, "describe"), Value::str("a creature"));
}

#[test]
fn test_invalidate_by_name() {
    let rt = Runtime::new();
    let (animal, dog) = animals(&rt);
    let speak = rt.intern("speak");
    rt.find_method(dog, &speak, true).unwrap();
    rt.find_method(animal, &speak, true).unwrap();

    rt.invalidate_method_cache_by_name(Some("Unknown"));
    assert_eq!(rt.cached_methods(dog), 1);

    rt.invalidate_method_cache_by_name(Some("Dog"));
    assert_eq!(rt.cached_methods(dog), 0);
    assert_eq!(rt.cached_methods(animal), 1);

    rt.invalidate_method_cache_by_name(None);
    assert_eq!(rt.cached_methods(animal), 0);
}

#[test]
fn test_invalidation_is_counted() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let before = rt.cache_stats().invalidations;
    rt.invalidate_method_cache(Some(dog));
    rt.invalidate_method_cache(None);
    assert_eq!(rt.cache_stats().invalidations - before, 2);
}

// ===== Dispatch =====

#[test]
fn test_dispatch_through_override() {
    let rt = Runtime::new();
    let point = rt.create_class("Point", &[]).unwrap();
    rt.add_method(point, constant("__get_string", "origin")).unwrap();
    let obj = Value::Object(rt.instantiate(point, None).unwrap());

    assert_eq!(rt.dispatch(&obj, Op::GetString, &[]).unwrap(), Value::str("origin"));
}

#[test]
fn test_dispatch_through_tagged_override() {
    let rt = Runtime::new();
    let (animal, dog) = animals(&rt);
    rt.add_method(
        animal,
        Method::with_vtable_slot("size", Op::Elements, |_, _, _| Ok(Value::Int(4))),
    )
    .unwrap();
    let obj = Value::Object(rt.instantiate(dog, None).unwrap());
    assert_eq!(rt.dispatch(&obj, Op::Elements, &[]).unwrap(), Value::Int(4));
}

#[test]
fn test_dispatch_without_override_fails() {
    let rt = Runtime::new();
    let point = rt.create_class("Point", &[]).unwrap();
    let obj = Value::Object(rt.instantiate(point, None).unwrap());
    assert_eq!(
        rt.dispatch(&obj, Op::GetInteger, &[]).unwrap_err(),
        ObjectError::MethodNotFound {
            class: "Point".to_string(),
            method: "__get_integer".to_string()
        }
    );
}

#[test]
fn test_core_object_ops() {
    let rt = Runtime::new();
    let (animal, dog) = animals(&rt);
    let obj = Value::Object(rt.instantiate(dog, None).unwrap());

    rt.dispatch(&obj, Op::SetAttrStr, &[Value::str("name"), Value::str("Rex")])
        .unwrap();
    assert_eq!(
        rt.dispatch(&obj, Op::GetAttrStr, &[Value::str("name")]).unwrap(),
        Value::str("Rex")
    );
    assert_eq!(rt.dispatch(&obj, Op::GetAttr, &[Value::Int(0)]).unwrap(), Value::str("Rex"));

    assert_eq!(rt.dispatch(&obj, Op::Isa, &[Value::Type(animal)]).unwrap(), Value::Bool(true));
    assert_eq!(rt.dispatch(&obj, Op::Isa, &[Value::str("Cat")]).unwrap(), Value::Bool(false));
    assert_eq!(rt.dispatch(&obj, Op::Can, &[Value::str("speak")]).unwrap(), Value::Bool(true));
    assert_eq!(rt.dispatch(&obj, Op::Can, &[Value::str("fly")]).unwrap(), Value::Bool(false));
    assert_eq!(rt.dispatch(&obj, Op::Name, &[]).unwrap(), Value::str("Dog"));
    assert_eq!(rt.dispatch(&obj, Op::GetClass, &[]).unwrap(), Value::Type(dog));

    let found = rt.dispatch(&obj, Op::FindMethod, &[Value::str("speak")]).unwrap();
    assert!(matches!(found, Value::Method(m) if m.name() == "speak"));
    assert!(rt
        .dispatch(&obj, Op::FindMethod, &[Value::str("fly")])
        .unwrap()
        .is_null());
}

#[test]
fn test_clone_copies_slots() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let obj = rt.instantiate(dog, None).unwrap();
    rt.set_attribute(&obj, "name", Value::str("Rex")).unwrap();

    let copy = rt.dispatch(&Value::Object(obj.clone()), Op::Clone, &[]).unwrap();
    let copy = copy.as_object().unwrap();
    rt.set_attribute(&obj, "name", Value::str("Max")).unwrap();
    assert_eq!(rt.get_attribute(copy, "name").unwrap(), Value::str("Rex"));
}

#[test]
fn test_read_only_instance_rejects_mutation() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let obj = rt.instantiate(dog, None).unwrap();
    rt.set_attribute(&obj, "name", Value::str("Rex")).unwrap();
    obj.set_read_only(true);

    let value = Value::Object(obj.clone());
    let err = rt
        .dispatch(&value, Op::SetAttrStr, &[Value::str("name"), Value::str("Max")])
        .unwrap_err();
    assert!(matches!(err, ObjectError::InvalidOperation(_)));
    assert_eq!(
        rt.dispatch(&value, Op::GetAttrStr, &[Value::str("name")]).unwrap(),
        Value::str("Rex")
    );

    obj.set_read_only(false);
    rt.dispatch(&value, Op::SetAttrStr, &[Value::str("name"), Value::str("Max")])
        .unwrap();
}

#[test]
fn test_missing_method_call_names_class() {
    let rt = Runtime::new();
    let (_, dog) = animals(&rt);
    let obj = rt.instantiate(dog, None).unwrap();
    let err = rt.call_method(&obj, &rt.intern("fly"), &[]).unwrap_err();
    assert_eq!(err.to_string(), "Method 'fly' not found for class 'Dog'");
}
