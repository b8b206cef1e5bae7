mod common;

use common::*;
use interpose_engine::{HookProxy, HookState, HookTarget, InterposeError, Interposer};
use interpose_runtime::{ClassOrigin, Invocation, ObjectRuntime, Value};
use parking_lot::Mutex;
use std::sync::Arc;

fn passthrough_hook(interposer: &Interposer, target: HookTarget) -> Result<interpose_engine::Hook, InterposeError> {
    interposer.prepare_hook(target, "get", |proxy: HookProxy| {
        move |inv: &Invocation<'_>| proxy.call_original(inv)
    })
}

#[test]
fn test_observed_object_refused() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _token = rt
        .observe(obj, "get", move |_, _, value| sink.lock().push(value.clone()))
        .unwrap();

    assert!(matches!(
        passthrough_hook(&interposer, HookTarget::Instance(obj)),
        Err(InterposeError::ExternalObservationDetected { .. })
    ));
    assert_eq!(get(&rt, obj), 1);
    assert_eq!(*seen.lock(), vec![Value::Int(1)]);
    assert!(interposer.shadow_type(obj).is_none());
}

#[test]
fn test_observation_started_before_apply() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let mut hook = prepare_add(&interposer, HookTarget::Instance(obj), 1);

    let token = rt.observe(obj, "get", |_, _, _| {}).unwrap();
    assert!(matches!(
        hook.apply(),
        Err(InterposeError::ExternalObservationDetected { .. })
    ));
    assert_eq!(hook.state(), HookState::Failed);
    assert_eq!(rt.object_class(obj), Some(token.observed_class()));
    assert_eq!(get(&rt, obj), 1);
}

#[test]
fn test_observation_on_top_of_shadow_blocks_revert() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let mut hook = apply_add(&interposer, HookTarget::Instance(obj), 1);
    let shadow = interposer.shadow_class(obj).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let token = rt
        .observe(obj, "get", move |_, _, value| sink.lock().push(value.clone()))
        .unwrap();
    assert_eq!(rt.superclass(token.observed_class()), Some(shadow));
    assert_eq!(rt.class_of(obj), Some(counter));
    assert_eq!(get(&rt, obj), 2);
    assert_eq!(*seen.lock(), vec![Value::Int(2)]);

    assert!(matches!(
        hook.revert(),
        Err(InterposeError::ExternalObservationDetected { .. })
    ));
    assert_eq!(hook.state(), HookState::Failed);
    assert_eq!(get(&rt, obj), 2);
}

#[test]
fn test_foreign_subclass_refused() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let foreign = rt
        .allocate_subclass(counter, "Aspects_Counter", ClassOrigin::Synthesized)
        .unwrap();
    rt.set_perceived_class(foreign, counter).unwrap();
    rt.set_object_class(obj, foreign).unwrap();

    let err = passthrough_hook(&interposer, HookTarget::Instance(obj)).unwrap_err();
    assert_eq!(
        err,
        InterposeError::UnexpectedForeignShadowType {
            subject: format!("object {}", obj),
            actual: "Aspects_Counter".to_string(),
        }
    );
    assert_eq!(rt.object_class(obj), Some(foreign));
}

#[test]
fn test_foreign_subclass_installed_after_prepare() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let mut hook = prepare_add(&interposer, HookTarget::Instance(obj), 1);

    let foreign = rt
        .allocate_subclass(counter, "Aspects_Counter", ClassOrigin::Synthesized)
        .unwrap();
    rt.set_object_class(obj, foreign).unwrap();

    assert!(matches!(
        hook.apply(),
        Err(InterposeError::UnexpectedForeignShadowType { .. })
    ));
    assert_eq!(rt.object_class(obj), Some(foreign));
    assert_eq!(get(&rt, obj), 1);
}

#[test]
fn test_other_interposers_shadow_is_foreign() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let _hook = apply_add(&interposer, HookTarget::Instance(obj), 1);

    let other = Interposer::new(rt.clone());
    assert!(matches!(
        passthrough_hook(&other, HookTarget::Instance(obj)),
        Err(InterposeError::UnexpectedForeignShadowType { .. })
    ));
    assert_eq!(get(&rt, obj), 2);
}

#[test]
fn test_type_hook_reaches_observed_objects() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _token = rt
        .observe(obj, "get", move |_, _, value| sink.lock().push(value.clone()))
        .unwrap();

    let mut hook = apply_add(&interposer, HookTarget::Type(counter), 1);
    assert_eq!(get(&rt, obj), 2);
    hook.revert().unwrap();
    assert_eq!(get(&rt, obj), 1);
    assert_eq!(*seen.lock(), vec![Value::Int(2), Value::Int(1)]);
}
