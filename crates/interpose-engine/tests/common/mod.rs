#![allow(dead_code)]

use interpose_engine::{Hook, HookProxy, HookTarget, Interposer};
use interpose_runtime::{ClassId, Invocation, ObjectId, ObjectRuntime, Runtime, Signature, Value, ValueKind};
use std::sync::Arc;

/// Install a test subscriber; honors RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runtime with a `Counter` class whose `get` returns 1
pub fn setup() -> (Arc<Runtime>, Interposer, ClassId) {
    init_tracing();
    let rt = Arc::new(Runtime::new());
    let counter = define_counter(&rt);
    let interposer = Interposer::new(rt.clone());
    (rt, interposer, counter)
}

pub fn define_counter(rt: &Runtime) -> ClassId {
    rt.define_class("Counter")
        .method("get", Signature::getter(ValueKind::Int), |_| Ok(Value::Int(1)))
        .method("name", Signature::getter(ValueKind::Str), |_| Ok(Value::str("counter")))
        .method("scale", Signature::new(vec![ValueKind::Int], ValueKind::Int), |inv| {
            let factor = inv.arg(0)?.as_int().unwrap_or(0);
            Ok(Value::Int(factor * 3))
        })
        .build()
        .unwrap()
}

/// Subclass of `Counter` inheriting everything
pub fn define_sub_counter(rt: &Runtime, counter: ClassId) -> ClassId {
    rt.define_class("SubCounter").extends(counter).build().unwrap()
}

pub fn get(rt: &Runtime, object: ObjectId) -> i64 {
    rt.send(object, &"get".into(), &[])
        .unwrap()
        .as_int()
        .unwrap()
}

pub fn name(rt: &Runtime, object: ObjectId) -> String {
    rt.send(object, &"name".into(), &[])
        .unwrap()
        .as_str()
        .unwrap()
        .to_string()
}

/// Prepare a hook on `get` returning the original result plus `delta`
pub fn prepare_add(interposer: &Interposer, target: HookTarget, delta: i64) -> Hook {
    interposer
        .prepare_hook(target, "get", move |proxy: HookProxy| {
            move |inv: &Invocation<'_>| {
                let value = proxy.call_original(inv)?.as_int().unwrap_or(0);
                Ok(Value::Int(value + delta))
            }
        })
        .unwrap()
}

/// Apply a hook on `get` returning the original result plus `delta`
pub fn apply_add(interposer: &Interposer, target: HookTarget, delta: i64) -> Hook {
    let mut hook = prepare_add(interposer, target, delta);
    hook.apply().unwrap();
    hook
}
