mod common;

use common::*;
use interpose_engine::{HookProxy, HookState, HookTarget, Interposer};
use interpose_runtime::{ClassId, Invocation, ObjectId, ObjectRuntime, Value};
use std::sync::{Arc, Barrier};
use std::thread;

const ROUNDS: usize = 50;

fn spawn_instance_worker(
    interposer: Interposer,
    barrier: Arc<Barrier>,
    obj: ObjectId,
    delta: i64,
) -> thread::JoinHandle<Vec<HookState>> {
    thread::spawn(move || {
        barrier.wait();
        let mut states = Vec::with_capacity(ROUNDS);
        for _ in 0..ROUNDS {
            let mut hook = prepare_add(&interposer, HookTarget::Instance(obj), delta);
            hook.apply().unwrap();
            thread::yield_now();
            hook.revert().unwrap();
            states.push(hook.state());
        }
        states
    })
}

/// Type hooks on distinct methods of one class, each method owned by one
/// worker so reverts stay in installation order per slot
fn spawn_type_worker(
    interposer: Interposer,
    barrier: Arc<Barrier>,
    class: ClassId,
    method: &'static str,
) -> thread::JoinHandle<Vec<HookState>> {
    thread::spawn(move || {
        barrier.wait();
        let mut states = Vec::with_capacity(ROUNDS);
        for _ in 0..ROUNDS {
            let mut hook = interposer
                .prepare_hook(HookTarget::Type(class), method, |proxy: HookProxy| {
                    move |inv: &Invocation<'_>| proxy.call_original(inv)
                })
                .unwrap();
            hook.apply().unwrap();
            thread::yield_now();
            hook.revert().unwrap();
            states.push(hook.state());
        }
        states
    })
}

// ============================================================================
// Serialized transitions
// ============================================================================

#[test]
fn test_concurrent_instance_hooks_on_one_object() {
    let (rt, interposer, counter) = setup();
    let obj = rt.instantiate(counter).unwrap();
    let workers = 4;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|i| spawn_instance_worker(interposer.clone(), barrier.clone(), obj, 1 << i))
        .collect();
    for handle in handles {
        let states = handle.join().unwrap();
        assert!(states.iter().all(|&s| s == HookState::Pending));
    }

    assert_eq!(get(&rt, obj), 1);
    assert_eq!(interposer.hook_count(obj), 0);
    assert!(interposer.shadow_type(obj).is_none());
    assert_eq!(rt.object_class(obj), Some(counter));
}

#[test]
fn test_concurrent_type_and_instance_hooks() {
    let (rt, interposer, counter) = setup();
    let a = rt.instantiate(counter).unwrap();
    let b = rt.instantiate(counter).unwrap();
    let barrier = Arc::new(Barrier::new(5));

    let handles = vec![
        spawn_instance_worker(interposer.clone(), barrier.clone(), a, 1),
        spawn_instance_worker(interposer.clone(), barrier.clone(), a, 10),
        spawn_instance_worker(interposer.clone(), barrier.clone(), b, 100),
        spawn_type_worker(interposer.clone(), barrier.clone(), counter, "get"),
        spawn_type_worker(interposer.clone(), barrier.clone(), counter, "name"),
    ];
    for handle in handles {
        let states = handle.join().unwrap();
        assert_eq!(states.len(), ROUNDS);
        assert!(states.iter().all(|&s| s == HookState::Pending));
    }

    for obj in [a, b] {
        assert_eq!(get(&rt, obj), 1);
        assert_eq!(name(&rt, obj), "counter");
        assert_eq!(interposer.hook_count(obj), 0);
        assert_eq!(rt.object_class(obj), Some(counter));
    }
    let fresh = rt.instantiate(counter).unwrap();
    assert_eq!(
        rt.send(fresh, &"get".into(), &[]).unwrap(),
        Value::Int(1)
    );
}
