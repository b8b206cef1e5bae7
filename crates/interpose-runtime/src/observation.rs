//! External observation mechanism
//!
//! Lets callers watch the results of a method on one object. Observing an
//! object moves it onto a runtime-synthesized `Observed_<Class>` subclass
//! (shared by every object observed from the same class) whose table
//! overrides the observed methods with a notifying wrapper. Interception
//! libraries must not touch objects in this state: the observation classes
//! assume they sit directly on top of the object.

use crate::error::RuntimeError;
use crate::imp::{ImpRef, Implementation};
use crate::object::{ClassId, ClassOrigin, ObjectId};
use crate::runtime::{ObjectRuntime, Runtime};
use crate::selector::MethodId;
use crate::value::{Signature, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Name prefix of observation subclasses
pub const OBSERVED_CLASS_PREFIX: &str = "Observed_";

/// Callback receiving `(object, method, result)` after each observed call
pub type Observer = Arc<dyn Fn(ObjectId, &MethodId, &Value) + Send + Sync>;

/// Registered observers per object
#[derive(Default)]
pub(crate) struct ObserverTable {
    entries: FxHashMap<ObjectId, Vec<ObserverEntry>>,
}

struct ObserverEntry {
    token: u64,
    method: MethodId,
    observer: Observer,
}

impl ObserverTable {
    fn observers_for(&self, object: ObjectId, method: &MethodId) -> Vec<Observer> {
        self.entries
            .get(&object)
            .map(|list| {
                list.iter()
                    .filter(|e| &e.method == method)
                    .map(|e| e.observer.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove one observer; returns how many remain for the object
    fn remove(&mut self, object: ObjectId, token: u64) -> usize {
        let Some(list) = self.entries.get_mut(&object) else {
            return 0;
        };
        list.retain(|e| e.token != token);
        let remaining = list.len();
        if remaining == 0 {
            self.entries.remove(&object);
        }
        remaining
    }
}

/// Handle to an active observation
#[derive(Debug)]
pub struct ObservationToken {
    object: ObjectId,
    token: u64,
    observed_class: ClassId,
    previous_class: ClassId,
}

impl ObservationToken {
    /// Observed object
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Observation subclass the object was moved onto
    pub fn observed_class(&self) -> ClassId {
        self.observed_class
    }
}

impl Runtime {
    /// Observe the results of `method` on `object`
    pub fn observe<F>(
        &self,
        object: ObjectId,
        method: impl Into<MethodId>,
        observer: F,
    ) -> Result<ObservationToken, RuntimeError>
    where
        F: Fn(ObjectId, &MethodId, &Value) + Send + Sync + 'static,
    {
        let method = method.into();
        let actual = self
            .object_class(object)
            .ok_or_else(|| RuntimeError::UnknownObject(object.to_string()))?;

        let observed_class = if self.class_origin(actual) == Some(ClassOrigin::Observation) {
            actual
        } else {
            self.observation_class_for(actual)?
        };

        if self.method_entry(observed_class, &method).is_none() {
            let signature = self
                .lookup_signature(actual, &method)
                .ok_or_else(|| RuntimeError::DoesNotRecognize {
                    class: self.class_name(actual).unwrap_or_default(),
                    method: method.to_string(),
                })?;
            let wrapper = notifying_wrapper(observed_class, method.clone(), self.observers.clone());
            self.replace_method(observed_class, &method, wrapper, &signature)?;
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.observers
            .write()
            .entries
            .entry(object)
            .or_default()
            .push(ObserverEntry {
                token,
                method: method.clone(),
                observer: Arc::new(observer),
            });

        let previous_class = if actual == observed_class {
            self.superclass(observed_class).unwrap_or(actual)
        } else {
            self.set_object_class(object, observed_class)?
        };

        tracing::debug!(
            object = %object,
            method = %method,
            class = %self.class_name(observed_class).unwrap_or_default(),
            "observation started"
        );

        Ok(ObservationToken {
            object,
            token,
            observed_class,
            previous_class,
        })
    }

    /// Stop an observation. The object leaves the observation subclass once
    /// its last observer is gone.
    pub fn invalidate(&self, token: ObservationToken) -> Result<(), RuntimeError> {
        let remaining = self.observers.write().remove(token.object, token.token);
        if remaining == 0 && self.object_class(token.object) == Some(token.observed_class) {
            self.set_object_class(token.object, token.previous_class)?;
            tracing::debug!(object = %token.object, "observation ended");
        }
        Ok(())
    }

    fn observation_class_for(&self, actual: ClassId) -> Result<ClassId, RuntimeError> {
        let actual_name = self
            .class_name(actual)
            .ok_or_else(|| RuntimeError::UnknownClass(actual.to_string()))?;
        let name = format!("{}{}", OBSERVED_CLASS_PREFIX, actual_name);

        if let Some(existing) = self.class_by_name(&name) {
            if self.class_origin(existing) == Some(ClassOrigin::Observation)
                && self.superclass(existing) == Some(actual)
            {
                return Ok(existing);
            }
            return Err(RuntimeError::ClassNameTaken(name));
        }

        let class = self.allocate_subclass(actual, &name, ClassOrigin::Observation)?;
        if let Some(perceived) = self.perceived_class(actual) {
            self.set_perceived_class(class, perceived)?;
        }
        Ok(class)
    }

    fn lookup_signature(&self, class: ClassId, method: &MethodId) -> Option<Signature> {
        let mut current = Some(class);
        while let Some(id) = current {
            if let Some(entry) = self.method_entry(id, method) {
                return Some(entry.signature);
            }
            current = self.superclass(id);
        }
        None
    }
}

/// Wrapper installed on an observation class: run the inherited
/// implementation, then report the result to the receiver's observers.
fn notifying_wrapper(
    observed_class: ClassId,
    method: MethodId,
    observers: Arc<RwLock<ObserverTable>>,
) -> ImpRef {
    Implementation::labeled("observation", move |inv| {
        let parent = inv
            .runtime
            .superclass(observed_class)
            .ok_or_else(|| RuntimeError::UnknownClass(observed_class.to_string()))?;
        let inherited = inherited_implementation(inv.runtime, parent, &method).ok_or_else(|| {
            RuntimeError::MissingImplementation {
                class: inv.runtime.class_name(observed_class).unwrap_or_default(),
                method: method.to_string(),
            }
        })?;
        let result = inherited.invoke(inv)?;
        let targets = observers.read().observers_for(inv.receiver, &method);
        for observer in targets {
            observer(inv.receiver, &method, &result);
        }
        Ok(result)
    })
}

fn inherited_implementation(rt: &dyn ObjectRuntime, class: ClassId, method: &MethodId) -> Option<ImpRef> {
    let mut current = Some(class);
    while let Some(id) = current {
        if let Some(entry) = rt.method_entry(id, method) {
            return entry.implementation;
        }
        current = rt.superclass(id);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;
    use parking_lot::Mutex;

    fn setup() -> (Runtime, ClassId, ObjectId) {
        let rt = Runtime::new();
        let class = rt
            .define_class("Counter")
            .method("get", Signature::getter(ValueKind::Int), |_| Ok(Value::Int(1)))
            .build()
            .unwrap();
        let obj = rt.instantiate(class).unwrap();
        (rt, class, obj)
    }

    #[test]
    fn test_observe_moves_object_and_notifies() {
        let (rt, class, obj) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let token = rt
            .observe(obj, "get", move |_, _, v| sink.lock().push(v.clone()))
            .unwrap();

        assert!(rt.is_observed(obj));
        assert_ne!(rt.object_class(obj), Some(class));
        assert_eq!(rt.class_of(obj), Some(class));
        assert_eq!(rt.send(obj, &"get".into(), &[]).unwrap(), Value::Int(1));
        assert_eq!(*seen.lock(), vec![Value::Int(1)]);

        rt.invalidate(token).unwrap();
        assert!(!rt.is_observed(obj));
        assert_eq!(rt.object_class(obj), Some(class));
    }

    #[test]
    fn test_observation_class_shared_per_class() {
        let (rt, class, a) = setup();
        let b = rt.instantiate(class).unwrap();
        let ta = rt.observe(a, "get", |_, _, _| {}).unwrap();
        let tb = rt.observe(b, "get", |_, _, _| {}).unwrap();
        assert_eq!(ta.observed_class(), tb.observed_class());
        assert_eq!(
            rt.class_name(ta.observed_class()).as_deref(),
            Some("Observed_Counter")
        );
    }

    #[test]
    fn test_second_observer_keeps_class_until_last_invalidated() {
        let (rt, class, obj) = setup();
        let first = rt.observe(obj, "get", |_, _, _| {}).unwrap();
        let second = rt.observe(obj, "get", |_, _, _| {}).unwrap();

        rt.invalidate(first).unwrap();
        assert!(rt.is_observed(obj));
        rt.invalidate(second).unwrap();
        assert_eq!(rt.object_class(obj), Some(class));
    }

    #[test]
    fn test_observe_unknown_method() {
        let (rt, _, obj) = setup();
        assert!(matches!(
            rt.observe(obj, "missing", |_, _, _| {}),
            Err(RuntimeError::DoesNotRecognize { .. })
        ));
    }
}
