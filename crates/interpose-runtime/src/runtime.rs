//! The object runtime interface and the in-memory reference runtime
//!
//! [`ObjectRuntime`] is the capability the interception engine edits dispatch
//! tables through. [`Runtime`] implements it with a class registry and an
//! object table behind read/write locks. Locks are released before an
//! implementation body runs, so bodies are free to send further messages.

use crate::class_builder::ClassBuilder;
use crate::class_registry::ClassRegistry;
use crate::error::RuntimeError;
use crate::imp::{ImpRef, Invocation};
use crate::object::{Class, ClassId, ClassOrigin, MethodEntry, Object, ObjectId};
use crate::observation::ObserverTable;
use crate::selector::MethodId;
use crate::value::{Signature, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Operations the interception engine needs from an object runtime
pub trait ObjectRuntime: Send + Sync {
    /// Name of a class
    fn class_name(&self, class: ClassId) -> Option<String>;

    /// Look up a live class by name
    fn class_by_name(&self, name: &str) -> Option<ClassId>;

    /// Direct parent of a class
    fn superclass(&self, class: ClassId) -> Option<ClassId>;

    /// How the class came to exist
    fn class_origin(&self, class: ClassId) -> Option<ClassOrigin>;

    /// The class a class reports itself as
    fn perceived_class(&self, class: ClassId) -> Option<ClassId>;

    /// Entry for a method declared directly on `class` (ancestors not searched)
    fn method_entry(&self, class: ClassId, method: &MethodId) -> Option<MethodEntry>;

    /// All methods declared directly on `class`, in declaration order
    fn declared_methods(&self, class: ClassId) -> Vec<MethodEntry>;

    /// Swap `implementation` into the table of `class`, adding the slot if
    /// missing. Returns the displaced implementation.
    fn replace_method(
        &self,
        class: ClassId,
        method: &MethodId,
        implementation: ImpRef,
        signature: &Signature,
    ) -> Result<Option<ImpRef>, RuntimeError>;

    /// Allocate and register a new class inheriting from `parent`
    fn allocate_subclass(
        &self,
        parent: ClassId,
        name: &str,
        origin: ClassOrigin,
    ) -> Result<ClassId, RuntimeError>;

    /// Make `class` report itself as `perceived`
    fn set_perceived_class(&self, class: ClassId, perceived: ClassId) -> Result<(), RuntimeError>;

    /// Dispose a synthesized class. Best effort; returns whether it happened.
    fn dispose_class(&self, class: ClassId) -> bool;

    /// Class currently used to dispatch messages sent to `object`
    fn object_class(&self, object: ObjectId) -> Option<ClassId>;

    /// Class `object` was instantiated as
    fn declared_class(&self, object: ObjectId) -> Option<ClassId>;

    /// Reassign the dispatch class of `object`, returning the previous one
    fn set_object_class(&self, object: ObjectId, class: ClassId) -> Result<ClassId, RuntimeError>;

    /// Whether the observation mechanism currently governs `object`
    fn is_observed(&self, object: ObjectId) -> bool;

    /// Read a field of `object`
    fn field(&self, object: ObjectId, name: &str) -> Result<Value, RuntimeError>;

    /// Write a field of `object`
    fn set_field(&self, object: ObjectId, name: &str, value: Value) -> Result<(), RuntimeError>;

    /// Dispatch `method` to `object`
    fn send(&self, object: ObjectId, method: &MethodId, args: &[Value]) -> Result<Value, RuntimeError>;
}

/// In-memory object runtime
pub struct Runtime {
    /// Class registry
    classes: RwLock<ClassRegistry>,
    /// Live objects
    objects: RwLock<FxHashMap<ObjectId, Object>>,
    /// Observers registered through the observation mechanism
    pub(crate) observers: Arc<RwLock<ObserverTable>>,
    /// Object ID counter
    next_object: AtomicU64,
    /// Observation token counter
    pub(crate) next_token: AtomicU64,
}

impl Runtime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(ClassRegistry::new()),
            objects: RwLock::new(FxHashMap::default()),
            observers: Arc::new(RwLock::new(ObserverTable::default())),
            next_object: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
        }
    }

    /// Start defining a class
    pub fn define_class(&self, name: impl Into<String>) -> ClassBuilder<'_> {
        ClassBuilder::new(self, name.into())
    }

    /// Register a fully built class
    pub(crate) fn register_class(&self, class: Class) -> Result<ClassId, RuntimeError> {
        let name = class.name.clone();
        let id = self.classes.write().register_class(class)?;
        tracing::trace!(class = %name, id = %id, "registered class");
        Ok(id)
    }

    /// Check that a class exists and is live
    pub(crate) fn ensure_live(&self, class: ClassId) -> Result<(), RuntimeError> {
        self.classes.read().live_class(class).map(|_| ())
    }

    /// Create a new instance of `class`
    pub fn instantiate(&self, class: ClassId) -> Result<ObjectId, RuntimeError> {
        self.ensure_live(class)?;
        let id = ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed));
        self.objects.write().insert(id, Object::new(id, class));
        Ok(id)
    }

    /// Look up a class by name
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.class_by_name(name)
    }

    /// The class `object` reports itself as
    pub fn class_of(&self, object: ObjectId) -> Option<ClassId> {
        let class = self.object_class(object)?;
        self.perceived_class(class)
    }

    /// Whether `class` is `ancestor` or inherits from it
    pub fn is_subclass_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        let classes = self.classes.read();
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = classes.get_class(id).and_then(|c| c.parent);
        }
        false
    }

    /// Number of live classes
    pub fn class_count(&self) -> usize {
        self.classes.read().iter().count()
    }

    /// Walk from `class` upward and return the nearest declaration of `method`
    fn resolve(&self, class: ClassId, method: &MethodId) -> Result<(ImpRef, Signature), RuntimeError> {
        let classes = self.classes.read();
        let mut current = Some(class);
        while let Some(id) = current {
            let class = classes
                .get_class(id)
                .ok_or_else(|| RuntimeError::UnknownClass(id.to_string()))?;
            if let Some(entry) = class.methods.get(method) {
                return match &entry.implementation {
                    Some(imp) => Ok((imp.clone(), entry.signature.clone())),
                    None => Err(RuntimeError::AbstractMethod {
                        class: class.name.clone(),
                        method: method.to_string(),
                    }),
                };
            }
            current = class.parent;
        }
        let name = classes
            .get_class(class)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| class.to_string());
        Err(RuntimeError::DoesNotRecognize {
            class: name,
            method: method.to_string(),
        })
    }

    fn with_object<T>(&self, object: ObjectId, f: impl FnOnce(&Object) -> T) -> Result<T, RuntimeError> {
        self.objects
            .read()
            .get(&object)
            .map(f)
            .ok_or_else(|| RuntimeError::UnknownObject(object.to_string()))
    }

    fn with_object_mut<T>(
        &self,
        object: ObjectId,
        f: impl FnOnce(&mut Object) -> T,
    ) -> Result<T, RuntimeError> {
        self.objects
            .write()
            .get_mut(&object)
            .map(f)
            .ok_or_else(|| RuntimeError::UnknownObject(object.to_string()))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("classes", &self.classes.read().len())
            .field("objects", &self.objects.read().len())
            .finish()
    }
}

impl ObjectRuntime for Runtime {
    fn class_name(&self, class: ClassId) -> Option<String> {
        self.classes.read().get_class(class).map(|c| c.name.clone())
    }

    fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.classes.read().get_class_by_name(name).map(|c| c.id)
    }

    fn superclass(&self, class: ClassId) -> Option<ClassId> {
        self.classes.read().get_class(class).and_then(|c| c.parent)
    }

    fn class_origin(&self, class: ClassId) -> Option<ClassOrigin> {
        self.classes.read().get_class(class).map(|c| c.origin)
    }

    fn perceived_class(&self, class: ClassId) -> Option<ClassId> {
        self.classes.read().get_class(class).map(Class::perceived_class)
    }

    fn method_entry(&self, class: ClassId, method: &MethodId) -> Option<MethodEntry> {
        self.classes
            .read()
            .get_class(class)
            .and_then(|c| c.methods.get(method).cloned())
    }

    fn declared_methods(&self, class: ClassId) -> Vec<MethodEntry> {
        self.classes
            .read()
            .get_class(class)
            .map(|c| c.methods.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn replace_method(
        &self,
        class: ClassId,
        method: &MethodId,
        implementation: ImpRef,
        signature: &Signature,
    ) -> Result<Option<ImpRef>, RuntimeError> {
        let mut classes = self.classes.write();
        let class = classes.live_class_mut(class)?;
        Ok(class.methods.replace(method, implementation, signature))
    }

    fn allocate_subclass(
        &self,
        parent: ClassId,
        name: &str,
        origin: ClassOrigin,
    ) -> Result<ClassId, RuntimeError> {
        let mut classes = self.classes.write();
        classes.live_class(parent)?;
        let mut class = Class::with_parent(classes.next_class_id(), name.to_string(), parent);
        class.origin = origin;
        classes.register_class(class)
    }

    fn set_perceived_class(&self, class: ClassId, perceived: ClassId) -> Result<(), RuntimeError> {
        let mut classes = self.classes.write();
        classes.live_class(perceived)?;
        classes.live_class_mut(class)?.perceived = Some(perceived);
        Ok(())
    }

    fn dispose_class(&self, class: ClassId) -> bool {
        let in_use = self.objects.read().values().any(|o| o.class == class);
        let mut classes = self.classes.write();
        let disposable = classes
            .get_class(class)
            .map(|c| c.origin.is_synthesized())
            .unwrap_or(false);
        if in_use || !disposable {
            return false;
        }
        classes.dispose_class(class)
    }

    fn object_class(&self, object: ObjectId) -> Option<ClassId> {
        self.objects.read().get(&object).map(|o| o.class)
    }

    fn declared_class(&self, object: ObjectId) -> Option<ClassId> {
        self.objects.read().get(&object).map(|o| o.declared_class)
    }

    fn set_object_class(&self, object: ObjectId, class: ClassId) -> Result<ClassId, RuntimeError> {
        self.ensure_live(class)?;
        self.with_object_mut(object, |o| std::mem::replace(&mut o.class, class))
    }

    fn is_observed(&self, object: ObjectId) -> bool {
        let Some(class) = self.object_class(object) else {
            return false;
        };
        let classes = self.classes.read();
        let mut current = Some(class);
        while let Some(id) = current {
            match classes.get_class(id) {
                Some(c) if c.origin == ClassOrigin::Observation => return true,
                Some(c) => current = c.parent,
                None => return false,
            }
        }
        false
    }

    fn field(&self, object: ObjectId, name: &str) -> Result<Value, RuntimeError> {
        self.with_object(object, |o| o.get_field(name))
    }

    fn set_field(&self, object: ObjectId, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.with_object_mut(object, |o| o.set_field(name, value))
    }

    fn send(&self, object: ObjectId, method: &MethodId, args: &[Value]) -> Result<Value, RuntimeError> {
        let class = self
            .object_class(object)
            .ok_or_else(|| RuntimeError::UnknownObject(object.to_string()))?;
        let (imp, signature) = self.resolve(class, method)?;
        if signature.arity() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                method: method.to_string(),
                expected: signature.arity(),
                actual: args.len(),
            });
        }
        imp.invoke(&Invocation::new(self, object, method, args))
    }
}
