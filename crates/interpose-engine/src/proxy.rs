//! Hook proxy handed to replacement factories
//!
//! A replacement usually wants to run the implementation it displaced. The
//! proxy gives it that without the replacement knowing whether it is a type
//! hook, an instance hook, or somewhere in the middle of a chain.
//!
//! ```rust,ignore
//! interposer.apply_hook(HookTarget::Instance(counter), "get", |proxy: HookProxy| {
//!     move |inv: &Invocation<'_>| {
//!         let value = proxy.call_original(inv)?.as_int().unwrap_or(0);
//!         Ok(Value::Int(value + 1))
//!     }
//! })?;
//! ```

use crate::chain::ChainLink;
use crate::introspection::{class_label, nearest_implementation};
use interpose_runtime::{ClassId, ImpFn, ImpRef, Invocation, MethodId, ObjectRuntime, RuntimeError, Value};
use std::fmt;
use std::sync::Arc;

/// Builds a hook's replacement body from its proxy
pub type ReplacementFactory = dyn Fn(HookProxy) -> Box<ImpFn> + Send + Sync;

/// Access to the implementation a hook displaces
#[derive(Clone)]
pub struct HookProxy {
    method: MethodId,
    link: Arc<ChainLink>,
    lookup_class: ClassId,
}

impl HookProxy {
    pub(crate) fn new(method: MethodId, link: Arc<ChainLink>, lookup_class: ClassId) -> Self {
        Self {
            method,
            link,
            lookup_class,
        }
    }

    /// The hooked method
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    /// The implementation the hook currently displaces.
    ///
    /// While the hook is installed this is the stored original. Otherwise it
    /// is looked up dynamically, so do not cache it.
    pub fn original(&self, rt: &dyn ObjectRuntime) -> Option<ImpRef> {
        self.link
            .original()
            .or_else(|| nearest_implementation(rt, self.lookup_class, &self.method))
    }

    /// Invoke the displaced implementation with the current call
    pub fn call_original(&self, inv: &Invocation<'_>) -> Result<Value, RuntimeError> {
        let original = self
            .original(inv.runtime)
            .ok_or_else(|| RuntimeError::MissingImplementation {
                class: class_label(inv.runtime, self.lookup_class),
                method: self.method.to_string(),
            })?;
        original.invoke(inv)
    }
}

impl fmt::Debug for HookProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookProxy")
            .field("method", &self.method)
            .field("original", &self.link.original().map(|imp| imp.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpose_runtime::{Implementation, Runtime, Signature, ValueKind};

    #[test]
    fn test_original_prefers_stored_link() {
        let rt = Runtime::new();
        let class = rt
            .define_class("Counter")
            .method("get", Signature::getter(ValueKind::Int), |_| Ok(Value::Int(1)))
            .build()
            .unwrap();
        let obj = rt.instantiate(class).unwrap();
        let link = Arc::new(ChainLink::new());
        let proxy = HookProxy::new(MethodId::new("get"), link.clone(), class);
        let get = MethodId::new("get");
        let inv = Invocation::new(&rt, obj, &get, &[]);

        assert_eq!(proxy.call_original(&inv).unwrap(), Value::Int(1));

        link.set_original(Some(Implementation::new(|_| Ok(Value::Int(5)))));
        assert_eq!(proxy.call_original(&inv).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_missing_original() {
        let rt = Runtime::new();
        let class = rt
            .define_class("Shape")
            .abstract_method("area", Signature::getter(ValueKind::Float))
            .build()
            .unwrap();
        let obj = rt.instantiate(class).unwrap();
        let area = MethodId::new("area");
        let proxy = HookProxy::new(area.clone(), Arc::new(ChainLink::new()), class);

        let result = proxy.call_original(&Invocation::new(&rt, obj, &area, &[]));
        assert!(matches!(result, Err(RuntimeError::MissingImplementation { .. })));
    }
}
