use super::released;
use crate::chain::{ChainLink, ChainPosition, HookChainRegistry};
use crate::error::{InterposeError, InterposeResult};
use crate::introspection::{class_label, directly_implements, find_method, nearest_implementation};
use crate::shadow::ShadowTypeManager;
use crate::validator;
use interpose_runtime::{
    same_imp, ClassId, ImpRef, Implementation, MethodId, ObjectId, ObjectRuntime, RuntimeError, Signature,
};
use std::sync::Arc;

/// Replaces a method for one object through its shadow type
#[derive(Debug)]
pub struct InstanceHookStrategy {
    object: ObjectId,
    /// Class the object was declared as
    class: ClassId,
    method: MethodId,
    pub(super) replacement: Option<ImpRef>,
    pub(super) link: Arc<ChainLink>,
}

impl InstanceHookStrategy {
    /// Create a strategy for `method` on `object`
    pub fn new(
        object: ObjectId,
        class: ClassId,
        method: MethodId,
        replacement: ImpRef,
        link: Arc<ChainLink>,
    ) -> Self {
        Self {
            object,
            class,
            method,
            replacement: Some(replacement),
            link,
        }
    }

    /// Hooked object
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Class the hooked object was declared as
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Hooked method
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    pub(super) fn install(
        &mut self,
        rt: &dyn ObjectRuntime,
        shadows: &mut ShadowTypeManager,
        chains: &HookChainRegistry,
    ) -> InterposeResult<()> {
        validator::check_instance(rt, shadows, self.object)?;
        let replacement = self.replacement.clone().ok_or_else(|| released(&self.method))?;

        let actual = rt.object_class(self.object).unwrap_or(self.class);
        let info = find_method(rt, actual, &self.method).ok_or_else(|| InterposeError::MethodNotFound {
            class: class_label(rt, self.class),
            method: self.method.clone(),
        })?;
        if nearest_implementation(rt, actual, &self.method).is_none() {
            return Err(InterposeError::ImplementationNotFound {
                class: class_label(rt, self.class),
                method: self.method.clone(),
            });
        }

        let shadow = shadows.ensure_shadow(rt, self.object)?;
        if let Err(err) = self.install_on(rt, shadow, &info.signature, &replacement) {
            if let Err(cleanup) = shadows.discard_if_unused(rt, self.object) {
                tracing::warn!(object = %self.object, "failed to detach unused shadow type: {}", cleanup);
            }
            return Err(err);
        }

        shadows.retain(self.object);
        chains.register(&replacement, &self.link);
        Ok(())
    }

    fn install_on(
        &self,
        rt: &dyn ObjectRuntime,
        shadow: ClassId,
        signature: &Signature,
        replacement: &ImpRef,
    ) -> InterposeResult<()> {
        let shadow_name = class_label(rt, shadow);

        // Materialize the inherited entry first so the hook always has
        // something to swap back in
        if !directly_implements(rt, shadow, &self.method) {
            let trampoline = passthrough(shadow, self.method.clone());
            rt.replace_method(shadow, &self.method, trampoline.clone(), signature)?;
            tracing::debug!(
                class = %shadow_name,
                method = %self.method,
                imp = %trampoline.id(),
                "added passthrough"
            );
        }

        let previous = rt
            .replace_method(shadow, &self.method, replacement.clone(), signature)?
            .ok_or_else(|| InterposeError::ImplementationNotFound {
                class: shadow_name.clone(),
                method: self.method.clone(),
            })?;

        tracing::debug!(
            class = %shadow_name,
            method = %self.method,
            object = %self.object,
            original = %previous.id(),
            imp = %replacement.id(),
            "swapped in instance hook"
        );
        self.link.set_original(Some(previous));
        Ok(())
    }

    pub(super) fn remove(
        &mut self,
        rt: &dyn ObjectRuntime,
        shadows: &mut ShadowTypeManager,
        chains: &HookChainRegistry,
    ) -> InterposeResult<()> {
        validator::check_instance(rt, shadows, self.object)?;
        let replacement = self.replacement.clone().ok_or_else(|| released(&self.method))?;
        let shadow = shadows.attached_class(self.object).ok_or_else(|| {
            InterposeError::UnknownError(format!("No shadow type installed on {}", self.object))
        })?;
        let shadow_name = class_label(rt, shadow);
        let original = self.link.original().ok_or_else(|| {
            InterposeError::UnknownError(format!(
                "No stored original for {}.{}",
                shadow_name, self.method
            ))
        })?;
        let entry = rt.method_entry(shadow, &self.method).ok_or_else(|| {
            InterposeError::MethodNotFound {
                class: shadow_name.clone(),
                method: self.method.clone(),
            }
        })?;
        let corrupted = |found: Option<&ImpRef>| InterposeError::RevertCorrupted {
            class: shadow_name.clone(),
            method: self.method.clone(),
            found: found.map(|imp| imp.id()),
        };

        let current = entry.implementation;
        if same_imp(current.as_ref(), Some(&replacement)) {
            let displaced = rt.replace_method(shadow, &self.method, original.clone(), &entry.signature)?;
            if !same_imp(displaced.as_ref(), Some(&replacement)) {
                return Err(corrupted(displaced.as_ref()));
            }
            tracing::debug!(
                class = %shadow_name,
                method = %self.method,
                imp = %original.id(),
                "restored instance hook original"
            );
        } else {
            match chains.position(current.as_ref(), &self.link) {
                ChainPosition::Below(parent) => {
                    parent.set_original(Some(original.clone()));
                    tracing::debug!(
                        class = %shadow_name,
                        method = %self.method,
                        imp = %original.id(),
                        "spliced hook out of chain"
                    );
                }
                ChainPosition::Topmost | ChainPosition::Missing => {
                    return Err(corrupted(current.as_ref()));
                }
            }
        }

        self.link.take_original();
        chains.unregister(replacement.id());
        shadows.release(rt, self.object)
    }
}

/// Forwards to whatever the shadow's superclass resolves at call time
fn passthrough(shadow: ClassId, method: MethodId) -> ImpRef {
    Implementation::labeled("passthrough", move |inv| {
        let parent = inv
            .runtime
            .superclass(shadow)
            .ok_or_else(|| RuntimeError::UnknownClass(shadow.to_string()))?;
        let inherited = nearest_implementation(inv.runtime, parent, &method).ok_or_else(|| {
            RuntimeError::MissingImplementation {
                class: class_label(inv.runtime, parent),
                method: method.to_string(),
            }
        })?;
        inherited.invoke(inv)
    })
}
